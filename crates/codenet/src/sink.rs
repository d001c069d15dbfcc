//! Messaging sink: delivers text messages to named channels on the agent network.
//!
//! The dispatcher is the only caller. It checks [`MessagingSink::is_available`]
//! before every send and drops the message when the sink is not reachable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::version::CODENET_VERSION;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("request to network failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("network rejected message with status {0}")]
    Rejected(u16),
}

/// Destination for formatted channel messages.
#[async_trait]
pub trait MessagingSink: Send + Sync {
    /// Whether the sink can currently accept messages.
    async fn is_available(&self) -> bool;

    /// Send `text` to `channel`.
    async fn send_channel_message(&self, channel: &str, text: &str) -> Result<(), SinkError>;
}

#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    pub host: String,
    pub port: u16,
    pub agent_id: String,
    pub request_timeout: Duration,
    pub probe_timeout: Duration,
}

impl Default for NetworkSinkConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8700,
            agent_id: crate::health::DEFAULT_AGENT_ID.to_string(),
            request_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(2),
        }
    }
}

impl NetworkSinkConfig {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// HTTP-backed sink talking to the agent network's messaging API.
///
/// Availability is cached: a successful probe or send marks the sink available,
/// a connection failure marks it unavailable until the next successful probe.
pub struct NetworkSink {
    base_url: String,
    agent_id: String,
    client: reqwest::Client,
    probe_timeout: Duration,
    connected: AtomicBool,
}

impl NetworkSink {
    pub fn new(config: NetworkSinkConfig) -> Result<Self, SinkError> {
        let mut headers = reqwest::header::HeaderMap::new();
        let user_agent = format!("codenet/{}", CODENET_VERSION);
        if let Ok(value) = reqwest::header::HeaderValue::from_str(&user_agent) {
            headers.insert(reqwest::header::USER_AGENT, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            base_url: config.base_url(),
            agent_id: config.agent_id,
            client,
            probe_timeout: config.probe_timeout,
            connected: AtomicBool::new(false),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe the network health endpoint and update the cached availability.
    pub async fn probe(&self) -> bool {
        let url = format!("{}/api/health", self.base_url);
        let ok = match self
            .client
            .get(&url)
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Network probe failed");
                false
            }
        };
        self.connected.store(ok, Ordering::SeqCst);
        ok
    }
}

#[async_trait]
impl MessagingSink for NetworkSink {
    async fn is_available(&self) -> bool {
        if self.connected.load(Ordering::SeqCst) {
            return true;
        }
        self.probe().await
    }

    async fn send_channel_message(&self, channel: &str, text: &str) -> Result<(), SinkError> {
        let url = format!("{}/api/channels/{}/messages", self.base_url, channel);
        let payload = serde_json::json!({
            "sender": self.agent_id,
            "channel": channel,
            "text": text,
        });

        let response = match self.client.post(&url).json(&payload).send().await {
            Ok(r) => r,
            Err(e) => {
                if e.is_connect() {
                    self.connected.store(false, Ordering::SeqCst);
                }
                return Err(e.into());
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Rejected(status.as_u16()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }
}
