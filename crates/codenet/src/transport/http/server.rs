//! HTTP listener running on a dedicated thread.
//!
//! The listener owns its own single-threaded runtime so request handling never
//! shares a scheduler with the dispatcher. The only link between the two is the
//! confirmed submission in [`crate::handoff`].

use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::handoff::{Submitter, submit_timeout_from_env};
use crate::health::DEFAULT_AGENT_ID;

use super::routes::{BridgeState, routes};

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub host: String,
    pub port: u16,
    pub agent_id: String,
    /// How long a request waits for the dispatcher to confirm the enqueue.
    pub submit_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8888,
            agent_id: DEFAULT_AGENT_ID.to_string(),
            submit_timeout: submit_timeout_from_env(),
        }
    }
}

impl BridgeConfig {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }
}

/// Running bridge: the listener thread plus what is needed to stop it.
pub struct BridgeHandle {
    addr: SocketAddr,
    shutdown: CancellationToken,
    thread: JoinHandle<anyhow::Result<()>>,
}

impl BridgeHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting requests, let in-flight ones finish, and join the thread.
    pub fn shutdown(self) -> anyhow::Result<()> {
        self.shutdown.cancel();
        match self.thread.join() {
            Ok(result) => result,
            Err(_) => anyhow::bail!("HTTP listener thread panicked"),
        }
    }
}

/// Bind the listener and start serving on a new thread.
///
/// Binding happens on the calling thread so address errors surface here.
/// `submitter` must already be bound to the dispatcher's runtime; its timeout
/// is replaced by `config.submit_timeout`.
pub fn start_bridge(config: BridgeConfig, submitter: Submitter) -> anyhow::Result<BridgeHandle> {
    let addr = format!("{}:{}", config.host, config.port);
    let std_listener =
        StdTcpListener::bind(&addr).with_context(|| format!("failed to bind {}", addr))?;
    std_listener.set_nonblocking(true)?;
    let actual_addr = std_listener.local_addr()?;

    let state = Arc::new(BridgeState {
        submitter: submitter.with_timeout(config.submit_timeout),
        agent_id: config.agent_id,
    });

    let shutdown = CancellationToken::new();
    let shutdown_for_thread = shutdown.clone();

    let thread = std::thread::Builder::new()
        .name("http-listener".to_string())
        .spawn(move || -> anyhow::Result<()> {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("failed to build listener runtime")?;

            rt.block_on(async move {
                let listener = TcpListener::from_std(std_listener)?;
                info!(
                    submit_timeout = ?state.submitter.timeout(),
                    "HTTP bridge listening on http://{}", actual_addr
                );
                info!("POST /analyze submits a code analysis request");
                info!("GET /health reports liveness");

                axum::serve(listener, routes(state))
                    .with_graceful_shutdown(shutdown_for_thread.cancelled_owned())
                    .await?;

                info!("HTTP bridge stopped");
                Ok::<(), anyhow::Error>(())
            })
        })
        .context("failed to spawn listener thread")?;

    Ok(BridgeHandle {
        addr: actual_addr,
        shutdown,
        thread,
    })
}
