//! Request dispatcher - relays accepted analysis requests to the messaging sink.
//!
//! A single task owns the receiving end of the delivery channel and processes
//! one request at a time, in channel order:
//! 1. Wait for the next request (or cancellation)
//! 2. Format the channel message
//! 3. Deliver it if the sink is available, otherwise drop it
//!
//! Delivery failures are logged and never end the loop. Cancellation only
//! interrupts the wait; a delivery already in flight runs to completion.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::request::AnalysisRequest;
use crate::sink::MessagingSink;

/// Characters of file content included in a message before truncation.
pub const PREVIEW_CHARS: usize = 500;

pub const TRUNCATION_MARKER: &str = "...";

pub const DEFAULT_CHANNEL: &str = "code-insights-stream";

const INSTRUCTION_TRAILER: &str = "Please analyze the architecture and logic of this file, \
and recommend which file should be looked at next.";

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub channel: String,
    pub preview_chars: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_string(),
            preview_chars: PREVIEW_CHARS,
        }
    }
}

impl DispatcherConfig {
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }
}

/// First `limit` characters of `content`, with the marker appended when cut.
pub fn content_preview(content: &str, limit: usize) -> String {
    match content.char_indices().nth(limit) {
        Some((byte_idx, _)) => format!("{}{}", &content[..byte_idx], TRUNCATION_MARKER),
        None => content.to_string(),
    }
}

/// Human-readable channel message for one request.
pub fn format_message(request: &AnalysisRequest, preview_chars: usize) -> String {
    format!(
        "File: {}\n\nCode:\n{}\n\n---\n{}",
        request.filename,
        content_preview(&request.content, preview_chars),
        INSTRUCTION_TRAILER
    )
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Sent,
    DroppedUnavailable,
    Failed,
}

pub struct Dispatcher {
    config: DispatcherConfig,
    rx: mpsc::UnboundedReceiver<AnalysisRequest>,
    sink: Arc<dyn MessagingSink>,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        config: DispatcherConfig,
        rx: mpsc::UnboundedReceiver<AnalysisRequest>,
        sink: Arc<dyn MessagingSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            rx,
            sink,
            cancel,
        }
    }

    /// Run until cancelled or until every producer is gone.
    pub async fn run(mut self) {
        tracing::info!(channel = %self.config.channel, "Dispatcher started");

        loop {
            let request = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = self.rx.recv() => match next {
                    Some(r) => r,
                    None => {
                        tracing::info!("All producers gone, dispatcher exiting");
                        return;
                    }
                },
            };

            self.deliver(request).await;
        }

        self.rx.close();
        let mut abandoned = 0usize;
        while self.rx.try_recv().is_ok() {
            abandoned += 1;
        }
        if abandoned > 0 {
            tracing::warn!(abandoned, "Dispatcher cancelled with undelivered requests");
        }
        tracing::info!("Dispatcher stopped");
    }

    async fn deliver(&self, request: AnalysisRequest) -> Delivery {
        if !self.sink.is_available().await {
            tracing::warn!(
                filename = %request.filename,
                "Messaging sink unavailable, dropping request"
            );
            return Delivery::DroppedUnavailable;
        }

        let text = format_message(&request, self.config.preview_chars);
        match self
            .sink
            .send_channel_message(&self.config.channel, &text)
            .await
        {
            Ok(()) => {
                tracing::info!(
                    filename = %request.filename,
                    channel = %self.config.channel,
                    "Sent analysis request to channel"
                );
                Delivery::Sent
            }
            Err(e) => {
                tracing::error!(
                    filename = %request.filename,
                    error = %e,
                    "Failed to deliver analysis request"
                );
                Delivery::Failed
            }
        }
    }
}
