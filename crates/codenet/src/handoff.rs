//! Confirmed handoff from the HTTP listener thread into the dispatcher's runtime.
//!
//! The delivery channel belongs to the single-threaded runtime that hosts the
//! dispatcher. Producers on other threads never push into it directly: each
//! submission is scheduled onto the owning runtime as a small task that performs
//! the enqueue there and confirms over a oneshot. The producer waits for that
//! confirmation with a bounded timeout.
//!
//! Accepted order is the order in which those enqueue tasks run on the owning
//! runtime, which is also the channel order, so delivery is strictly FIFO with
//! respect to confirmation.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use crate::request::AnalysisRequest;

/// Default time a producer waits for the scheduler to confirm an enqueue.
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(1);

/// Read the submit timeout from `CODENET_SUBMIT_TIMEOUT_MS`, falling back to the default.
pub fn submit_timeout_from_env() -> Duration {
    std::env::var("CODENET_SUBMIT_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_SUBMIT_TIMEOUT)
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("timed out after {0:?} waiting for the dispatcher to accept the request")]
    Timeout(Duration),
    #[error("dispatcher channel is closed")]
    Closed,
    #[error("dispatcher runtime has shut down")]
    SchedulerGone,
}

/// Create the delivery channel together with a submitter bound to `scheduler`.
///
/// `scheduler` must be the runtime that will poll the returned receiver.
pub fn channel(
    scheduler: Handle,
    timeout: Duration,
) -> (Submitter, mpsc::UnboundedReceiver<AnalysisRequest>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        Submitter {
            scheduler,
            queue: tx,
            timeout,
        },
        rx,
    )
}

/// Thread-safe, confirmation-based producer handle.
#[derive(Clone)]
pub struct Submitter {
    scheduler: Handle,
    queue: mpsc::UnboundedSender<AnalysisRequest>,
    timeout: Duration,
}

impl Submitter {
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Hand `request` to the owning runtime and wait until it is in the channel.
    ///
    /// Ownership of the request moves to the scheduled task. When the wait times
    /// out the pending task sees the abandoned confirmation and skips the enqueue.
    pub async fn submit(&self, request: AnalysisRequest) -> Result<(), SubmitError> {
        let (ack_tx, ack_rx) = oneshot::channel::<bool>();
        let queue = self.queue.clone();

        self.scheduler.spawn(async move {
            if ack_tx.is_closed() {
                tracing::debug!(
                    filename = %request.filename,
                    "Submitter gave up before enqueue, dropping request"
                );
                return;
            }
            let accepted = queue.send(request).is_ok();
            let _ = ack_tx.send(accepted);
        });

        match tokio::time::timeout(self.timeout, ack_rx).await {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err(SubmitError::Closed),
            // Task dropped without confirming: the runtime is shutting down.
            Ok(Err(_)) => Err(SubmitError::SchedulerGone),
            Err(_) => Err(SubmitError::Timeout(self.timeout)),
        }
    }
}
