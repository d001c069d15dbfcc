//! Signal-driven shutdown of supervised children.
//!
//! The controller owns the supervisor once launching is done. The first
//! shutdown request runs `stop_all`; any request that arrives while or after
//! that runs is a no-op.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;

use crate::supervisor::{ChildProcessRecord, ProcessSupervisor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interrupt => f.write_str("SIGINT"),
            Self::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Registered SIGINT/SIGTERM handlers.
///
/// Registration happens in [`ShutdownSignals::install`], not on the first
/// wait, so a signal that arrives while children are still being launched is
/// held until [`ShutdownSignals::recv`] is polled instead of killing the process.
pub struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(windows)]
    ctrl_c: tokio::signal::windows::CtrlC,
}

impl ShutdownSignals {
    /// Install the handlers. Must be called from within a tokio runtime.
    #[cfg(unix)]
    pub fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(windows)]
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {
            ctrl_c: tokio::signal::windows::ctrl_c()?,
        })
    }

    /// Wait for the next SIGINT or SIGTERM, including one received before this call.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> ShutdownSignal {
        tokio::select! {
            _ = self.interrupt.recv() => ShutdownSignal::Interrupt,
            _ = self.terminate.recv() => ShutdownSignal::Terminate,
        }
    }

    #[cfg(windows)]
    pub async fn recv(&mut self) -> ShutdownSignal {
        self.ctrl_c.recv().await;
        ShutdownSignal::Interrupt
    }
}

pub struct LifecycleController {
    supervisor: Mutex<ProcessSupervisor>,
    shutting_down: AtomicBool,
}

impl LifecycleController {
    pub fn new(supervisor: ProcessSupervisor) -> Self {
        Self {
            supervisor: Mutex::new(supervisor),
            shutting_down: AtomicBool::new(false),
        }
    }

    pub async fn status_snapshot(&self) -> Vec<ChildProcessRecord> {
        self.supervisor.lock().await.status_snapshot()
    }

    /// Stop every child exactly once.
    ///
    /// Returns the final records to the caller that performed the stop and
    /// `None` to every other caller.
    pub async fn shutdown(&self) -> Option<Vec<ChildProcessRecord>> {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            tracing::debug!("Shutdown already in progress, ignoring");
            return None;
        }

        tracing::info!("Stopping all supervised children");
        let stopped = self.supervisor.lock().await.stop_all().await;
        tracing::info!(children = stopped.len(), "Cleanup complete");
        Some(stopped)
    }

    /// Wait on `signals`, then shut down.
    pub async fn run_until_signal(
        &self,
        signals: &mut ShutdownSignals,
    ) -> (ShutdownSignal, Vec<ChildProcessRecord>) {
        let signal = signals.recv().await;
        tracing::info!(%signal, "Received shutdown signal");
        let stopped = self.shutdown().await.unwrap_or_default();
        (signal, stopped)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::supervisor::{ChildKind, ChildStatus, LaunchSpec, SupervisorConfig};
    use std::sync::Arc;
    use std::time::Duration;

    fn controller_with_sleepers(dir: &std::path::Path, n: usize) -> LifecycleController {
        let mut sup = ProcessSupervisor::new(
            SupervisorConfig::new(dir).with_grace_period(Duration::from_millis(500)),
        );
        for i in 0..n {
            sup.spawn(
                LaunchSpec::new(ChildKind::Script, format!("sleeper{i}"), "/bin/sh", dir)
                    .args(["-c", "exec sleep 30"]),
            )
            .unwrap();
        }
        LifecycleController::new(sup)
    }

    #[tokio::test]
    async fn concurrent_shutdowns_stop_once() {
        let dir = tempfile::tempdir().unwrap();
        let controller = Arc::new(controller_with_sleepers(dir.path(), 2));
        assert_eq!(controller.status_snapshot().await.len(), 2);

        let (a, b) = tokio::join!(controller.shutdown(), controller.shutdown());

        let performed: Vec<_> = [a, b].into_iter().flatten().collect();
        assert_eq!(performed.len(), 1);
        let stopped = &performed[0];
        assert_eq!(stopped.len(), 2);
        assert!(stopped.iter().all(|r| r.status == ChildStatus::Stopped));

        assert!(controller.shutdown().await.is_none());
        assert!(controller.status_snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn shutdown_from_spawned_tasks_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let controller = Arc::new(controller_with_sleepers(dir.path(), 1));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let c = Arc::clone(&controller);
                tokio::spawn(async move { c.shutdown().await })
            })
            .collect();

        let mut performed = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                performed += 1;
            }
        }
        assert_eq!(performed, 1);
    }

    #[tokio::test]
    async fn signal_before_wait_still_stops_children() {
        let dir = tempfile::tempdir().unwrap();
        let mut signals = ShutdownSignals::install().unwrap();

        // Delivered while children are being launched, before anyone waits.
        nix::sys::signal::raise(nix::sys::signal::Signal::SIGTERM).unwrap();
        let controller = controller_with_sleepers(dir.path(), 2);

        let (signal, stopped) =
            tokio::time::timeout(Duration::from_secs(5), controller.run_until_signal(&mut signals))
                .await
                .unwrap();

        assert_eq!(signal, ShutdownSignal::Terminate);
        assert_eq!(stopped.len(), 2);
        assert!(stopped.iter().all(|r| r.status == ChildStatus::Stopped));
        assert!(controller.status_snapshot().await.is_empty());
    }

    #[test]
    fn signal_names() {
        assert_eq!(ShutdownSignal::Interrupt.to_string(), "SIGINT");
        assert_eq!(ShutdownSignal::Terminate.to_string(), "SIGTERM");
    }
}
