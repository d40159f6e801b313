//! Coordinated shutdown
//!
//! One root [`CancellationToken`] per process. Producers, the log sweeper and
//! every stream connection hold a child token; [`ShutdownController::shutdown`]
//! cancels the root and then waits (bounded) for registered tasks to drain.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 10;

/// Lifecycle of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// Normal operation
    Running,
    /// Root token cancelled, waiting for registered tasks
    Draining,
    /// Done
    Terminated,
}

impl std::fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Draining => write!(f, "Draining"),
            Self::Terminated => write!(f, "Terminated"),
        }
    }
}

/// Owns the root cancellation token and counts tasks that must finish before exit.
pub struct ShutdownController {
    cancel_token: CancellationToken,
    phase: AtomicU8,
    initiated: AtomicBool,
    active_tasks: AtomicUsize,
    drain_timeout: Duration,
}

impl ShutdownController {
    /// Controller with the default drain timeout.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_DRAIN_TIMEOUT_SECS))
    }

    /// Controller that gives registered tasks `drain_timeout` to finish.
    #[must_use]
    pub fn with_timeout(drain_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            cancel_token: CancellationToken::new(),
            phase: AtomicU8::new(ShutdownPhase::Running as u8),
            initiated: AtomicBool::new(false),
            active_tasks: AtomicUsize::new(0),
            drain_timeout,
        })
    }

    /// Child token for a component. Cancelling it does not affect siblings.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> ShutdownPhase {
        match self.phase.load(Ordering::SeqCst) {
            0 => ShutdownPhase::Running,
            1 => ShutdownPhase::Draining,
            _ => ShutdownPhase::Terminated,
        }
    }

    /// True once `shutdown` has been called.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.initiated.load(Ordering::SeqCst)
    }

    /// Count a task that shutdown should wait for. The guard is `'static` so it
    /// can move into a spawned task.
    pub fn register_task(self: &Arc<Self>) -> TaskGuard {
        self.active_tasks.fetch_add(1, Ordering::SeqCst);
        TaskGuard {
            controller: Arc::clone(self),
        }
    }

    /// Number of registered tasks still running.
    #[must_use]
    pub fn active_task_count(&self) -> usize {
        self.active_tasks.load(Ordering::SeqCst)
    }

    fn set_phase(&self, phase: ShutdownPhase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
        info!(phase = %phase, "Shutdown phase changed");
    }

    /// Cancel everything and wait for registered tasks. Idempotent.
    pub async fn shutdown(&self) {
        if self
            .initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Shutdown already initiated");
            return;
        }

        self.set_phase(ShutdownPhase::Draining);
        self.cancel_token.cancel();

        let started = std::time::Instant::now();
        loop {
            let active = self.active_task_count();
            if active == 0 {
                info!("All tasks completed");
                break;
            }
            if started.elapsed() >= self.drain_timeout {
                warn!(
                    active_tasks = active,
                    timeout_secs = self.drain_timeout.as_secs(),
                    "Drain timeout exceeded, exiting anyway"
                );
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        self.set_phase(ShutdownPhase::Terminated);
    }
}

/// Decrements the controller's task count on drop.
pub struct TaskGuard {
    controller: Arc<ShutdownController>,
}

impl TaskGuard {
    /// Child token of the controller's root.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.controller.token()
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.controller.active_tasks.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received SIGTERM signal"),
    }
}

/// Signal future for `axum::serve(..).with_graceful_shutdown`.
pub async fn shutdown_signal_with_controller(controller: Arc<ShutdownController>) {
    tokio::select! {
        _ = wait_for_shutdown_signal() => controller.shutdown().await,
        _ = controller.cancel_token.cancelled() => {}
    }
}
