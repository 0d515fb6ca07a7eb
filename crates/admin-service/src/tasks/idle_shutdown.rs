//! Idle shutdown background task.
//!
//! Periodically compares the time since the last request with the idle
//! timeout and cancels the server's shutdown token once it is exceeded.
//!
//! # Graceful Shutdown
//!
//! The task also exits when the token is cancelled by something else
//! (SIGTERM, ctrl-c).

use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default interval between idle checks.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Time of the most recent request.
#[derive(Debug)]
pub struct ActivityTracker {
    last_request: Mutex<Instant>,
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityTracker {
    /// A tracker whose last activity is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_request: Mutex::new(Instant::now()),
        }
    }

    /// Record activity now.
    pub fn touch(&self) {
        if let Ok(mut last) = self.last_request.lock() {
            *last = Instant::now();
        }
    }

    /// Time since the last recorded activity.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_request
            .lock()
            .map(|last| last.elapsed())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct IdleShutdownConfig {
    pub idle_timeout: Duration,
    pub check_interval: Duration,
}

impl IdleShutdownConfig {
    #[must_use]
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }
}

/// Run the idle check loop until idle or until `cancel_token` fires.
///
/// Cancels `cancel_token` itself when the idle timeout is exceeded.
pub async fn start_idle_shutdown(
    tracker: std::sync::Arc<ActivityTracker>,
    config: IdleShutdownConfig,
    cancel_token: CancellationToken,
) {
    info!(
        target: "admin.task.idle_shutdown",
        idle_timeout_secs = config.idle_timeout.as_secs(),
        check_interval_secs = config.check_interval.as_secs(),
        "Starting idle shutdown task"
    );

    let mut interval = tokio::time::interval(config.check_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let idle = tracker.idle_for();
                if idle >= config.idle_timeout {
                    warn!(
                        target: "admin.task.idle_shutdown",
                        idle_secs = idle.as_secs(),
                        "Idle timeout exceeded, shutting down"
                    );
                    cancel_token.cancel();
                    break;
                }
            }
            () = cancel_token.cancelled() => {
                info!(
                    target: "admin.task.idle_shutdown",
                    "Idle shutdown task received shutdown signal, exiting"
                );
                break;
            }
        }
    }
}
