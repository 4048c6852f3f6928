use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use super::alert_service::AlertCenter;

/// How often active alerts are re-evaluated against live prices.
pub const EVALUATION_PERIOD: Duration = Duration::from_secs(60);

/// Periodic driver for `AlertCenter::evaluate`, with an explicit
/// start/stop lifecycle.
///
/// The tick loop evaluates immediately on start and then once per period. It
/// terminates on its own when the active-alert set empties — the timer is
/// disabled, not idling — and `sync()` re-arms it when an alert is added.
/// Dropping the scheduler aborts the task, so a torn-down owning context
/// cannot leak an orphaned timer.
pub struct AlertScheduler {
    center: Arc<AlertCenter>,
    period: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl AlertScheduler {
    pub fn new(center: Arc<AlertCenter>) -> Self {
        Self::with_period(center, EVALUATION_PERIOD)
    }

    /// Scheduler with a custom period (tests use short ones).
    pub fn with_period(center: Arc<AlertCenter>, period: Duration) -> Self {
        Self {
            center,
            period,
            handle: Mutex::new(None),
        }
    }

    /// Spawn the tick loop if it is not already running.
    pub fn start(&self) {
        let mut slot = self.lock_handle();
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let center = Arc::clone(&self.center);
        let period = self.period;
        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                // First tick completes immediately: evaluation runs on start,
                // then once per period.
                ticker.tick().await;
                if center.active_alert_count() == 0 {
                    debug!("no active alerts left, stopping evaluation loop");
                    break;
                }
                // Failures are logged inside evaluate; the fixed period is the
                // retry policy, so the loop just keeps ticking.
                let _ = center.evaluate().await;
            }
        }));
    }

    /// Cancel the tick loop. Safe to call when not running.
    pub fn stop(&self) {
        if let Some(handle) = self.lock_handle().take() {
            handle.abort();
        }
    }

    /// Arm or disarm based on the current active-alert count: called after
    /// alert add/remove so the 0→1 transition starts the loop and the 1→0
    /// transition stops it.
    pub fn sync(&self) {
        if self.center.active_alert_count() > 0 {
            self.start();
        } else {
            self.stop();
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lock_handle().as_ref().is_some_and(|h| !h.is_finished())
    }

    fn lock_handle(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for AlertScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
