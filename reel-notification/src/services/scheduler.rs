use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::services::synchronizer::{RefreshOutcome, Synchronizer};

/// Lower bound on the refresh cadence.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Periodic refresh driver.
///
/// The first tick fires immediately, which doubles as the cold-start refresh.
/// Ticks that land while a refresh is still running simply join it.
pub struct Scheduler {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Scheduler {
    pub fn spawn(sync: Synchronizer, interval: Duration) -> Self {
        let interval = interval.max(MIN_INTERVAL);
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            info!(interval_ms = interval.as_millis() as u64, "refresh scheduler started");

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let outcome = sync.refresh().await;
                        debug!(?outcome, "scheduled refresh finished");
                        if outcome == RefreshOutcome::Discarded {
                            break;
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("refresh scheduler stopped");
        });

        Self { stop_tx, handle }
    }

    /// Signal the loop to exit. Idempotent.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
