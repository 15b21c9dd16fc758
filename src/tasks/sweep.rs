//! TTL Sweep Task
//!
//! Background task that periodically removes expired cache entries. Each
//! cache owns exactly one of these and stops it on shutdown.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Smallest period accepted for a sweep; tokio intervals must be non-zero.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

// == Sweep Target ==
/// Something that can drop its expired entries in one pass.
pub trait Sweep: Send + Sync + 'static {
    /// Removes expired entries and returns how many were removed.
    fn sweep(&self) -> usize;
}

// == Sweep Task Handle ==
/// Handle to a running sweep task.
///
/// Dropping the handle also stops the task at its next wake-up.
#[derive(Debug)]
pub struct SweepTask {
    name: &'static str,
    stop_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl SweepTask {
    /// Asks the task to stop and waits up to `grace` for it to finish,
    /// aborting it if it does not.
    pub async fn stop(mut self, grace: Duration) {
        if let Some(tx) = self.stop_tx.take() {
            // The task may already be gone if its cache was dropped.
            let _ = tx.send(());
        }

        match tokio::time::timeout(grace, &mut self.handle).await {
            Ok(_) => info!(cache = self.name, "TTL sweep task stopped"),
            Err(_) => {
                warn!(
                    cache = self.name,
                    "TTL sweep task did not stop within {:?}, aborting", grace
                );
                self.handle.abort();
            }
        }
    }

    /// Returns true once the task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Spawns a background task that sweeps `target` every `interval`.
///
/// The task only holds a weak reference, so it exits on its own once the
/// target is dropped. The first sweep happens one full interval after spawn.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_sweep_task<S: Sweep>(
    target: Weak<S>,
    name: &'static str,
    interval: Duration,
) -> SweepTask {
    let interval = interval.max(MIN_SWEEP_INTERVAL);
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        info!(
            cache = name,
            "Starting TTL sweep task with interval of {:?}", interval
        );

        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut stop_rx => {
                    debug!(cache = name, "TTL sweep task received stop signal");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let Some(target) = target.upgrade() else {
                debug!(cache = name, "Cache dropped, TTL sweep task exiting");
                break;
            };

            let removed = target.sweep();
            if removed > 0 {
                info!(cache = name, "TTL sweep: removed {} expired entries", removed);
            } else {
                debug!(cache = name, "TTL sweep: no expired entries found");
            }
        }
    });

    SweepTask {
        name,
        stop_tx: Some(stop_tx),
        handle,
    }
}
