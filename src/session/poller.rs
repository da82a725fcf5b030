//! Periodic progress polling tied to one generation attempt

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::backend::StableDiffusionApi;
use crate::session::state::SessionState;

/// Shared session slot: the attempt number and the state it owns
pub(crate) type SharedState = Arc<Mutex<(u64, SessionState)>>;

/// Owned handle to a running poll loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct PollerHandle {
    task: JoinHandle<()>,
    attempt: u64,
}

impl PollerHandle {
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        debug!(attempt = self.attempt, "Disarming progress poller");
        self.task.abort();
    }
}

pub struct ProgressPoller;

impl ProgressPoller {
    /// Start polling every `period`; the first request goes out after one period.
    ///
    /// Readings only land while `attempt` still owns the shared state and a request is
    /// outstanding. Failed polls are skipped.
    pub(crate) fn arm(
        api: Arc<dyn StableDiffusionApi>,
        state: SharedState,
        attempt: u64,
        period: Duration,
    ) -> PollerHandle {
        debug!(attempt, period_ms = period.as_millis() as u64, "Arming progress poller");

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                match api.progress().await {
                    Ok(snapshot) => {
                        let mut slot = state.lock();
                        if slot.0 != attempt || !slot.1.is_active() {
                            break;
                        }
                        slot.1
                            .apply_progress(snapshot.percent(), snapshot.textinfo.as_deref());
                        trace!(attempt, progress = snapshot.progress, "Progress updated");
                    }
                    Err(e) => {
                        debug!(attempt, error = %e, "Progress poll failed, skipping tick");
                    }
                }
            }
        });

        PollerHandle { task, attempt }
    }
}
