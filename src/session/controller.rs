//! Generation session controller
//!
//! Owns the lifecycle of one outstanding txt2img request:
//! `Idle -> Submitting -> Polling -> Settled(..) -> Idle`.
//! While a request is outstanding a [`ProgressPoller`] updates the displayed progress;
//! the poller is disarmed on every exit path, including the submit future being dropped.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::backend::StableDiffusionApi;
use crate::config::SessionConfig;
use crate::error::{AppError, Result};
use crate::history::{HistoryRecord, HistoryStore};
use crate::session::params::GenerationParameters;
use crate::session::poller::{PollerHandle, ProgressPoller, SharedState};
use crate::session::state::{SessionState, Settlement, INTERRUPTED_STATUS};

pub struct SessionController {
    api: Arc<dyn StableDiffusionApi>,
    history: Arc<HistoryStore>,
    state: SharedState,
    poller: Mutex<Option<PollerHandle>>,
    reset_task: Mutex<Option<JoinHandle<()>>>,
    default_sampler: RwLock<String>,
    config: SessionConfig,
}

/// Disarms the attempt's poller when dropped; settles the attempt as cancelled if it is
/// still outstanding at that point.
struct AttemptGuard<'a> {
    controller: &'a SessionController,
    attempt: u64,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if self
            .controller
            .settle(self.attempt, |current| current.failed("Generation was cancelled"))
        {
            warn!(attempt = self.attempt, "Generation abandoned before completion");
        }
        self.controller.disarm(self.attempt);
    }
}

impl SessionController {
    pub fn new(
        api: Arc<dyn StableDiffusionApi>,
        history: Arc<HistoryStore>,
        config: SessionConfig,
    ) -> Self {
        Self {
            api,
            history,
            state: Arc::new(Mutex::new((0, SessionState::default()))),
            poller: Mutex::new(None),
            reset_task: Mutex::new(None),
            default_sampler: RwLock::new(config.default_sampler.clone()),
            config,
        }
    }

    /// Current state snapshot
    pub fn state(&self) -> SessionState {
        self.state.lock().1.clone()
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().1.is_active()
    }

    /// Whether a progress poller is currently armed
    pub fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    pub fn default_sampler(&self) -> String {
        self.default_sampler.read().clone()
    }

    /// Sampler used when a request does not name one
    pub fn set_default_sampler(&self, sampler: impl Into<String>) {
        *self.default_sampler.write() = sampler.into();
    }

    /// Validate, submit and wait for one generation request.
    ///
    /// Returns the history records created from the response, newest batch already
    /// inserted at the head of the history.
    pub async fn submit(&self, params: GenerationParameters) -> Result<Vec<HistoryRecord>> {
        if let Err(e) = params.validate() {
            let mut slot = self.state.lock();
            if !slot.1.is_active() {
                slot.1 = SessionState::Idle {
                    error: Some(e.user_message()),
                };
            }
            debug!(error = %e, "Rejected generation parameters");
            return Err(e);
        }

        let attempt = {
            let mut slot = self.state.lock();
            if slot.1.is_active() {
                return Err(AppError::Busy);
            }
            slot.0 += 1;
            slot.1 = SessionState::submitting();
            slot.0
        };
        self.cancel_reset();

        let request = params.to_request(&self.default_sampler.read());
        info!(
            attempt,
            prompt = %request.prompt,
            width = request.width,
            height = request.height,
            steps = request.steps,
            batch_size = request.batch_size,
            "Starting generation"
        );

        *self.poller.lock() = Some(ProgressPoller::arm(
            self.api.clone(),
            self.state.clone(),
            attempt,
            self.config.poll_interval(),
        ));
        let guard = AttemptGuard {
            controller: self,
            attempt,
        };

        let outcome = self.api.generate(&request).await;

        match outcome {
            Ok(response) => {
                let records = HistoryRecord::from_response(
                    &response,
                    &request.prompt,
                    request.negative_prompt.as_deref(),
                );
                for record in &records {
                    self.history.add(record.clone());
                }

                if self.settle(attempt, |_| SessionState::success(records.len())) {
                    self.schedule_reset(attempt);
                }
                drop(guard);

                info!(attempt, images = records.len(), "Generation completed");
                Ok(records)
            }
            Err(e) => {
                let message = format!("Failed to generate image: {}", e.user_message());
                self.settle(attempt, |current| current.failed(message));
                drop(guard);

                error!(attempt, error = %e, "Generation failed");
                Err(e)
            }
        }
    }

    /// Stop the outstanding request.
    ///
    /// The local state moves to `Interrupted` right away; the remote call is best-effort
    /// and its failure is only logged. Without an outstanding request this is a no-op.
    pub async fn interrupt(&self) -> SessionState {
        let attempt = {
            let mut slot = self.state.lock();
            if !slot.1.is_active() {
                debug!("Interrupt requested with no generation outstanding");
                return slot.1.clone();
            }
            let progress = slot.1.progress();
            slot.1 = SessionState::Settled(Settlement::Interrupted {
                progress,
                status: INTERRUPTED_STATUS.to_string(),
            });
            slot.0
        };
        self.disarm(attempt);
        self.schedule_reset(attempt);

        info!(attempt, "Interrupting generation");
        if let Err(e) = self.api.interrupt().await {
            warn!(attempt, error = %e, "Interrupt request failed");
        }

        self.state()
    }

    /// Replace the state if `attempt` still owns it and is outstanding
    fn settle(&self, attempt: u64, next: impl FnOnce(&SessionState) -> SessionState) -> bool {
        let mut slot = self.state.lock();
        if slot.0 == attempt && slot.1.is_active() {
            slot.1 = next(&slot.1);
            true
        } else {
            false
        }
    }

    fn disarm(&self, attempt: u64) {
        let mut poller = self.poller.lock();
        if poller.as_ref().map_or(false, |h| h.attempt() == attempt) {
            poller.take();
        }
    }

    fn schedule_reset(&self, attempt: u64) {
        let state = self.state.clone();
        let delay = self.config.reset_delay();

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut slot = state.lock();
            if slot.0 == attempt && slot.1.auto_resets() {
                slot.1 = SessionState::default();
                debug!(attempt, "Session reset to idle");
            }
        });

        if let Some(previous) = self.reset_task.lock().replace(task) {
            previous.abort();
        }
    }

    fn cancel_reset(&self) {
        if let Some(task) = self.reset_task.lock().take() {
            task.abort();
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.cancel_reset();
        self.poller.get_mut().take();
    }
}
