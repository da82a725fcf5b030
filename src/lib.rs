//! SD Studio
//!
//! A local studio service for AUTOMATIC1111-compatible Stable Diffusion servers:
//! submits txt2img jobs, tracks their progress, and keeps a persistent history of the
//! generated images.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod history;
pub mod session;

pub use error::{AppError, Result};

use std::sync::Arc;

use backend::{Automatic1111Client, StableDiffusionApi};
use config::{HistoryBackend, Settings};
use history::{FileStorage, HistoryStorage, HistoryStore, MemoryStorage};
use session::SessionController;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<Settings>,
    pub api: Arc<dyn StableDiffusionApi>,
    pub history: Arc<HistoryStore>,
    pub session: Arc<SessionController>,
}

impl AppState {
    /// Wire the state from already-built collaborators
    pub fn new(
        settings: Settings,
        api: Arc<dyn StableDiffusionApi>,
        storage: Arc<dyn HistoryStorage>,
    ) -> Self {
        let history = Arc::new(
            HistoryStore::load(storage)
                .with_record_size_mb(settings.history.record_size_estimate_mb),
        );
        let session = Arc::new(SessionController::new(
            api.clone(),
            history.clone(),
            settings.session.clone(),
        ));

        Self {
            settings: Arc::new(settings),
            api,
            history,
            session,
        }
    }

    /// Build the HTTP client and history storage described by `settings`
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let api: Arc<dyn StableDiffusionApi> = Arc::new(Automatic1111Client::new(&settings.api)?);

        let storage: Arc<dyn HistoryStorage> = match settings.history.backend {
            HistoryBackend::File => Arc::new(FileStorage::new(settings.history.file_path())),
            HistoryBackend::Memory => Arc::new(MemoryStorage::new()),
        };

        Ok(Self::new(settings, api, storage))
    }
}
