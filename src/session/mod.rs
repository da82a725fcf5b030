//! Generation session: parameters, state machine and progress polling

pub mod controller;
pub mod params;
pub mod poller;
pub mod state;

pub use controller::SessionController;
pub use params::{random_seed, AspectPreset, GenerationParameters, ASPECT_PRESETS};
pub use state::{SessionState, Settlement};
