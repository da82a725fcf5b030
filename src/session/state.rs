//! Generation session state

use serde::{Deserialize, Serialize};

pub const READY_STATUS: &str = "Ready to generate images!";
pub const STARTING_STATUS: &str = "Starting generation...";
pub const INTERRUPTED_STATUS: &str = "Generation interrupted";

/// How a generation attempt ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Settlement {
    Success {
        images: usize,
        progress: f32,
        status: String,
    },
    /// Progress stays where the last reading left it
    Failure {
        message: String,
        progress: f32,
    },
    Interrupted {
        progress: f32,
        status: String,
    },
}

/// Lifecycle of the single outstanding generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing outstanding; `error` holds a rejected submission's message
    Idle { error: Option<String> },
    /// Request sent, no progress reported yet
    Submitting { progress: f32, status: String },
    /// Request sent and the progress endpoint is answering
    Polling { progress: f32, status: String },
    Settled(Settlement),
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Idle { error: None }
    }
}

impl SessionState {
    pub fn submitting() -> Self {
        SessionState::Submitting {
            progress: 0.0,
            status: STARTING_STATUS.to_string(),
        }
    }

    pub fn success(images: usize) -> Self {
        SessionState::Settled(Settlement::Success {
            images,
            progress: 100.0,
            status: format!("{} image(s) generated successfully!", images),
        })
    }

    pub fn failure(message: impl Into<String>, progress: f32) -> Self {
        SessionState::Settled(Settlement::Failure {
            message: message.into(),
            progress,
        })
    }

    /// Failure keeping the currently displayed progress
    pub fn failed(&self, message: impl Into<String>) -> Self {
        SessionState::failure(message, self.progress())
    }

    /// Whether a request is outstanding
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionState::Submitting { .. } | SessionState::Polling { .. }
        )
    }

    /// Displayed completion percentage
    pub fn progress(&self) -> f32 {
        match self {
            SessionState::Submitting { progress, .. }
            | SessionState::Polling { progress, .. }
            | SessionState::Settled(Settlement::Success { progress, .. })
            | SessionState::Settled(Settlement::Failure { progress, .. })
            | SessionState::Settled(Settlement::Interrupted { progress, .. }) => *progress,
            SessionState::Idle { .. } => 0.0,
        }
    }

    /// Displayed status line
    pub fn status(&self) -> Option<&str> {
        match self {
            SessionState::Idle { error: None } => Some(READY_STATUS),
            SessionState::Submitting { status, .. }
            | SessionState::Polling { status, .. }
            | SessionState::Settled(Settlement::Success { status, .. })
            | SessionState::Settled(Settlement::Interrupted { status, .. }) => Some(status),
            _ => None,
        }
    }

    /// Error currently displayed, if any
    pub fn error(&self) -> Option<&str> {
        match self {
            SessionState::Idle { error } => error.as_deref(),
            SessionState::Settled(Settlement::Failure { message, .. }) => Some(message),
            _ => None,
        }
    }

    /// Apply a progress reading; ignored unless a request is outstanding
    pub fn apply_progress(&mut self, percent: f32, textinfo: Option<&str>) -> bool {
        let current = match self {
            SessionState::Submitting { status, .. } | SessionState::Polling { status, .. } => {
                status.clone()
            }
            _ => return false,
        };

        *self = SessionState::Polling {
            progress: percent,
            status: textinfo
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .unwrap_or(current),
        };
        true
    }

    /// Whether the delayed return to idle applies to this state
    pub fn auto_resets(&self) -> bool {
        matches!(
            self,
            SessionState::Settled(Settlement::Success { .. })
                | SessionState::Settled(Settlement::Interrupted { .. })
        )
    }
}
