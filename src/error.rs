//! Error types for the studio service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Request parameters rejected before any network call
    #[error("{0}")]
    Validation(String),

    /// Transport-level failure talking to the Stable Diffusion server
    #[error("Failed to connect to the API: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// The Stable Diffusion server answered with a non-success response
    #[error("{0}")]
    Server(String),

    /// Local history storage could not be read or written
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A generation request is already outstanding
    #[error("A generation is already in progress")]
    Busy,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Short machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::HttpClient(_) => "network_error",
            AppError::Server(_) => "server_error",
            AppError::Persistence(_) => "persistence_error",
            AppError::Config(_) => "config_error",
            AppError::NotFound(_) => "not_found",
            AppError::Busy => "busy",
            AppError::Io(_) => "io_error",
            AppError::Serialization(_) => "serialization_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Message suitable for showing to the user.
    ///
    /// Transport failures collapse into a generic connection message; everything
    /// else is displayed as-is.
    pub fn user_message(&self) -> String {
        match self {
            AppError::HttpClient(_) => "Failed to connect to the API".to_string(),
            other => other.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Busy => StatusCode::CONFLICT,
            AppError::HttpClient(_) | AppError::Server(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "Request failed");
        }

        let body = Json(json!({
            "error": {
                "message": self.user_message(),
                "type": self.kind(),
            }
        }));

        (status, body).into_response()
    }
}
