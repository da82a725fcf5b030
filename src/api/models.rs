//! API request and response models

use serde::{Deserialize, Serialize};

use crate::history::HistoryRecord;
use crate::session::SessionState;

/// A history record plus the display fields a gallery card shows
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryImage {
    #[serde(flatten)]
    pub record: HistoryRecord,
    /// `dd/mm/YYYY HH:MM`
    pub formatted_timestamp: String,
    pub estimated_size_kb: u64,
}

impl From<HistoryRecord> for HistoryImage {
    fn from(record: HistoryRecord) -> Self {
        Self {
            formatted_timestamp: record.formatted_timestamp(),
            estimated_size_kb: record.estimated_size_kb(),
            record,
        }
    }
}

/// Result of a finished generation request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerateResponse {
    pub images: Vec<HistoryImage>,
    pub session: SessionState,
}

/// History listing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryListResponse {
    pub images: Vec<HistoryImage>,
    pub total: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SeedResponse {
    pub seed: i64,
}

/// Health check response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub upstream: UpstreamHealth,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamHealth {
    pub base_url: String,
    pub reachable: bool,
}

/// Generic success response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}
