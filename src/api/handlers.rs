//! HTTP request handlers

use crate::api::models::{
    GenerateResponse, HealthResponse, HistoryImage, HistoryListResponse, SeedResponse,
    SuccessResponse, UpstreamHealth,
};
use crate::backend::{load_catalog, Catalog};
use crate::error::AppError;
use crate::history::{HistoryRecord, HistoryStats};
use crate::session::{random_seed, AspectPreset, GenerationParameters, SessionState, ASPECT_PRESETS};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::info;

/// Submit a generation request and wait for its images
pub async fn generate(
    State(state): State<Arc<AppState>>,
    Json(params): Json<GenerationParameters>,
) -> Result<Json<GenerateResponse>, AppError> {
    info!(prompt = %params.prompt.trim(), "Received generation request");

    // Detached from the request future: a client disconnect must not cancel the attempt
    let session = state.session.clone();
    let images = tokio::spawn(async move { session.submit(params).await })
        .await
        .map_err(|e| AppError::Internal(format!("Generation task failed: {}", e)))??;

    Ok(Json(GenerateResponse {
        images: images.into_iter().map(HistoryImage::from).collect(),
        session: state.session.state(),
    }))
}

/// Current session state
pub async fn session_state(State(state): State<Arc<AppState>>) -> Json<SessionState> {
    Json(state.session.state())
}

/// Interrupt the outstanding generation
pub async fn interrupt(State(state): State<Arc<AppState>>) -> Json<SessionState> {
    Json(state.session.interrupt().await)
}

/// Samplers, checkpoints and LoRAs offered by the server
pub async fn catalog(State(state): State<Arc<AppState>>) -> Json<Catalog> {
    let catalog = load_catalog(state.api.as_ref(), &state.settings.session.default_sampler).await;
    state.session.set_default_sampler(catalog.default_sampler.clone());
    Json(catalog)
}

pub async fn presets() -> Json<Vec<AspectPreset>> {
    Json(ASPECT_PRESETS.to_vec())
}

pub async fn seed() -> Json<SeedResponse> {
    Json(SeedResponse {
        seed: random_seed(),
    })
}

/// List the history, newest first
pub async fn list_history(State(state): State<Arc<AppState>>) -> Json<HistoryListResponse> {
    let images: Vec<HistoryImage> = state
        .history
        .list()
        .into_iter()
        .map(HistoryImage::from)
        .collect();
    Json(HistoryListResponse {
        total: images.len(),
        images,
    })
}

pub async fn clear_history(State(state): State<Arc<AppState>>) -> Json<SuccessResponse> {
    state.history.clear();
    Json(SuccessResponse {
        success: true,
        message: "History cleared".to_string(),
    })
}

pub async fn history_stats(State(state): State<Arc<AppState>>) -> Json<HistoryStats> {
    Json(state.history.stats())
}

pub async fn get_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<HistoryImage>, AppError> {
    find(&state, &id).map(|record| Json(record.into()))
}

/// Remove one image; removing an unknown id succeeds
pub async fn remove_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<SuccessResponse> {
    let removed = state.history.remove(&id);
    Json(SuccessResponse {
        success: true,
        message: if removed {
            format!("Image '{}' removed", id)
        } else {
            format!("Image '{}' was not in the history", id)
        },
    })
}

/// Prompt text for a "copy prompt" action
pub async fn image_prompt(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = find(&state, &id)?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        record.prompt_text(),
    ))
}

/// Decoded PNG as a download
pub async fn download_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = find(&state, &id)?;
    let bytes = record.image_bytes()?;
    let disposition = format!("attachment; filename=\"{}\"", record.download_file_name());

    Ok((
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let reachable = state.api.health().await;

    Json(HealthResponse {
        status: if reachable { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        upstream: UpstreamHealth {
            base_url: state.settings.api.base_url.clone(),
            reachable,
        },
    })
}

fn find(state: &AppState, id: &str) -> Result<HistoryRecord, AppError> {
    state
        .history
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("Image '{}'", id)))
}
