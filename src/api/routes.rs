//! HTTP route definitions

use crate::api::handlers;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the main application router
pub fn create_router(state: Arc<crate::AppState>) -> Router {
    let api_routes = Router::new()
        // Generation session
        .route("/generate", post(handlers::generate))
        .route("/session", get(handlers::session_state))
        .route("/interrupt", post(handlers::interrupt))
        // Form helpers
        .route("/catalog", get(handlers::catalog))
        .route("/presets", get(handlers::presets))
        .route("/seed", get(handlers::seed))
        // History
        .route(
            "/history",
            get(handlers::list_history).delete(handlers::clear_history),
        )
        .route("/stats", get(handlers::history_stats))
        .route(
            "/history/:id",
            get(handlers::get_image).delete(handlers::remove_image),
        )
        .route("/history/:id/prompt", get(handlers::image_prompt))
        .route("/history/:id/image", get(handlers::download_image));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api_routes)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
