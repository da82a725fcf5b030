//! Main entry point for SD Studio

use sd_studio::{api, backend::load_catalog, config::Settings, AppState};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::load()?;
    settings.validate()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    if settings.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }

    info!("Starting SD Studio");
    info!(
        "Loaded configuration: server={}:{}, api={}",
        settings.server.host, settings.server.port, settings.api.base_url
    );

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let app_state = Arc::new(AppState::from_settings(settings)?);
    info!(images = app_state.history.len(), "Image history ready");

    // Probe the Stable Diffusion server; an unreachable server is not fatal
    if app_state.api.health().await {
        let catalog = load_catalog(
            app_state.api.as_ref(),
            &app_state.settings.session.default_sampler,
        )
        .await;
        info!(
            samplers = catalog.samplers.len(),
            models = catalog.models.len(),
            loras = catalog.loras.len(),
            default_sampler = %catalog.default_sampler,
            "Loaded model catalog"
        );
        app_state.session.set_default_sampler(catalog.default_sampler);
    } else {
        warn!(
            base_url = %app_state.settings.api.base_url,
            "Stable Diffusion API is not reachable yet"
        );
    }

    // Build the router
    let app = api::routes::create_router(app_state.clone());

    info!("Server listening on {}", addr);

    // Start the server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
