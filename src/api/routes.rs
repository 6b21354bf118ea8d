//! HTTP route wiring and server startup.

use std::sync::Arc;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::hub::{HubConfig, StatsHub};
use crate::llm::{GeminiClient, GenerationClient};
use crate::stats::UsageCounter;
use crate::tasks::Dispatcher;

use super::process;
use super::stats_ws;
use super::types::HealthResponse;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub dispatcher: Dispatcher,
    /// Usage tally, shared with the dispatcher and the hub
    pub counter: Arc<UsageCounter>,
    /// Handle to the live-stats broadcast loop
    pub hub: StatsHub,
}

impl AppState {
    /// Build the state around a generation client and spawn the stats hub.
    /// Must be called from within a Tokio runtime.
    pub fn new(config: Config, client: Arc<dyn GenerationClient>, hub_config: HubConfig) -> Self {
        let counter = Arc::new(UsageCounter::new());
        let hub = StatsHub::spawn(Arc::clone(&counter), hub_config);
        let dispatcher = Dispatcher::new(client, Arc::clone(&counter));
        Self {
            config,
            dispatcher,
            counter,
            hub,
        }
    }
}

/// Build the router. Unmatched paths fall through to the static asset
/// directory when it exists.
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/api/health", get(health))
        .route(
            "/api/process",
            post(process::process).fallback(process::invalid_method),
        )
        .route("/ws", get(stats_ws::stats_ws));

    let static_dir = &state.config.static_dir;
    if static_dir.is_dir() {
        app = app.fallback_service(ServeDir::new(static_dir));
    } else {
        tracing::warn!(
            "Static directory {} not found, serving API only",
            static_dir.display()
        );
    }

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let client: Arc<dyn GenerationClient> = Arc::new(GeminiClient::new(config.gemini())?);
    tracing::info!(model = %config.model, "Gemini client ready");

    let addr = config.bind_addr();
    let state = Arc::new(AppState::new(config, client, HubConfig::default()));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let listeners = state.hub.listener_count().await.unwrap_or(0);
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        listeners,
    })
}
