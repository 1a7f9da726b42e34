//! HTTP server setup and routing
//!
//! Sets up the Axum router for control endpoints and SSE.

use crate::content::ContentProvider;
use crate::error::{Error, Result};
use crate::playback::SessionController;
use crate::state::SharedState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use sqlx::{Pool, Sqlite};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<SharedState>,
    pub controller: Arc<SessionController>,
    pub db_pool: Pool<Sqlite>,
    pub content: Arc<dyn ContentProvider>,
    /// Reciter used when neither the request nor the settings table names one
    pub default_reciter: String,
}

pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(super::handlers::health))
        .route("/build_info", get(super::handlers::get_build_info))
        .route("/audio/devices", get(super::handlers::list_audio_devices))

        // Session lifecycle
        .route("/sessions", post(super::handlers::start_session))
        .route("/sessions", delete(super::handlers::stop_session))
        .route("/sessions/section/:section_id", post(super::handlers::start_section_session))

        // Transport control
        .route("/playback/play", post(super::handlers::play))
        .route("/playback/pause", post(super::handlers::pause))
        .route("/playback/next", post(super::handlers::next))
        .route("/playback/previous", post(super::handlers::previous))
        .route("/playback/seek", post(super::handlers::seek))
        .route("/playback/jump", post(super::handlers::jump))
        .route("/playback/state", get(super::handlers::get_playback_state))
        .route("/playback/config", put(super::handlers::configure))

        // Saved sections
        .route("/sections", get(super::handlers::list_sections))
        .route("/sections", post(super::handlers::create_section))
        .route("/sections/:section_id", delete(super::handlers::delete_section))

        // Stored playback defaults
        .route("/settings/playback", get(super::handlers::get_playback_defaults))
        .route("/settings/playback", put(super::handlers::update_playback_defaults))

        // SSE event stream
        .route("/events", get(super::sse::event_stream))

        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Run HTTP API server until `shutdown` resolves
pub async fn run(
    port: u16,
    ctx: AppContext,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = build_router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
