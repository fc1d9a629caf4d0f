//! Router construction and server lifecycle.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use slipstream_core::config::SlipstreamConfig;
use slipstream_core::session::SessionManager;
use slipstream_core::streaming::Remuxer;
use slipstream_search::SearchService;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::handlers::{
    list_torrent_files, search_torrents, search_tv_torrents, serve_stream, start_stream,
    stop_stream, stream_status,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Session registry and lifecycle.
    pub sessions: Arc<SessionManager>,
    /// Per-request remuxer process factory.
    pub remuxer: Arc<Remuxer>,
    /// Torrent search provider registry.
    pub search: SearchService,
}

/// Builds the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/stream/start", post(start_stream))
        .route("/stream/{id}", get(serve_stream).delete(stop_stream))
        .route("/stream/{id}/status", get(stream_status))
        .route("/torrents/files", post(list_torrent_files))
        .route("/torrents/search", get(search_torrents))
        .route("/torrents/search/tv", get(search_tv_torrents))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds the listener and serves until ctrl-c, then stops every session
/// and shuts the torrent client down.
pub async fn run_server(
    config: &SlipstreamConfig,
    state: AppState,
) -> Result<(), Box<dyn std::error::Error>> {
    let sessions = Arc::clone(&state.sessions);

    let addr = format!("0.0.0.0:{}", config.http.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Slipstream server listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down: stopping sessions and torrent client");
    sessions.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
