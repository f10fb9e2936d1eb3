use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use murmur_core::{ConnectionRegistry, MessageStore};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

use crate::config::ServerConfig;

pub mod websocket;

/// Server application state
pub struct AppState {
    /// Message router shared by every connection
    pub router: Arc<murmur_core::Router>,
    /// Effective configuration
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let store = match config.history_limit {
            Some(limit) => MessageStore::with_capacity_limit(limit),
            None => MessageStore::new(),
        };
        let router = murmur_core::Router::new(Arc::new(ConnectionRegistry::new()), Arc::new(store))
            .with_max_message_len(config.max_message_len);

        Self {
            router: Arc::new(router),
            config,
        }
    }
}

/// Bind the configured address and serve until `shutdown` is cancelled.
pub async fn start(config: ServerConfig, shutdown: CancellationToken) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let state = Arc::new(AppState::new(config));
    serve(listener, state, shutdown).await
}

/// Serve on an already bound listener.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = create_router(state);

    let addr = listener.local_addr()?;
    info!("Starting Axum HTTP server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            info!("HTTP server received shutdown signal, draining connections");
        })
        .await?;

    Ok(())
}

/// Create the Axum router with all routes and middleware
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(Arc::clone(&state))
        .merge(websocket::router(state))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
}

/// Response for the health check
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    connections: usize,
    messages: usize,
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy",
            service: "murmur-server",
            version: env!("CARGO_PKG_VERSION"),
            connections: state.router.registry().connection_count(),
            messages: state.router.store().len().await,
        }),
    )
}
