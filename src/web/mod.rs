//! Web server module.

mod handlers;

pub use handlers::*;

use crate::backend::QueueRegistry;
use crate::config::ServerConfig;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub registry: QueueRegistry,
}

/// HTTP API server for the dashboard.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, registry: QueueRegistry) -> Self {
        Self {
            state: AppState { config, registry },
        }
    }

    /// Build the router with all routes.
    pub fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

        Router::new()
            // Dashboard
            .route("/", get(handlers::handle_dashboard))
            // Read API
            .route("/api/queues", get(handlers::handle_get_queues))
            .route("/api/stats", get(handlers::handle_get_stats))
            // Queue actions
            .route("/api/queues/{queue}/retry/{status}", put(handlers::handle_retry_all))
            .route("/api/queues/{queue}/promote", put(handlers::handle_promote_all))
            .route("/api/queues/{queue}/clean/{status}", put(handlers::handle_clean_all))
            .route("/api/queues/{queue}/pause", put(handlers::handle_pause_queue))
            .route("/api/queues/{queue}/resume", put(handlers::handle_resume_queue))
            .route("/api/queues/{queue}/empty", put(handlers::handle_empty_queue))
            .route("/api/queues/{queue}/add", post(handlers::handle_add_job))
            // Static assets
            .route("/favicon.ico", get(handlers::handle_favicon))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
            .with_state(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
