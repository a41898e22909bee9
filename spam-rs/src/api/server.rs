//! API Server - HTTP server for the prediction API

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::handlers::{self, AppState};
use crate::config::ServerConfig;
use crate::pipeline::PredictionPipeline;

/// API Server
pub struct ApiServer {
    state: Arc<AppState>,
    addr: String,
    max_body_bytes: usize,
}

impl ApiServer {
    pub fn new(pipeline: Arc<PredictionPipeline>, config: &ServerConfig) -> Self {
        Self {
            state: Arc::new(AppState { pipeline }),
            addr: config.listen_addr.clone(),
            max_body_bytes: config.max_body_bytes,
        }
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/", get(handlers::root))
            .route("/health", get(handlers::health))
            .route("/predict", post(handlers::predict))
            .route("/models", get(handlers::models))
            .route("/stats", get(handlers::stats))
            .layer(DefaultBodyLimit::max(self.max_body_bytes))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(self.state.clone())
    }

    /// Start the API server
    pub async fn run(&self) -> std::io::Result<()> {
        let router = self.router();

        info!("Starting API server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
