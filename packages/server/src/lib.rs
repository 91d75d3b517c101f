//! Arbor HTTP server
//!
//! REST API over the tree service. Routes live in endpoint modules that are
//! merged into one router here.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p arbor-server
//!
//! # Custom port and data directory
//! ARBOR_PORT=3002 ARBOR_DATA_DIR=/tmp/arbor cargo run -p arbor-server
//! ```
//!
//! # Security
//!
//! - Binds to 127.0.0.1 unless `ARBOR_BIND` says otherwise
//! - CORS restricted to the configured origins
//! - No authentication

use axum::{
    http::{header::HeaderValue, Method},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use arbor_core::db::FileStore;
use arbor_core::TreeService;

pub mod config;
mod http_error;
mod node_endpoints;

pub use config::ServerConfig;
pub use http_error::HttpError;

/// Application state shared across all endpoints
///
/// The tree service serializes writes itself, so handlers share it without
/// further locking.
#[derive(Clone)]
pub struct AppState {
    pub service: TreeService,
}

impl AppState {
    pub fn new(service: TreeService) -> Self {
        Self { service }
    }
}

/// Create the application router with every endpoint module merged in
pub fn create_router(state: AppState, cors_origins: Vec<HeaderValue>) -> Router {
    Router::new()
        .merge(node_endpoints::routes(state))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers(Any)
        .allow_credentials(false)
}

/// Open the store, initialize the tree and serve until the process exits
///
/// # Errors
///
/// Returns error if the store cannot be opened or initialized, or if the
/// server fails to bind or start.
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.data_dir).await?;
    let store = FileStore::new(&config.data_dir)?;
    let service = TreeService::new(Arc::new(store));
    let tree = service.initialize().await?;

    tracing::info!(
        data_dir = %config.data_dir.display(),
        nodes = tree.len(),
        "store ready"
    );

    let addr = config.socket_addr();
    let app = create_router(AppState::new(service), config.cors_origins);

    tracing::info!("HTTP server starting on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
