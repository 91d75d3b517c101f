//! Arbor server binary
//!
//! # Environment Variables
//!
//! - `ARBOR_PORT`, `ARBOR_BIND`, `ARBOR_DATA_DIR`, `CORS_ALLOW_ORIGIN`: see [`arbor_server::config`]
//! - `RUST_LOG`: Logging level (e.g., "info", "debug", "trace")

use arbor_server::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!("Arbor server, port {}", config.port);

    arbor_server::start_server(config).await
}
