//! Runtime configuration
//!
//! Read once from the environment at start-up and passed explicitly to the
//! router and the store.
//!
//! # Environment Variables
//!
//! - `ARBOR_PORT`: port to listen on (default: 3001)
//! - `ARBOR_BIND`: address to bind (default: 127.0.0.1)
//! - `ARBOR_DATA_DIR`: directory holding the node files (default: `~/.arbor/nodes`)
//! - `CORS_ALLOW_ORIGIN`: comma-separated allowed origins (default: local Vite ports)

use anyhow::{anyhow, Context};
use axum::http::HeaderValue;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 3001;

const DEFAULT_ORIGINS: [&str; 3] = [
    "http://localhost:5173", // Vite default
    "http://localhost:4173", // Vite preview
    "http://localhost:3000",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub data_dir: PathBuf,
    pub cors_origins: Vec<HeaderValue>,
}

impl ServerConfig {
    /// Build the configuration from the process environment
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Build the configuration from an explicit variable map
    pub fn from_vars(vars: HashMap<String, String>) -> anyhow::Result<Self> {
        let var = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let port = match var("ARBOR_PORT") {
            Some(port) => port
                .parse::<u16>()
                .with_context(|| format!("Invalid ARBOR_PORT: {port}"))?,
            None => DEFAULT_PORT,
        };

        let bind = match var("ARBOR_BIND") {
            Some(bind) => bind
                .parse::<IpAddr>()
                .with_context(|| format!("Invalid ARBOR_BIND: {bind}"))?,
            None => IpAddr::V4(Ipv4Addr::LOCALHOST),
        };

        let data_dir = match var("ARBOR_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .ok_or_else(|| anyhow!("Failed to get home directory"))?
                .join(".arbor")
                .join("nodes"),
        };

        let cors_origins = match var("CORS_ALLOW_ORIGIN") {
            Some(origins) => parse_origins(origins.split(','))?,
            None => parse_origins(DEFAULT_ORIGINS)?,
        };

        Ok(Self {
            bind,
            port,
            data_dir,
            cors_origins,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

fn parse_origins<'a>(origins: impl IntoIterator<Item = &'a str>) -> anyhow::Result<Vec<HeaderValue>> {
    origins
        .into_iter()
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS_ALLOW_ORIGIN - must be valid HTTP origin: {origin}"))
        })
        .collect()
}
