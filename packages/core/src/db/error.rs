//! Store Error Types
//!
//! Failures of the persistence layer. Malformed records are not errors: the
//! file store heals them on read and only logs what it repaired.

use std::path::PathBuf;
use thiserror::Error;

/// Persistence operation errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem operation failed
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Front matter could not be serialized
    #[error("Failed to serialize node '{node_id}': {source}")]
    Yaml {
        node_id: String,
        source: serde_yaml::Error,
    },

    /// Path is not usable as a store location
    #[error("Invalid store path: {path}")]
    InvalidPath { path: PathBuf },

    /// A thread panicked while holding the store's index lock
    #[error("Store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// Create an I/O error for `path`
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a YAML serialization error
    pub fn yaml(node_id: impl Into<String>, source: serde_yaml::Error) -> Self {
        Self::Yaml {
            node_id: node_id.into(),
            source,
        }
    }

    /// Create an invalid path error
    pub fn invalid_path(path: impl Into<PathBuf>) -> Self {
        Self::InvalidPath { path: path.into() }
    }
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::LockPoisoned
    }
}
