//! Service Layer Error Types
//!
//! The tree service fails either because the engine rejected the request or
//! because storage failed. Both are wrapped unchanged so the API layer can map
//! each kind to a response.

use thiserror::Error;

use crate::db::StoreError;
use crate::tree::TreeError;

/// Tree service errors
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The engine rejected the operation; nothing was written
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Reading or writing the store failed
    #[error("Storage operation failed: {0}")]
    Store(#[from] StoreError),
}

impl ServiceError {
    /// Create a node not found error
    pub fn node_not_found(node_id: impl Into<String>) -> Self {
        Self::Tree(TreeError::node_not_found(node_id))
    }

    /// Whether the error is a missing node
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Tree(TreeError::NodeNotFound { .. }))
    }
}
