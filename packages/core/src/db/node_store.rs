//! NodeStore Trait - Persistence Abstraction Layer
//!
//! The tree service only needs three primitives from storage: read every
//! node, write one node, delete one node. None of them is transactional
//! across nodes; consistency after a partial failure is restored by the
//! healing pass on the next full read.
//!
//! # Implementations
//!
//! - [`FileStore`](super::FileStore): one markdown file per node on disk
//! - [`MemoryStore`]: in-process map, for tests and embedding
//!
//! # Examples
//!
//! ```rust
//! use arbor_core::db::{MemoryStore, NodeStore};
//! use arbor_core::models::{Node, NodeType};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), arbor_core::db::StoreError> {
//! let store = MemoryStore::new();
//! store.write_node(&Node::new(NodeType::Map, "Map".to_string())).await?;
//!
//! let nodes = store.read_all().await?;
//! assert_eq!(nodes.len(), 1);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::sync::RwLock;

use super::error::StoreError;
use crate::models::Node;
use crate::tree::{NodeCollection, NodeDelta};

/// Abstraction over node persistence
///
/// Implementations must be `Send + Sync` so a single store can be shared by
/// every request handler.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Read every persisted node
    ///
    /// Implementations repair malformed individual records here; structural
    /// repair across records is the caller's job.
    async fn read_all(&self) -> Result<NodeCollection, StoreError>;

    /// Create or replace one node
    async fn write_node(&self, node: &Node) -> Result<(), StoreError>;

    /// Delete one node; deleting a node that is not stored is not an error
    async fn delete_node(&self, node: &Node) -> Result<(), StoreError>;

    /// Persist a delta: removals first, then updates
    ///
    /// Stops at the first failure; records already written stay written.
    async fn write_delta(&self, delta: &NodeDelta) -> Result<(), StoreError> {
        for node in delta.removed.values() {
            self.delete_node(node).await?;
        }
        for node in delta.updated.values() {
            self.write_node(node).await?;
        }
        Ok(())
    }
}

/// Store keeping nodes in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    nodes: RwLock<NodeCollection>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `collection`
    pub fn with_collection(collection: NodeCollection) -> Self {
        Self {
            nodes: RwLock::new(collection),
        }
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn read_all(&self) -> Result<NodeCollection, StoreError> {
        Ok(self.nodes.read()?.clone())
    }

    async fn write_node(&self, node: &Node) -> Result<(), StoreError> {
        self.nodes.write()?.insert(node.clone());
        Ok(())
    }

    async fn delete_node(&self, node: &Node) -> Result<(), StoreError> {
        self.nodes.write()?.remove(&node.id);
        Ok(())
    }
}
