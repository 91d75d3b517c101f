//! Domain Events
//!
//! Every successful tree operation is published as one `DomainEvent` on the
//! tree service's broadcast channel. Subscribers (an in-process mirror, a
//! push channel to clients) apply `delta` to stay consistent without
//! re-reading the store.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::tree::NodeDelta;

/// Operation that produced a delta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TreeOperation {
    Create,
    Update,
    Reparent,
    Delete,
    /// Repairs made while loading the store
    Heal,
}

impl TreeOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            TreeOperation::Create => "node:created",
            TreeOperation::Update => "node:updated",
            TreeOperation::Reparent => "node:moved",
            TreeOperation::Delete => "node:deleted",
            TreeOperation::Heal => "tree:healed",
        }
    }
}

impl fmt::Display for TreeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted change to the tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    pub operation: TreeOperation,
    /// Node the operation targeted; `None` for healing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub delta: NodeDelta,
}

impl DomainEvent {
    pub fn new(operation: TreeOperation, node_id: impl Into<String>, delta: NodeDelta) -> Self {
        Self {
            operation,
            node_id: Some(node_id.into()),
            delta,
        }
    }

    pub fn healed(delta: NodeDelta) -> Self {
        Self {
            operation: TreeOperation::Heal,
            node_id: None,
            delta,
        }
    }

    /// Event name used in logs and push channels
    pub fn event_type(&self) -> &'static str {
        self.operation.as_str()
    }
}
