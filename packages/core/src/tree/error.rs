//! Error types for the tree mutation engine
//!
//! The engine fails on the first violated rule and never applies an operation
//! partially, so every error describes a request that was rejected outright.

use std::fmt;
use thiserror::Error;

use crate::models::{Metric, NodeType, ValidationError};

/// Why a reparent request was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveViolation {
    /// The requested parent is the node itself
    OwnParent,
    /// The requested parent is inside the node's own subtree
    OwnDescendant,
    /// Roots anchor their type's tree and cannot be moved
    RootNode,
    /// The requested parent belongs to another type's tree
    CrossType,
}

impl fmt::Display for MoveViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            MoveViolation::OwnParent => "a node cannot be its own parent",
            MoveViolation::OwnDescendant => "cannot move a node into its own descendant",
            MoveViolation::RootNode => "root nodes cannot be moved",
            MoveViolation::CrossType => "cannot move a node into another type's tree",
        };
        f.write_str(text)
    }
}

/// Errors raised by the mutation engine and inspector
///
/// # Examples
///
/// ```rust
/// use arbor_core::tree::{MoveViolation, TreeError};
///
/// let err = TreeError::invalid_move("a", "b", MoveViolation::OwnDescendant);
/// assert_eq!(
///     err.to_string(),
///     "Cannot move node 'a' under 'b': cannot move a node into its own descendant"
/// );
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    /// Referenced node (target, parent or new parent) does not exist
    #[error("Node '{node_id}' does not exist")]
    NodeNotFound { node_id: String },

    /// Reparent would break the tree structure (cycle, root move, cross-type move)
    #[error("Cannot move node '{node_id}' under '{new_parent_id}': {reason}")]
    InvalidStructuralMove {
        node_id: String,
        new_parent_id: String,
        reason: MoveViolation,
    },

    /// A new node's explicit type differs from its parent's type
    #[error("Cannot add a '{child_type}' node under '{parent_type}' node '{parent_id}'")]
    TypeMismatch {
        parent_id: String,
        parent_type: NodeType,
        child_type: NodeType,
    },

    /// A new node reuses an id already present in the collection
    #[error("Node '{node_id}' already exists")]
    DuplicateId { node_id: String },

    /// An explicit metric override is outside the metric's domain
    #[error("Invalid value {value} for metric '{metric}': {reason}")]
    InvalidMetricValue {
        metric: Metric,
        value: f64,
        reason: String,
    },

    /// Node failed structural validation
    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationError),
}

impl TreeError {
    /// Create a NodeNotFound error
    pub fn node_not_found(node_id: impl Into<String>) -> Self {
        Self::NodeNotFound {
            node_id: node_id.into(),
        }
    }

    /// Create an InvalidStructuralMove error
    pub fn invalid_move(
        node_id: impl Into<String>,
        new_parent_id: impl Into<String>,
        reason: MoveViolation,
    ) -> Self {
        Self::InvalidStructuralMove {
            node_id: node_id.into(),
            new_parent_id: new_parent_id.into(),
            reason,
        }
    }

    /// Create a TypeMismatch error
    pub fn type_mismatch(
        parent_id: impl Into<String>,
        parent_type: NodeType,
        child_type: NodeType,
    ) -> Self {
        Self::TypeMismatch {
            parent_id: parent_id.into(),
            parent_type,
            child_type,
        }
    }

    /// Create a DuplicateId error
    pub fn duplicate_id(node_id: impl Into<String>) -> Self {
        Self::DuplicateId {
            node_id: node_id.into(),
        }
    }

    /// Create an InvalidMetricValue error
    pub fn invalid_metric_value(metric: Metric, value: f64, reason: impl Into<String>) -> Self {
        Self::InvalidMetricValue {
            metric,
            value,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_not_found_error() {
        let err = TreeError::node_not_found("missing-node");
        assert!(matches!(err, TreeError::NodeNotFound { .. }));
        assert_eq!(format!("{}", err), "Node 'missing-node' does not exist");
    }

    #[test]
    fn test_move_messages_distinguish_reasons() {
        let own_parent = TreeError::invalid_move("a", "a", MoveViolation::OwnParent);
        let descendant = TreeError::invalid_move("a", "b", MoveViolation::OwnDescendant);

        assert_eq!(
            own_parent.to_string(),
            "Cannot move node 'a' under 'a': a node cannot be its own parent"
        );
        assert!(descendant.to_string().contains("own descendant"));
        assert_ne!(own_parent.to_string(), descendant.to_string());
    }

    #[test]
    fn test_type_mismatch_error() {
        let err = TreeError::type_mismatch("root", NodeType::Map, NodeType::User);
        assert_eq!(
            err.to_string(),
            "Cannot add a 'user' node under 'map' node 'root'"
        );
    }

    #[test]
    fn test_invalid_metric_value_error() {
        let err = TreeError::invalid_metric_value(Metric::ReadinessLevel, 11.0, "too high");
        assert_eq!(
            err.to_string(),
            "Invalid value 11 for metric 'readinessLevel': too high"
        );
    }

    #[test]
    fn test_validation_error_converts() {
        let err: TreeError = ValidationError::MissingField("id".to_string()).into();
        assert_eq!(err.to_string(), "Validation error: Missing required field: id");
    }
}
