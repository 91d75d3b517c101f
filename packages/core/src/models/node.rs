//! Node Data Structures
//!
//! This module defines the `Node` struct and the property types used to create
//! and patch nodes.
//!
//! # Architecture
//!
//! - **Adjacency list**: every node stores its `parent_id` and an ordered `children_ids`
//! - **Type-scoped forest**: each `NodeType` owns exactly one tree with its own root
//! - **Derived metrics**: `calculated_metrics` is owned by the metrics calculator and
//!   never edited by hand; users only touch `set_metrics`
//!
//! # Examples
//!
//! ```rust
//! use arbor_core::models::{Metric, NewNode, Node, NodeType};
//!
//! // Bootstrap root for the problem map
//! let root = Node::new(NodeType::Map, "Map".to_string());
//! assert!(root.is_root());
//!
//! // Properties for a child created through the mutation engine
//! let child = NewNode::new("Carbon capture".to_string())
//!     .with_set_metric(Metric::ReadinessLevel, 5.0);
//! assert_eq!(child.set_metrics[&Metric::ReadinessLevel], 5.0);
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use super::metadata::{Metadata, MetadataValue};
use super::metric::{default_metrics, Metric, MetricMap, MetricsPatch};

/// Validation errors for Node structure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid node type: {0}")]
    InvalidNodeType(String),

    #[error("Invalid parent reference: {0}")]
    InvalidParent(String),

    #[error("Invalid children: {0}")]
    InvalidChildren(String),
}

/// Kind of node; each kind has its own independent tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Problem/solution map
    Map,
    /// Roadmap waypoints
    Waypoint,
    /// Contributors
    User,
}

impl NodeType {
    /// Every node type, in the order their roots are bootstrapped
    pub const ALL: [NodeType; 3] = [NodeType::Map, NodeType::Waypoint, NodeType::User];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Map => "map",
            NodeType::Waypoint => "waypoint",
            NodeType::User => "user",
        }
    }

    /// Title given to the root node created at initialization
    pub fn default_root_title(self) -> &'static str {
        match self {
            NodeType::Map => "Map",
            NodeType::Waypoint => "Waypoints",
            NodeType::User => "Contributors",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeType::ALL
            .into_iter()
            .find(|node_type| node_type.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidNodeType(s.to_string()))
    }
}

/// A single node in one of the type-scoped trees.
///
/// # Fields
///
/// - `id`: Opaque unique identifier, stable for the node's lifetime
/// - `node_type`: Which tree the node belongs to (serialized as `type`)
/// - `title`: Display string (may be empty)
/// - `description`: Optional long-form text
/// - `parent_id`: Parent node, `None` for the root of a type
/// - `children_ids`: Ordered child ids (order is display order)
/// - `set_metrics`: Explicit metric overrides; empty means fully automatic
/// - `calculated_metrics`: Effective value of every metric
/// - `metadata`: Open bag of typed scalar extension fields
/// - `draft`: Whether the node is still a draft
///
/// Nodes handed out by a `NodeCollection` are shared; the mutation engine
/// always builds a new value instead of editing one in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,

    #[serde(rename = "type")]
    pub node_type: NodeType,

    #[serde(default)]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub parent_id: Option<String>,

    #[serde(default)]
    pub children_ids: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub set_metrics: MetricMap,

    #[serde(default = "default_metrics")]
    pub calculated_metrics: MetricMap,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,

    #[serde(default, skip_serializing_if = "is_false")]
    pub draft: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Node {
    /// Create a parentless node with an auto-generated UUID
    ///
    /// Calculated metrics start at their defaults; the mutation engine
    /// recomputes them whenever the node enters a collection.
    pub fn new(node_type: NodeType, title: String) -> Self {
        Self::new_with_id(Uuid::new_v4().to_string(), node_type, title)
    }

    /// Create a parentless node with an explicit id
    pub fn new_with_id(id: String, node_type: NodeType, title: String) -> Self {
        Self {
            id,
            node_type,
            title,
            description: None,
            parent_id: None,
            children_ids: Vec::new(),
            set_metrics: MetricMap::new(),
            calculated_metrics: default_metrics(),
            metadata: Metadata::new(),
            draft: false,
        }
    }

    /// A node without a parent is the root of its type
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Effective value of `metric`
    pub fn metric(&self, metric: Metric) -> f64 {
        self.calculated_metrics
            .get(&metric)
            .copied()
            .unwrap_or_else(|| metric.default_value())
    }

    /// Explicit override for `metric`, if any
    pub fn set_metric(&self, metric: Metric) -> Option<f64> {
        self.set_metrics.get(&metric).copied()
    }

    /// Validate the node's own structure
    ///
    /// Only checks what can be decided from the node alone; references to
    /// other nodes are checked by `NodeCollection::check_invariants`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if:
    /// - `id` is empty
    /// - the node is its own parent
    /// - the node lists itself, or one id twice, in `children_ids`
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::MissingField("id".to_string()));
        }

        if self.parent_id.as_deref() == Some(self.id.as_str()) {
            return Err(ValidationError::InvalidParent(
                "Node cannot be its own parent".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for child_id in &self.children_ids {
            if child_id == &self.id {
                return Err(ValidationError::InvalidChildren(
                    "Node cannot be its own child".to_string(),
                ));
            }
            if !seen.insert(child_id) {
                return Err(ValidationError::InvalidChildren(format!(
                    "Duplicate child id: {}",
                    child_id
                )));
            }
        }

        Ok(())
    }
}

/// Properties for a node created through the mutation engine
///
/// Structural fields (`parent_id`, `children_ids`) and `calculated_metrics`
/// are deliberately absent: the engine owns them.
///
/// # ID Generation
///
/// `id: None` generates a UUID v4. Clients that track optimistic local state
/// may supply their own id; the engine rejects ids that already exist.
///
/// # Type Inheritance
///
/// `node_type: None` inherits the parent's type. An explicit type that differs
/// from the parent's is rejected, since every type has its own tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,

    #[serde(default)]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub set_metrics: MetricMap,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,

    #[serde(default)]
    pub draft: bool,
}

impl NewNode {
    pub fn new(title: String) -> Self {
        Self {
            title,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_type(mut self, node_type: NodeType) -> Self {
        self.node_type = Some(node_type);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_set_metric(mut self, metric: Metric, value: f64) -> Self {
        self.set_metrics.insert(metric, value);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Custom deserializer for optional fields that accepts both plain values and nested Options
///
/// Maps three input formats to the double-Option pattern:
/// - Missing field → None (don't update)
/// - null → Some(None) (clear)
/// - "value" → Some(Some("value")) (set to value)
fn deserialize_optional_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    // Missing field is handled by #[serde(default)] on the struct field
    Ok(Some(Option::<T>::deserialize(deserializer)?))
}

/// Partial node update structure for PATCH operations
///
/// All fields are optional; only provided fields change. Structural moves go
/// through `reparent_node`, never through a patch.
///
/// # Nullable Fields
///
/// - `description` uses the double-`Option` pattern: `None` keeps the current
///   text, `Some(None)` clears it, `Some(Some(text))` replaces it.
/// - `metadata` is merged per key; a `None` value removes that key.
/// - `set_metrics` is merged per metric; a `None` value erases the override
///   and returns that metric to automatic calculation.
///
/// # Examples
///
/// ```rust
/// # use arbor_core::models::{Metric, NodeUpdate};
/// // Rename a node and pin its readiness level
/// let update = NodeUpdate::new()
///     .with_title("Direct air capture")
///     .with_set_metric(Metric::ReadinessLevel, Some(4.0));
///
/// // Return readiness to automatic calculation
/// let clear = NodeUpdate::new().with_set_metric(Metric::ReadinessLevel, None);
/// assert!(!clear.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub description: Option<Option<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, Option<MetadataValue>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_metrics: Option<MetricsPatch>,
}

impl NodeUpdate {
    /// Create a new empty NodeUpdate
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    pub fn with_draft(mut self, draft: bool) -> Self {
        self.draft = Some(draft);
        self
    }

    /// Patch one metric override (`None` erases it)
    pub fn with_set_metric(mut self, metric: Metric, value: Option<f64>) -> Self {
        self.set_metrics
            .get_or_insert_with(MetricsPatch::new)
            .insert(metric, value);
        self
    }

    /// Patch one metadata key (`None` removes it)
    pub fn with_metadata(mut self, key: impl Into<String>, value: Option<MetadataValue>) -> Self {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value);
        self
    }

    /// Check if update contains any changes
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.metadata.is_none()
            && self.draft.is_none()
            && self.set_metrics.is_none()
    }
}
