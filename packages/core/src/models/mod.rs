//! Data Models
//!
//! This module contains the core data structures used throughout Arbor:
//!
//! - `Node` - a single entry in one of the type-scoped trees
//! - `NewNode` / `NodeUpdate` - creation properties and partial patches
//! - `Metric` - metric names plus the override/calculated metric maps
//! - `MetadataValue` - typed scalar values for the open metadata bag

mod metadata;
mod metric;
mod node;

pub use metadata::{Metadata, MetadataValue};
pub use metric::{default_metrics, Metric, MetricMap, MetricsPatch};
pub use node::{NewNode, Node, NodeType, NodeUpdate, ValidationError};
