//! Arbor Core
//!
//! Tree mutation and derived-metrics engine for a multi-type node forest,
//! plus the persistence contract and service layer built around it.
//!
//! # Architecture
//!
//! - **Adjacency list**: nodes reference their parent and ordered children by id
//! - **One tree per type**: `map`, `waypoint` and `user` nodes each hang off their own root
//! - **Pure engine**: every mutation takes a `NodeCollection` and returns a new one
//! - **Derived metrics**: `calculatedMetrics` is recomputed upward from each change,
//!   stopping as soon as a node's value is unchanged
//! - **Heal on read**: stored state is repaired after loading, never inside the engine
//!
//! # Modules
//!
//! - [`models`] - Node, NodeType, Metric, metadata values, create/patch properties
//! - [`metrics`] - override / min-of-children / default calculation and patch merging
//! - [`tree`] - collection, mutation engine, inspector, healing, deltas
//! - [`db`] - `NodeStore` trait with file and in-memory implementations
//! - [`services`] - `TreeService` orchestrating store, engine and events

pub mod db;
pub mod metrics;
pub mod models;
pub mod services;
pub mod tree;

// Re-export commonly used types
pub use models::*;
pub use services::{ServiceError, TreeService};
pub use tree::{NodeCollection, NodeDelta, TreeError};
