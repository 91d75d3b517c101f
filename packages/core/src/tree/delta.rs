//! Delta between two collections
//!
//! A delta carries only the nodes whose stored value changed. The service
//! writes exactly these records to the store, and clients merge the same delta
//! into their local copy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::collection::NodeCollection;
use crate::models::Node;

/// Nodes changed (`updated`) or deleted (`removed`) by one operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDelta {
    #[serde(default)]
    pub updated: BTreeMap<String, Node>,
    #[serde(default)]
    pub removed: BTreeMap<String, Node>,
}

impl NodeDelta {
    /// Compare two collections
    ///
    /// Nodes still shared by pointer are skipped without a value comparison;
    /// nodes rebuilt to an equal value are skipped as well.
    pub fn between(before: &NodeCollection, after: &NodeCollection) -> Self {
        let mut delta = NodeDelta::default();

        for (id, node) in after.entries() {
            if after.shares_node(before, id) {
                continue;
            }
            match before.get(id) {
                Some(previous) if previous == node.as_ref() => {}
                _ => {
                    delta.updated.insert(id.clone(), node.as_ref().clone());
                }
            }
        }

        for (id, node) in before.entries() {
            if !after.contains(id) {
                delta.removed.insert(id.clone(), node.as_ref().clone());
            }
        }

        delta
    }

    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.removed.is_empty()
    }

    /// Number of changed records
    pub fn len(&self) -> usize {
        self.updated.len() + self.removed.len()
    }

    /// Merge another delta that happened after this one
    pub fn extend(&mut self, later: NodeDelta) {
        for (id, node) in later.updated {
            self.removed.remove(&id);
            self.updated.insert(id, node);
        }
        for (id, node) in later.removed {
            self.updated.remove(&id);
            self.removed.insert(id, node);
        }
    }
}

impl NodeCollection {
    /// Apply a delta produced by [`NodeDelta::between`]
    pub fn apply_delta(&self, delta: &NodeDelta) -> NodeCollection {
        let mut result = self.clone();
        for id in delta.removed.keys() {
            result.remove(id);
        }
        for node in delta.updated.values() {
            result.insert(node.clone());
        }
        result
    }
}
