//! Node collection
//!
//! The unit of persistence and the value every mutation transforms. Nodes are
//! held behind `Arc`, so cloning a collection copies pointers only and a
//! mutation's output shares every node it did not touch with its input.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::models::{Node, NodeType};

/// Mapping from node id to node
///
/// Serialized as a plain JSON object `{ id: Node }`. Iteration is ordered by
/// id, which keeps every derived view (root selection, healing, file writes)
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeCollection {
    nodes: BTreeMap<String, Arc<Node>>,
}

impl NodeCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from raw nodes
    ///
    /// No structural checks or metric calculation happen here; loaders run
    /// `heal_collection` on the result before handing it to the engine.
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        Self {
            nodes: nodes
                .into_iter()
                .map(|node| (node.id.clone(), Arc::new(node)))
                .collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id).map(Arc::as_ref)
    }

    /// Shared handle to a node, used to detect untouched nodes by pointer
    pub fn get_arc(&self, id: &str) -> Option<Arc<Node>> {
        self.nodes.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate nodes in id order
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().map(Arc::as_ref)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn nodes_of_type(&self, node_type: NodeType) -> impl Iterator<Item = &Node> {
        self.iter().filter(move |node| node.node_type == node_type)
    }

    /// Clone every node out of the collection
    pub fn to_nodes(&self) -> Vec<Node> {
        self.iter().cloned().collect()
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&String, &Arc<Node>)> {
        self.nodes.iter()
    }

    /// Insert or replace a node
    pub(crate) fn insert(&mut self, node: Node) {
        self.nodes.insert(node.id.clone(), Arc::new(node));
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<Arc<Node>> {
        self.nodes.remove(id)
    }

    /// Whether both collections hold the very same allocation for `id`
    pub(crate) fn shares_node(&self, other: &NodeCollection, id: &str) -> bool {
        match (self.nodes.get(id), other.nodes.get(id)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl FromIterator<Node> for NodeCollection {
    fn from_iter<T: IntoIterator<Item = Node>>(iter: T) -> Self {
        Self::from_nodes(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collection_serializes_as_id_map() {
        let node = Node::new_with_id("root".to_string(), NodeType::Map, "Map".to_string());
        let collection = NodeCollection::from_nodes([node]);

        let value = serde_json::to_value(&collection).unwrap();

        assert_eq!(value["root"]["title"], json!("Map"));
        assert_eq!(value.as_object().unwrap().len(), 1);
    }

    #[test]
    fn test_clone_shares_nodes() {
        let node = Node::new_with_id("root".to_string(), NodeType::Map, "Map".to_string());
        let collection = NodeCollection::from_nodes([node]);
        let copy = collection.clone();

        assert!(collection.shares_node(&copy, "root"));
        assert_eq!(collection, copy);
    }

    #[test]
    fn test_nodes_of_type_filters() {
        let collection: NodeCollection = [
            Node::new_with_id("m".to_string(), NodeType::Map, "Map".to_string()),
            Node::new_with_id("u".to_string(), NodeType::User, "Users".to_string()),
        ]
        .into_iter()
        .collect();

        let users: Vec<&str> = collection
            .nodes_of_type(NodeType::User)
            .map(|node| node.id.as_str())
            .collect();

        assert_eq!(users, vec!["u"]);
    }
}
