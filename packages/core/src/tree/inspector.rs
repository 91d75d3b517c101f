//! Tree Inspector
//!
//! Read-only queries over a `NodeCollection`. Nothing here mutates or
//! allocates new nodes; derived maps are views for O(1) lookups and are never
//! the authoritative state (that is always `parent_id` / `children_ids`).
//!
//! Traversals are iterative and carry a visited set, so malformed input
//! (broken chains, cycles) degrades to `false`/partial answers instead of
//! looping or panicking.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use thiserror::Error;

use super::collection::NodeCollection;
use crate::metrics::calculate_metrics;
use crate::models::{Node, NodeType, ValidationError};

/// Whether `ancestor_id` lies on the parent chain of `descendant_id`
///
/// Strict: a node is not its own ancestor. Returns `false` when the chain is
/// broken (a missing parent) or loops back on itself.
pub fn is_ancestor_of(collection: &NodeCollection, ancestor_id: &str, descendant_id: &str) -> bool {
    let mut visited = HashSet::new();
    let mut current = collection
        .get(descendant_id)
        .and_then(|node| node.parent_id.as_deref());

    while let Some(id) = current {
        if id == ancestor_id {
            return true;
        }
        if !visited.insert(id) {
            return false;
        }
        current = collection.get(id).and_then(|node| node.parent_id.as_deref());
    }

    false
}

/// child id → parent id, derived from `children_ids`
pub fn parent_map(collection: &NodeCollection) -> HashMap<&str, &str> {
    collection
        .iter()
        .flat_map(|parent| {
            parent
                .children_ids
                .iter()
                .map(move |child_id| (child_id.as_str(), parent.id.as_str()))
        })
        .collect()
}

/// child id → position within its parent's `children_ids`
pub fn index_in_parent_map(collection: &NodeCollection) -> HashMap<&str, usize> {
    collection
        .iter()
        .flat_map(|parent| {
            parent
                .children_ids
                .iter()
                .enumerate()
                .map(|(index, child_id)| (child_id.as_str(), index))
        })
        .collect()
}

/// Every descendant of `node_id` (excluding the node itself), breadth-first
///
/// Children that do not exist in the collection are skipped.
pub fn descendant_ids(collection: &NodeCollection, node_id: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut visited: HashSet<&str> = HashSet::from([node_id]);
    let mut queue: VecDeque<&str> = VecDeque::from([node_id]);

    while let Some(id) = queue.pop_front() {
        let Some(node) = collection.get(id) else {
            continue;
        };
        for child_id in &node.children_ids {
            if collection.contains(child_id) && visited.insert(child_id.as_str()) {
                result.push(child_id.clone());
                queue.push_back(child_id.as_str());
            }
        }
    }

    result
}

/// Roots discovered per node type
///
/// `roots` holds the established root of each type; `duplicates` lists any
/// further parentless nodes of the same type, in the order they are folded
/// under the established root by `merge_duplicate_roots`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootIndex {
    pub roots: BTreeMap<NodeType, String>,
    pub duplicates: BTreeMap<NodeType, Vec<String>>,
}

impl RootIndex {
    pub fn root(&self, node_type: NodeType) -> Option<&str> {
        self.roots.get(&node_type).map(String::as_str)
    }

    pub fn has_duplicates(&self) -> bool {
        self.duplicates.values().any(|ids| !ids.is_empty())
    }
}

/// Find the root of each node type
///
/// When construction left several parentless nodes of one type, the
/// established root is the one with the largest subtree; ties go to the lowest
/// id. The others are reported as duplicates rather than dropped.
///
/// Nodes carry no creation time, so "earliest root" cannot be read from the
/// records. The largest subtree stands in for it: the root that has been in
/// use longest is the one holding the tree, while a duplicate created by a
/// racing bootstrap is usually empty. The id tie-break keeps the choice
/// deterministic across reads.
pub fn root_nodes_by_type(collection: &NodeCollection) -> RootIndex {
    let mut candidates: BTreeMap<NodeType, Vec<(usize, &str)>> = BTreeMap::new();
    for node in collection.iter().filter(|node| node.is_root()) {
        let size = descendant_ids(collection, &node.id).len();
        candidates
            .entry(node.node_type)
            .or_default()
            .push((size, node.id.as_str()));
    }

    let mut index = RootIndex::default();
    for (node_type, mut roots) in candidates {
        roots.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        let mut ids = roots.into_iter().map(|(_, id)| id.to_string());
        if let Some(established) = ids.next() {
            index.roots.insert(node_type, established);
        }
        let rest: Vec<String> = ids.collect();
        if !rest.is_empty() {
            index.duplicates.insert(node_type, rest);
        }
    }
    index
}

/// Node with its children embedded, for rendering and debugging
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterializedNode {
    #[serde(flatten)]
    pub node: Node,
    pub children: Vec<MaterializedNode>,
}

impl MaterializedNode {
    /// Total number of nodes in this subtree, including itself
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(MaterializedNode::size).sum::<usize>()
    }
}

/// Nested copy of the subtree rooted at `root_id`
///
/// Returns `None` if the root does not exist. Dangling child ids are skipped.
pub fn materialize_subtree(collection: &NodeCollection, root_id: &str) -> Option<MaterializedNode> {
    let mut visited = HashSet::new();
    materialize(collection, root_id, &mut visited)
}

fn materialize<'a>(
    collection: &'a NodeCollection,
    id: &'a str,
    visited: &mut HashSet<&'a str>,
) -> Option<MaterializedNode> {
    if !visited.insert(id) {
        return None;
    }
    let node = collection.get(id)?;
    let children = node
        .children_ids
        .iter()
        .filter_map(|child_id| materialize(collection, child_id, visited))
        .collect();

    Some(MaterializedNode {
        node: node.clone(),
        children,
    })
}

/// A broken structural rule found by [`check_invariants`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvariantViolation {
    #[error("Node '{node_id}' is invalid: {error}")]
    InvalidNode {
        node_id: String,
        error: ValidationError,
    },

    #[error("Node '{node_id}' references missing parent '{parent_id}'")]
    MissingParent { node_id: String, parent_id: String },

    #[error("Node '{node_id}' is listed {count} time(s) by its parent '{parent_id}'")]
    NotListedOnce {
        node_id: String,
        parent_id: String,
        count: usize,
    },

    #[error("Node '{node_id}' lists missing child '{child_id}'")]
    DanglingChild { node_id: String, child_id: String },

    #[error("Node '{node_id}' lists child '{child_id}' whose parent is different")]
    ChildParentMismatch { node_id: String, child_id: String },

    #[error("Node '{node_id}' has parent '{parent_id}' of another type")]
    CrossTypeParent { node_id: String, parent_id: String },

    #[error("Node '{node_id}' is its own ancestor")]
    Cycle { node_id: String },

    #[error("Node '{node_id}' has stale calculated metrics")]
    StaleMetrics { node_id: String },

    #[error("Type '{node_type}' has {} roots", root_ids.len())]
    MultipleRoots {
        node_type: NodeType,
        root_ids: Vec<String>,
    },
}

/// Check every structural invariant of a collection
///
/// Returns all violations found (empty for a well-formed collection).
pub fn check_invariants(collection: &NodeCollection) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    for node in collection.iter() {
        if let Err(error) = node.validate() {
            violations.push(InvariantViolation::InvalidNode {
                node_id: node.id.clone(),
                error,
            });
        }

        if let Some(parent_id) = &node.parent_id {
            match collection.get(parent_id) {
                None => violations.push(InvariantViolation::MissingParent {
                    node_id: node.id.clone(),
                    parent_id: parent_id.clone(),
                }),
                Some(parent) => {
                    let count = parent
                        .children_ids
                        .iter()
                        .filter(|child_id| **child_id == node.id)
                        .count();
                    if count != 1 {
                        violations.push(InvariantViolation::NotListedOnce {
                            node_id: node.id.clone(),
                            parent_id: parent_id.clone(),
                            count,
                        });
                    }
                    if parent.node_type != node.node_type {
                        violations.push(InvariantViolation::CrossTypeParent {
                            node_id: node.id.clone(),
                            parent_id: parent_id.clone(),
                        });
                    }
                }
            }

            if is_ancestor_of(collection, &node.id, &node.id) {
                violations.push(InvariantViolation::Cycle {
                    node_id: node.id.clone(),
                });
            }
        }

        for child_id in &node.children_ids {
            match collection.get(child_id) {
                None => violations.push(InvariantViolation::DanglingChild {
                    node_id: node.id.clone(),
                    child_id: child_id.clone(),
                }),
                Some(child) if child.parent_id.as_deref() != Some(node.id.as_str()) => {
                    violations.push(InvariantViolation::ChildParentMismatch {
                        node_id: node.id.clone(),
                        child_id: child_id.clone(),
                    })
                }
                Some(_) => {}
            }
        }

        let expected = calculate_metrics(
            &node.set_metrics,
            node.children_ids
                .iter()
                .filter_map(|child_id| collection.get(child_id))
                .map(|child| &child.calculated_metrics),
        );
        if expected != node.calculated_metrics {
            violations.push(InvariantViolation::StaleMetrics {
                node_id: node.id.clone(),
            });
        }
    }

    let roots = root_nodes_by_type(collection);
    for (node_type, duplicates) in roots.duplicates {
        let mut root_ids: Vec<String> = roots.roots.get(&node_type).cloned().into_iter().collect();
        root_ids.extend(duplicates);
        violations.push(InvariantViolation::MultipleRoots {
            node_type,
            root_ids,
        });
    }

    violations
}

impl NodeCollection {
    /// See [`check_invariants`]
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        check_invariants(self)
    }

    /// See [`is_ancestor_of`]
    pub fn is_ancestor_of(&self, ancestor_id: &str, descendant_id: &str) -> bool {
        is_ancestor_of(self, ancestor_id, descendant_id)
    }
}
