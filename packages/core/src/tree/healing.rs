//! Read-time healing
//!
//! Normalizes a collection loaded from storage so the mutation engine can rely
//! on its invariants. Persisted writes are not transactional, so a crash
//! between two file writes can leave references that disagree. This pass
//! repairs them; the mutation functions themselves never call it.
//!
//! Repairs, in order:
//!
//! 1. drop self, dangling and duplicate child ids
//! 2. re-link each child to one parent (the parent its `parent_id` names when
//!    that parent lists it, else the first listing parent of the same type)
//! 3. detach nodes whose parent is missing or belongs to another type
//! 4. break parent cycles at their lowest id
//! 5. attach every detached node to its type's root
//! 6. fold duplicate roots
//! 7. drop out-of-range overrides and recompute every calculated metric

use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::warn;

use super::collection::NodeCollection;
use super::inspector::{descendant_ids, root_nodes_by_type};
use super::mutations::merge_duplicate_roots;
use crate::metrics::{calculate_metrics, validate_metric_value};
use crate::models::{Node, NodeType};

/// Result of [`heal_collection`]
#[derive(Debug, Clone, PartialEq)]
pub struct HealReport {
    pub collection: NodeCollection,
    /// Ids of every node whose record changed and must be written back
    pub healed_ids: Vec<String>,
}

impl HealReport {
    pub fn is_clean(&self) -> bool {
        self.healed_ids.is_empty()
    }
}

/// Repair a collection read from storage
pub fn heal_collection(collection: &NodeCollection) -> HealReport {
    let mut nodes: BTreeMap<String, Node> = collection
        .iter()
        .map(|node| (node.id.clone(), node.clone()))
        .collect();
    let mut detached = BTreeSet::new();

    prune_children(&mut nodes);
    relink_children(&mut nodes, &mut detached);
    break_cycles(&mut nodes, &mut detached);

    let staged = NodeCollection::from_nodes(nodes.into_values());
    let staged = attach_detached(&staged, &detached);
    let staged = merge_duplicate_roots(&staged);
    let staged = recompute_metrics(&staged);

    let mut result = collection.clone();
    let mut healed_ids = Vec::new();
    for node in staged.iter() {
        if collection.get(&node.id) != Some(node) {
            healed_ids.push(node.id.clone());
            result.insert(node.clone());
        }
    }

    HealReport {
        collection: result,
        healed_ids,
    }
}

fn prune_children(nodes: &mut BTreeMap<String, Node>) {
    let ids: HashSet<String> = nodes.keys().cloned().collect();

    for node in nodes.values_mut() {
        let own_id = node.id.clone();
        let before = node.children_ids.len();
        let mut seen = HashSet::new();
        node.children_ids
            .retain(|child_id| *child_id != own_id && ids.contains(child_id) && seen.insert(child_id.clone()));

        let dropped = before - node.children_ids.len();
        if dropped > 0 {
            warn!(node_id = %own_id, dropped, "dropped invalid child references");
        }
    }
}

fn same_type_parent(nodes: &BTreeMap<String, Node>, parent_id: &str, node_type: NodeType) -> bool {
    nodes
        .get(parent_id)
        .is_some_and(|parent| parent.node_type == node_type)
}

fn relink_children(nodes: &mut BTreeMap<String, Node>, detached: &mut BTreeSet<String>) {
    let mut listers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for node in nodes.values() {
        for child_id in &node.children_ids {
            listers
                .entry(child_id.clone())
                .or_default()
                .push(node.id.clone());
        }
    }

    let ids: Vec<String> = nodes.keys().cloned().collect();
    for id in ids {
        let Some(node) = nodes.get(&id) else {
            continue;
        };
        let node_type = node.node_type;
        let parent_id = node.parent_id.clone();
        let listed_by = listers.remove(&id).unwrap_or_default();

        let winner = parent_id
            .as_ref()
            .filter(|pid| listed_by.contains(*pid) && same_type_parent(nodes, pid, node_type))
            .or_else(|| {
                listed_by
                    .iter()
                    .find(|pid| same_type_parent(nodes, pid, node_type))
            })
            .cloned();

        for lister in listed_by.iter().filter(|lister| Some(*lister) != winner.as_ref()) {
            if let Some(parent) = nodes.get_mut(lister) {
                parent.children_ids.retain(|child_id| *child_id != id);
                warn!(node_id = %id, parent_id = %lister, "removed conflicting child reference");
            }
        }

        match (winner, parent_id) {
            (Some(winner), parent_id) => {
                if parent_id.as_ref() != Some(&winner) {
                    warn!(node_id = %id, previous_parent = ?parent_id, parent_id = %winner, "re-linked to listing parent");
                    if let Some(node) = nodes.get_mut(&id) {
                        node.parent_id = Some(winner);
                    }
                }
            }
            (None, Some(pid)) if pid != id && same_type_parent(nodes, &pid, node_type) => {
                warn!(node_id = %id, parent_id = %pid, "restored missing child reference");
                if let Some(parent) = nodes.get_mut(&pid) {
                    parent.children_ids.push(id.clone());
                }
            }
            (None, Some(pid)) => {
                warn!(node_id = %id, parent_id = %pid, "detached node from invalid parent");
                if let Some(node) = nodes.get_mut(&id) {
                    node.parent_id = None;
                }
                detached.insert(id);
            }
            (None, None) => {}
        }
    }
}

fn detach(nodes: &mut BTreeMap<String, Node>, id: &str) {
    let parent_id = nodes.get_mut(id).and_then(|node| node.parent_id.take());
    if let Some(parent) = parent_id.and_then(|pid| nodes.get_mut(&pid)) {
        parent.children_ids.retain(|child_id| child_id != id);
    }
}

fn break_cycles(nodes: &mut BTreeMap<String, Node>, detached: &mut BTreeSet<String>) {
    let mut rooted: HashSet<String> = HashSet::new();
    let ids: Vec<String> = nodes.keys().cloned().collect();

    for id in ids {
        let mut path: Vec<String> = Vec::new();
        let mut on_path = HashSet::new();
        let mut current = Some(id);

        while let Some(cursor) = current {
            if rooted.contains(&cursor) {
                break;
            }
            if !on_path.insert(cursor.clone()) {
                let start = path.iter().position(|p| *p == cursor).unwrap_or(0);
                if let Some(breaker) = path[start..].iter().min().cloned() {
                    warn!(node_id = %breaker, cycle_len = path.len() - start, "broke parent cycle");
                    detach(nodes, &breaker);
                    detached.insert(breaker);
                }
                break;
            }
            current = nodes.get(&cursor).and_then(|node| node.parent_id.clone());
            path.push(cursor);
        }

        rooted.extend(path);
    }
}

fn attach_detached(collection: &NodeCollection, detached: &BTreeSet<String>) -> NodeCollection {
    let index = root_nodes_by_type(collection);
    let mut result = collection.clone();

    for node_type in NodeType::ALL {
        let candidates: Vec<&String> = index
            .roots
            .get(&node_type)
            .into_iter()
            .chain(index.duplicates.get(&node_type).into_iter().flatten())
            .collect();
        let Some(root_id) = candidates
            .iter()
            .find(|id| !detached.contains(id.as_str()))
            .or(candidates.first())
            .map(|id| (*id).clone())
        else {
            continue;
        };
        let Some(root) = result.get(&root_id) else {
            continue;
        };
        let mut root = root.clone();

        for orphan_id in detached.iter().filter(|id| **id != root_id) {
            let Some(orphan) = result.get(orphan_id) else {
                continue;
            };
            if orphan.node_type != node_type || !orphan.is_root() {
                continue;
            }
            let mut orphan = orphan.clone();
            orphan.parent_id = Some(root_id.clone());
            result.insert(orphan);
            root.children_ids.push(orphan_id.clone());
            warn!(node_id = %orphan_id, %root_id, "attached orphan to type root");
        }

        result.insert(root);
    }

    result
}

fn recompute_metrics(collection: &NodeCollection) -> NodeCollection {
    let mut order: Vec<String> = Vec::with_capacity(collection.len());
    for root in collection.iter().filter(|node| node.is_root()) {
        order.push(root.id.clone());
        order.extend(descendant_ids(collection, &root.id));
    }

    let mut result = collection.clone();
    for id in order.iter().rev() {
        let Some(node) = result.get(id) else {
            continue;
        };

        let mut set_metrics = node.set_metrics.clone();
        set_metrics.retain(|metric, value| match validate_metric_value(*metric, *value) {
            Ok(()) => true,
            Err(err) => {
                warn!(node_id = %id, error = %err, "dropped invalid metric override");
                false
            }
        });

        let calculated = calculate_metrics(
            &set_metrics,
            node.children_ids
                .iter()
                .filter_map(|child_id| result.get(child_id))
                .map(|child| &child.calculated_metrics),
        );

        if calculated != node.calculated_metrics || set_metrics != node.set_metrics {
            let mut updated = node.clone();
            updated.set_metrics = set_metrics;
            updated.calculated_metrics = calculated;
            result.insert(updated);
        }
    }

    result
}
