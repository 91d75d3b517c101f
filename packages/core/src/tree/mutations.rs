//! Tree Mutation Engine
//!
//! Pure functions that take a collection and return a new one. The input is
//! never modified; nodes the operation does not touch are shared with the
//! output through their `Arc`.
//!
//! Every operation validates its request in full before building anything, so
//! an error always leaves the caller holding the unchanged input.
//!
//! # Metric propagation
//!
//! After a structural or metric change the engine recomputes
//! `calculated_metrics` starting at the change point and walks toward the
//! root. The walk stops at the first node whose recomputed metrics equal the
//! stored ones: nothing above it can be affected.

use tracing::debug;
use uuid::Uuid;

use super::collection::NodeCollection;
use super::error::{MoveViolation, TreeError};
use super::inspector::{descendant_ids, is_ancestor_of, root_nodes_by_type};
use crate::metrics::{calculate_metrics, merge_metrics, validate_metrics, validate_patch};
use crate::models::{MetricMap, NewNode, Node, NodeType, NodeUpdate};

/// Add a node under `parent_id`
///
/// `insert_at` uses splice semantics: `Some(0)` makes the node the first
/// child, `None` or an index past the end appends.
///
/// Returns the new collection together with the created node (its id may
/// have been generated).
///
/// # Errors
///
/// - `NodeNotFound` if the parent does not exist
/// - `DuplicateId` if `new_node.id` is already taken
/// - `TypeMismatch` if `new_node.node_type` differs from the parent's type
/// - `InvalidMetricValue` if an override is out of range
pub fn add_node(
    collection: &NodeCollection,
    new_node: NewNode,
    parent_id: &str,
    insert_at: Option<usize>,
) -> Result<(NodeCollection, Node), TreeError> {
    let parent = collection
        .get(parent_id)
        .ok_or_else(|| TreeError::node_not_found(parent_id))?;

    let node_type = new_node.node_type.unwrap_or(parent.node_type);
    if node_type != parent.node_type {
        return Err(TreeError::type_mismatch(
            parent_id,
            parent.node_type,
            node_type,
        ));
    }

    let id = new_node.id.unwrap_or_else(|| Uuid::new_v4().to_string());
    if collection.contains(&id) {
        return Err(TreeError::duplicate_id(id));
    }
    validate_metrics(&new_node.set_metrics)?;

    let mut node = Node::new_with_id(id, node_type, new_node.title);
    node.description = new_node.description;
    node.parent_id = Some(parent_id.to_string());
    node.calculated_metrics = calculate_metrics(&new_node.set_metrics, std::iter::empty::<&MetricMap>());
    node.set_metrics = new_node.set_metrics;
    node.metadata = new_node.metadata;
    node.draft = new_node.draft;
    node.validate()?;

    let mut parent = parent.clone();
    insert_child(&mut parent.children_ids, node.id.clone(), insert_at);

    let mut result = collection.clone();
    result.insert(node.clone());
    result.insert(parent);
    propagate_from(&mut result, parent_id);

    debug!(node_id = %node.id, parent_id, "added node");
    Ok((result, node))
}

/// Apply a property patch to a node
///
/// A patch that leaves the node unchanged returns a collection sharing every
/// node with the input, so the resulting delta is empty.
///
/// # Errors
///
/// - `NodeNotFound` if the node does not exist
/// - `InvalidMetricValue` if the metric patch sets an out-of-range value
pub fn update_node(
    collection: &NodeCollection,
    node_id: &str,
    patch: &NodeUpdate,
) -> Result<NodeCollection, TreeError> {
    let existing = collection
        .get(node_id)
        .ok_or_else(|| TreeError::node_not_found(node_id))?;

    if let Some(metrics_patch) = &patch.set_metrics {
        validate_patch(metrics_patch)?;
    }

    let mut updated = existing.clone();
    if let Some(title) = &patch.title {
        updated.title = title.clone();
    }
    if let Some(description) = &patch.description {
        updated.description = description.clone();
    }
    if let Some(metadata) = &patch.metadata {
        for (key, value) in metadata {
            match value {
                Some(value) => {
                    updated.metadata.insert(key.clone(), value.clone());
                }
                None => {
                    updated.metadata.remove(key);
                }
            }
        }
    }
    if let Some(draft) = patch.draft {
        updated.draft = draft;
    }
    if let Some(metrics_patch) = &patch.set_metrics {
        updated.set_metrics = merge_metrics(&updated.set_metrics, metrics_patch);
    }

    if &updated == existing {
        debug!(node_id, "patch is a no-op");
        return Ok(collection.clone());
    }

    let mut result = collection.clone();
    result.insert(updated);
    propagate_from(&mut result, node_id);
    Ok(result)
}

/// Move a node under `new_parent_id`
///
/// When the new parent is the current parent this is a reorder: the node is
/// taken out and spliced back in, and a target after its current position is
/// decremented by one to account for the removal.
///
/// # Errors
///
/// - `NodeNotFound` if either node does not exist
/// - `InvalidStructuralMove` if the move would make the node its own parent
///   or ancestor, moves a root, or crosses into another type's tree
pub fn reparent_node(
    collection: &NodeCollection,
    node_id: &str,
    new_parent_id: &str,
    insert_at: Option<usize>,
) -> Result<NodeCollection, TreeError> {
    let node = collection
        .get(node_id)
        .ok_or_else(|| TreeError::node_not_found(node_id))?;
    let new_parent = collection
        .get(new_parent_id)
        .ok_or_else(|| TreeError::node_not_found(new_parent_id))?;

    let violation = if node_id == new_parent_id {
        Some(MoveViolation::OwnParent)
    } else if is_ancestor_of(collection, node_id, new_parent_id) {
        Some(MoveViolation::OwnDescendant)
    } else if node.is_root() {
        Some(MoveViolation::RootNode)
    } else if node.node_type != new_parent.node_type {
        Some(MoveViolation::CrossType)
    } else {
        None
    };
    if let Some(reason) = violation {
        return Err(TreeError::invalid_move(node_id, new_parent_id, reason));
    }

    let old_parent_id = node.parent_id.clone();
    let mut result = collection.clone();

    if old_parent_id.as_deref() == Some(new_parent_id) {
        let mut parent = new_parent.clone();
        let current = parent.children_ids.iter().position(|id| id == node_id);
        parent.children_ids.retain(|id| id != node_id);
        let target = match (insert_at, current) {
            (Some(target), Some(current)) if target > current => Some(target - 1),
            (target, _) => target,
        };
        insert_child(&mut parent.children_ids, node_id.to_string(), target);

        if &parent == new_parent {
            return Ok(result);
        }
        debug!(node_id, parent_id = new_parent_id, ?target, "reordered child");
        result.insert(parent);
        return Ok(result);
    }

    if let Some(old_parent) = old_parent_id.as_deref().and_then(|id| collection.get(id)) {
        let mut old_parent = old_parent.clone();
        old_parent.children_ids.retain(|id| id != node_id);
        result.insert(old_parent);
    }

    let mut new_parent = new_parent.clone();
    new_parent.children_ids.retain(|id| id != node_id);
    insert_child(&mut new_parent.children_ids, node_id.to_string(), insert_at);
    result.insert(new_parent);

    let mut moved = node.clone();
    moved.parent_id = Some(new_parent_id.to_string());
    result.insert(moved);

    if let Some(old_parent_id) = &old_parent_id {
        propagate_from(&mut result, old_parent_id);
    }
    propagate_from(&mut result, new_parent_id);

    debug!(node_id, ?old_parent_id, new_parent_id, "moved node");
    Ok(result)
}

/// Remove a node and its entire subtree
///
/// # Errors
///
/// `NodeNotFound` if the node does not exist.
pub fn remove_node(collection: &NodeCollection, node_id: &str) -> Result<NodeCollection, TreeError> {
    let node = collection
        .get(node_id)
        .ok_or_else(|| TreeError::node_not_found(node_id))?;

    let mut result = collection.clone();
    let descendants = descendant_ids(collection, node_id);
    for id in &descendants {
        result.remove(id);
    }
    result.remove(node_id);

    if let Some(parent_id) = &node.parent_id {
        if let Some(parent) = collection.get(parent_id) {
            let mut parent = parent.clone();
            parent.children_ids.retain(|id| id != node_id);
            result.insert(parent);
            propagate_from(&mut result, parent_id);
        }
    }

    debug!(node_id, removed = descendants.len() + 1, "removed subtree");
    Ok(result)
}

/// Recompute metrics from `start_id` toward the root
///
/// Stops at the first node whose metrics are already current. The walk is
/// bounded by the collection size so a malformed parent cycle cannot loop.
pub fn propagate_from(collection: &mut NodeCollection, start_id: &str) {
    let mut current = Some(start_id.to_string());
    let mut remaining = collection.len();

    while let Some(id) = current {
        if remaining == 0 {
            break;
        }
        remaining -= 1;

        let Some(node) = collection.get(&id) else {
            break;
        };
        let recalculated = calculate_metrics(
            &node.set_metrics,
            node.children_ids
                .iter()
                .filter_map(|child_id| collection.get(child_id))
                .map(|child| &child.calculated_metrics),
        );
        if recalculated == node.calculated_metrics {
            debug!(node_id = %id, "metrics unchanged, stopping propagation");
            break;
        }

        let mut updated = node.clone();
        updated.calculated_metrics = recalculated;
        current = updated.parent_id.clone();
        collection.insert(updated);
    }
}

/// Create the bootstrap root of every listed type that has none
pub fn ensure_roots(collection: &NodeCollection, types: &[NodeType]) -> NodeCollection {
    let mut result = collection.clone();
    for node_type in types {
        if collection.nodes_of_type(*node_type).any(Node::is_root) {
            continue;
        }
        let root = Node::new(*node_type, node_type.default_root_title().to_string());
        debug!(node_id = %root.id, %node_type, "created root");
        result.insert(root);
    }
    result
}

/// Fold every duplicate root under its type's established root
///
/// Each duplicate keeps its subtree and becomes the last child of the
/// established root, in the order reported by `root_nodes_by_type`.
pub fn merge_duplicate_roots(collection: &NodeCollection) -> NodeCollection {
    let index = root_nodes_by_type(collection);
    let mut result = collection.clone();

    for (node_type, duplicates) in &index.duplicates {
        let Some(root_id) = index.roots.get(node_type) else {
            continue;
        };
        let Some(root) = result.get(root_id) else {
            continue;
        };
        let mut root = root.clone();

        for duplicate_id in duplicates {
            if let Some(duplicate) = result.get(duplicate_id) {
                let mut duplicate = duplicate.clone();
                duplicate.parent_id = Some(root_id.clone());
                result.insert(duplicate);
                insert_child(&mut root.children_ids, duplicate_id.clone(), None);
            }
        }

        debug!(%node_type, %root_id, folded = duplicates.len(), "merged duplicate roots");
        result.insert(root);
        propagate_from(&mut result, root_id);
    }

    result
}

/// Splice `id` into `children` (`None` or an index past the end appends)
pub(crate) fn insert_child(children: &mut Vec<String>, id: String, insert_at: Option<usize>) {
    match insert_at {
        Some(index) if index <= children.len() => children.insert(index, id),
        _ => children.push(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metric;

    const RL: Metric = Metric::ReadinessLevel;

    fn root_collection() -> NodeCollection {
        NodeCollection::from_nodes([Node::new_with_id(
            "r".to_string(),
            NodeType::Map,
            "Map".to_string(),
        )])
    }

    fn add(collection: &NodeCollection, id: &str, parent: &str, readiness: Option<f64>) -> NodeCollection {
        let mut props = NewNode::new(id.to_uppercase()).with_id(id);
        if let Some(value) = readiness {
            props = props.with_set_metric(RL, value);
        }
        add_node(collection, props, parent, None).unwrap().0
    }

    fn children(collection: &NodeCollection, id: &str) -> Vec<String> {
        collection.get(id).unwrap().children_ids.clone()
    }

    #[test]
    fn test_child_override_propagates_to_root() {
        let tree = add(&root_collection(), "a", "r", Some(5.0));

        assert_eq!(tree.get("r").unwrap().metric(RL), 5.0);
        assert_eq!(tree.get("a").unwrap().metric(RL), 5.0);
        assert!(tree.check_invariants().is_empty());
    }

    #[test]
    fn test_root_takes_minimum_of_children() {
        let tree = add(&root_collection(), "a", "r", Some(5.0));
        let tree = add(&tree, "b", "r", Some(2.0));

        assert_eq!(tree.get("r").unwrap().metric(RL), 2.0);
    }

    #[test]
    fn test_clearing_override_resets_to_default() {
        let tree = add(&root_collection(), "a", "r", Some(5.0));
        let tree = add(&tree, "b", "r", Some(2.0));

        let patch = NodeUpdate::new().with_set_metric(RL, None);
        let tree = update_node(&tree, "a", &patch).unwrap();

        let a = tree.get("a").unwrap();
        assert!(a.set_metrics.is_empty());
        assert_eq!(a.metric(RL), 0.0);
        assert_eq!(tree.get("r").unwrap().metric(RL), 0.0);
    }

    #[test]
    fn test_reorder_within_parent() {
        let mut tree = add(&root_collection(), "p", "r", None);
        for id in ["c1", "c2", "c3", "c4"] {
            tree = add(&tree, id, "p", None);
        }

        let tree = reparent_node(&tree, "c4", "p", Some(2)).unwrap();

        assert_eq!(children(&tree, "p"), vec!["c1", "c2", "c4", "c3"]);
    }

    #[test]
    fn test_reorder_forward_accounts_for_removal() {
        let mut tree = add(&root_collection(), "p", "r", None);
        for id in ["c1", "c2", "c3", "c4"] {
            tree = add(&tree, id, "p", None);
        }

        let tree = reparent_node(&tree, "c1", "p", Some(3)).unwrap();

        assert_eq!(children(&tree, "p"), vec!["c2", "c3", "c1", "c4"]);
        let tree = reparent_node(&tree, "c2", "p", None).unwrap();
        assert_eq!(children(&tree, "p"), vec!["c3", "c1", "c4", "c2"]);
    }

    #[test]
    fn test_move_under_own_descendant_fails() {
        let tree = add(&root_collection(), "a", "r", None);
        let tree = add(&tree, "b", "a", None);

        let err = reparent_node(&tree, "a", "b", None).unwrap_err();

        assert_eq!(
            err,
            TreeError::invalid_move("a", "b", MoveViolation::OwnDescendant)
        );
    }

    #[test]
    fn test_move_violations() {
        let tree = add(&root_collection(), "a", "r", None);
        let user_root = Node::new_with_id("u".to_string(), NodeType::User, "Users".to_string());
        let mut nodes = tree.to_nodes();
        nodes.push(user_root);
        let tree = NodeCollection::from_nodes(nodes);

        assert!(matches!(
            reparent_node(&tree, "a", "a", None),
            Err(TreeError::InvalidStructuralMove { reason: MoveViolation::OwnParent, .. })
        ));
        assert!(matches!(
            reparent_node(&tree, "r", "u", None),
            Err(TreeError::InvalidStructuralMove { reason: MoveViolation::RootNode, .. })
        ));
        assert!(matches!(
            reparent_node(&tree, "a", "u", None),
            Err(TreeError::InvalidStructuralMove { reason: MoveViolation::CrossType, .. })
        ));
        assert!(matches!(
            reparent_node(&tree, "a", "ghost", None),
            Err(TreeError::NodeNotFound { .. })
        ));
    }

    #[test]
    fn test_cross_parent_move_updates_both_sides() {
        let tree = add(&root_collection(), "x", "r", None);
        let tree = add(&tree, "y", "r", Some(7.0));
        let tree = add(&tree, "leaf", "x", Some(3.0));
        assert_eq!(tree.get("x").unwrap().metric(RL), 3.0);

        let tree = reparent_node(&tree, "leaf", "y", Some(0)).unwrap();

        assert!(children(&tree, "x").is_empty());
        assert_eq!(children(&tree, "y"), vec!["leaf"]);
        assert_eq!(tree.get("leaf").unwrap().parent_id.as_deref(), Some("y"));
        assert_eq!(tree.get("x").unwrap().metric(RL), 0.0);
        assert_eq!(tree.get("y").unwrap().metric(RL), 7.0);
        assert!(tree.check_invariants().is_empty());
    }

    #[test]
    fn test_remove_subtree() {
        let tree = add(&root_collection(), "a", "r", None);
        let tree = add(&tree, "b", "a", None);
        let tree = add(&tree, "c", "b", None);
        let tree = add(&tree, "keep", "r", None);

        let tree = remove_node(&tree, "a").unwrap();

        for id in ["a", "b", "c"] {
            assert!(!tree.contains(id));
        }
        assert_eq!(children(&tree, "r"), vec!["keep"]);
        assert!(tree.check_invariants().is_empty());
    }

    #[test]
    fn test_remove_recomputes_parent() {
        let tree = add(&root_collection(), "low", "r", Some(1.0));
        let tree = add(&tree, "high", "r", Some(6.0));

        let tree = remove_node(&tree, "low").unwrap();

        assert_eq!(tree.get("r").unwrap().metric(RL), 6.0);
    }

    #[test]
    fn test_remove_root_clears_tree() {
        let tree = add(&root_collection(), "a", "r", None);

        let tree = remove_node(&tree, "r").unwrap();

        assert!(tree.is_empty());
    }

    #[test]
    fn test_add_then_remove_round_trips() {
        let before = add(&root_collection(), "a", "r", Some(4.0));

        let after = add(&before, "tmp", "r", Some(1.0));
        let restored = remove_node(&after, "tmp").unwrap();

        assert_eq!(restored, before);
    }

    #[test]
    fn test_add_insert_index_policy() {
        let tree = add(&root_collection(), "a", "r", None);
        let tree = add(&tree, "b", "r", None);

        let (first, _) = add_node(&tree, NewNode::new("F".into()).with_id("f"), "r", Some(0)).unwrap();
        assert_eq!(children(&first, "r"), vec!["f", "a", "b"]);

        let (last, _) = add_node(&tree, NewNode::new("L".into()).with_id("l"), "r", Some(99)).unwrap();
        assert_eq!(children(&last, "r"), vec!["a", "b", "l"]);
    }

    #[test]
    fn test_add_rejects_bad_requests() {
        let tree = add(&root_collection(), "a", "r", None);

        assert!(matches!(
            add_node(&tree, NewNode::new("x".into()), "ghost", None),
            Err(TreeError::NodeNotFound { .. })
        ));
        assert!(matches!(
            add_node(&tree, NewNode::new("x".into()).with_id("a"), "r", None),
            Err(TreeError::DuplicateId { .. })
        ));
        assert!(matches!(
            add_node(&tree, NewNode::new("x".into()).with_type(NodeType::User), "r", None),
            Err(TreeError::TypeMismatch { .. })
        ));
        assert!(matches!(
            add_node(&tree, NewNode::new("x".into()).with_set_metric(RL, 12.0), "r", None),
            Err(TreeError::InvalidMetricValue { .. })
        ));
    }

    #[test]
    fn test_add_inherits_parent_type() {
        let (_, node) = add_node(&root_collection(), NewNode::new("child".into()), "r", None).unwrap();

        assert_eq!(node.node_type, NodeType::Map);
        assert_eq!(node.parent_id.as_deref(), Some("r"));
        assert!(!node.id.is_empty());
    }

    #[test]
    fn test_noop_update_shares_every_node() {
        let tree = add(&root_collection(), "a", "r", Some(3.0));

        let same = update_node(&tree, "a", &NodeUpdate::new().with_title("A")).unwrap();

        assert!(same.shares_node(&tree, "a"));
        assert!(same.shares_node(&tree, "r"));
    }

    #[test]
    fn test_propagation_stops_when_unchanged() {
        let tree = add(&root_collection(), "a", "r", Some(2.0));
        let tree = add(&tree, "b", "r", Some(8.0));

        let tree2 = update_node(&tree, "b", &NodeUpdate::new().with_set_metric(RL, Some(6.0))).unwrap();

        assert_eq!(tree2.get("b").unwrap().metric(RL), 6.0);
        assert!(tree2.shares_node(&tree, "r"));
    }

    #[test]
    fn test_update_patches_properties() {
        use crate::models::MetadataValue;

        let tree = add(&root_collection(), "a", "r", None);
        let tree = update_node(
            &tree,
            "a",
            &NodeUpdate::new()
                .with_description(Some("body".to_string()))
                .with_draft(true)
                .with_metadata("solutionFor", Some(MetadataValue::from("r"))),
        )
        .unwrap();
        let a = tree.get("a").unwrap();
        assert_eq!(a.description.as_deref(), Some("body"));
        assert!(a.draft);
        assert_eq!(a.metadata["solutionFor"].as_str(), Some("r"));

        let tree = update_node(
            &tree,
            "a",
            &NodeUpdate::new()
                .with_description(None)
                .with_metadata("solutionFor", None),
        )
        .unwrap();
        let a = tree.get("a").unwrap();
        assert!(a.description.is_none());
        assert!(a.metadata.is_empty());
    }

    #[test]
    fn test_ensure_roots_creates_missing_only() {
        let tree = ensure_roots(&root_collection(), &NodeType::ALL);

        assert_eq!(tree.len(), 3);
        assert!(tree.contains("r"));
        let titles: Vec<&str> = tree
            .nodes_of_type(NodeType::User)
            .map(|node| node.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Contributors"]);

        let again = ensure_roots(&tree, &NodeType::ALL);
        assert_eq!(again, tree);
    }

    #[test]
    fn test_merge_duplicate_roots_keeps_subtrees() {
        let tree = add(&root_collection(), "a", "r", Some(4.0));
        let mut extra = Node::new_with_id("z".to_string(), NodeType::Map, "Extra".to_string());
        extra.set_metrics.insert(RL, 1.0);
        extra.calculated_metrics.insert(RL, 1.0);
        let mut nodes = tree.to_nodes();
        nodes.push(extra);
        let tree = NodeCollection::from_nodes(nodes);

        let merged = merge_duplicate_roots(&tree);

        assert_eq!(children(&merged, "r"), vec!["a", "z"]);
        assert_eq!(merged.get("z").unwrap().parent_id.as_deref(), Some("r"));
        assert_eq!(merged.get("r").unwrap().metric(RL), 1.0);
        assert!(merged.check_invariants().is_empty());
    }
}
