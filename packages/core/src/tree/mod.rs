//! Node collection and the pure functions that inspect and transform it
//!
//! - [`collection`] - `NodeCollection`, the id → node map every operation works on
//! - [`mutations`] - add, update, reparent and remove with metric propagation
//! - [`inspector`] - read-only queries (ancestry, parent maps, roots, subtrees)
//! - [`healing`] - repair pass for collections loaded from storage
//! - [`delta`] - changed/removed nodes between two collections

pub mod collection;
pub mod delta;
pub mod error;
pub mod healing;
pub mod inspector;
pub mod mutations;

pub use collection::NodeCollection;
pub use delta::NodeDelta;
pub use error::{MoveViolation, TreeError};
pub use healing::{heal_collection, HealReport};
pub use inspector::{
    check_invariants, descendant_ids, index_in_parent_map, is_ancestor_of, materialize_subtree,
    parent_map, root_nodes_by_type, InvariantViolation, MaterializedNode, RootIndex,
};
pub use mutations::{
    add_node, ensure_roots, merge_duplicate_roots, propagate_from, remove_node, reparent_node,
    update_node,
};
