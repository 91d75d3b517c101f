//! Tree Service - orchestration between the engine and the store
//!
//! Every mutating call follows the same sequence:
//!
//! 1. take the write lock
//! 2. read the full snapshot from the store and heal it (persisting repairs)
//! 3. run the pure engine function
//! 4. diff the result against the snapshot
//! 5. write only the changed records, then publish the delta
//!
//! Reads take the same lock, since a full store read may itself rewrite files.
//! The write lock serializes mutations within this process. It gives no
//! guarantee against another process editing the same store: the last writer
//! wins, and the next full read heals whatever half-written state remains.

use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use super::error::ServiceError;
use crate::db::{DomainEvent, NodeStore, TreeOperation};
use crate::models::{NewNode, Node, NodeType, NodeUpdate};
use crate::tree::{
    add_node, ensure_roots, heal_collection, materialize_subtree, remove_node, reparent_node,
    update_node, MaterializedNode, NodeCollection, NodeDelta, TreeError,
};

/// Capacity of the domain event channel; slow subscribers lag beyond this
const DOMAIN_EVENT_CHANNEL_CAPACITY: usize = 128;

/// Service owning the store and serializing writes to it
///
/// Cheap to clone: clones share the store, the lock and the event channel.
///
/// # Examples
///
/// ```rust
/// use arbor_core::db::MemoryStore;
/// use arbor_core::models::NewNode;
/// use arbor_core::services::TreeService;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), arbor_core::services::ServiceError> {
/// let service = TreeService::new(Arc::new(MemoryStore::new()));
/// let tree = service.initialize().await?;
/// let root = tree.iter().next().unwrap().id.clone();
///
/// let (node, delta) = service
///     .create_node(NewNode::new("First child".to_string()), &root, None)
///     .await?;
/// assert!(delta.updated.contains_key(&node.id));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TreeService {
    store: Arc<dyn NodeStore>,
    write_lock: Arc<Mutex<()>>,
    event_tx: broadcast::Sender<DomainEvent>,
}

impl TreeService {
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        let (event_tx, _) = broadcast::channel(DOMAIN_EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
            event_tx,
        }
    }

    pub fn store(&self) -> &Arc<dyn NodeStore> {
        &self.store
    }

    /// Subscribe to the delta of every persisted change
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.event_tx.subscribe()
    }

    /// Ignores the error returned when nobody is subscribed
    fn emit_event(&self, event: DomainEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Prepare the store for use
    ///
    /// Heals the stored tree and creates the bootstrap root of every node type
    /// that has none. Safe to call on every start.
    pub async fn initialize(&self) -> Result<NodeCollection, ServiceError> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.healed_snapshot().await?;

        let tree = ensure_roots(&snapshot, &NodeType::ALL);
        let delta = NodeDelta::between(&snapshot, &tree);
        if !delta.is_empty() {
            self.store.write_delta(&delta).await?;
            info!(created = delta.updated.len(), "created missing root nodes");
            self.emit_event(DomainEvent::healed(delta));
        }

        info!(nodes = tree.len(), "tree service initialized");
        Ok(tree)
    }

    /// Current tree, healed
    ///
    /// Takes the write lock: reading the store may rewrite or remove files,
    /// so reads and mutations never touch the store at the same time. Repairs
    /// are persisted and published as a heal event.
    pub async fn list_nodes(&self) -> Result<NodeCollection, ServiceError> {
        let _guard = self.write_lock.lock().await;
        self.healed_snapshot().await
    }

    pub async fn get_node(&self, node_id: &str) -> Result<Node, ServiceError> {
        self.list_nodes()
            .await?
            .get(node_id)
            .cloned()
            .ok_or_else(|| ServiceError::node_not_found(node_id))
    }

    /// Nested view of the subtree rooted at `node_id`
    pub async fn subtree(&self, node_id: &str) -> Result<MaterializedNode, ServiceError> {
        let tree = self.list_nodes().await?;
        materialize_subtree(&tree, node_id).ok_or_else(|| ServiceError::node_not_found(node_id))
    }

    /// Add a node under `parent_id`, returning the created node and the delta
    pub async fn create_node(
        &self,
        new_node: NewNode,
        parent_id: &str,
        insert_at: Option<usize>,
    ) -> Result<(Node, NodeDelta), ServiceError> {
        let (node, delta) = self
            .apply(TreeOperation::Create, parent_id, |tree| {
                add_node(tree, new_node, parent_id, insert_at)
            })
            .await?;
        self.emit_event(DomainEvent::new(TreeOperation::Create, &node.id, delta.clone()));
        Ok((node, delta))
    }

    pub async fn update_node(
        &self,
        node_id: &str,
        patch: &NodeUpdate,
    ) -> Result<NodeDelta, ServiceError> {
        let ((), delta) = self
            .apply(TreeOperation::Update, node_id, |tree| {
                Ok((update_node(tree, node_id, patch)?, ()))
            })
            .await?;
        self.emit_event(DomainEvent::new(TreeOperation::Update, node_id, delta.clone()));
        Ok(delta)
    }

    pub async fn reparent_node(
        &self,
        node_id: &str,
        new_parent_id: &str,
        insert_at: Option<usize>,
    ) -> Result<NodeDelta, ServiceError> {
        let ((), delta) = self
            .apply(TreeOperation::Reparent, node_id, |tree| {
                Ok((reparent_node(tree, node_id, new_parent_id, insert_at)?, ()))
            })
            .await?;
        self.emit_event(DomainEvent::new(TreeOperation::Reparent, node_id, delta.clone()));
        Ok(delta)
    }

    /// Remove a node and its whole subtree
    pub async fn delete_node(&self, node_id: &str) -> Result<NodeDelta, ServiceError> {
        let ((), delta) = self
            .apply(TreeOperation::Delete, node_id, |tree| {
                Ok((remove_node(tree, node_id)?, ()))
            })
            .await?;
        self.emit_event(DomainEvent::new(TreeOperation::Delete, node_id, delta.clone()));
        Ok(delta)
    }

    /// Run one engine operation under the write lock and persist its delta
    ///
    /// The caller publishes the event, since only it knows the final target
    /// id (a created node's id is generated by the engine).
    async fn apply<T, F>(
        &self,
        operation: TreeOperation,
        target_id: &str,
        mutate: F,
    ) -> Result<(T, NodeDelta), ServiceError>
    where
        T: Send,
        F: FnOnce(&NodeCollection) -> Result<(NodeCollection, T), TreeError> + Send,
    {
        let _guard = self.write_lock.lock().await;
        let before = self.healed_snapshot().await?;

        let (after, output) = mutate(&before)?;
        let delta = NodeDelta::between(&before, &after);
        if !delta.is_empty() {
            self.store.write_delta(&delta).await?;
        }

        info!(
            %operation,
            target_id,
            updated = delta.updated.len(),
            removed = delta.removed.len(),
            "applied tree operation"
        );
        Ok((output, delta))
    }

    /// Read and heal the stored tree, persisting any repairs
    ///
    /// Callers must hold the write lock.
    async fn healed_snapshot(&self) -> Result<NodeCollection, ServiceError> {
        let stored = self.store.read_all().await?;
        let report = heal_collection(&stored);
        if report.is_clean() {
            return Ok(report.collection);
        }

        warn!(healed = report.healed_ids.len(), "repaired stored tree");
        let delta = NodeDelta::between(&stored, &report.collection);
        self.store.write_delta(&delta).await?;
        self.emit_event(DomainEvent::healed(delta));
        Ok(report.collection)
    }
}
