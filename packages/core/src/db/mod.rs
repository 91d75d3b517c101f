//! Persistence Layer
//!
//! - [`NodeStore`] - the read-all / write-one / delete-one contract
//! - [`FileStore`] - one markdown file with YAML front matter per node
//! - [`MemoryStore`] - in-memory store for tests and embedding
//! - [`events`] - domain events published after each persisted change
//!
//! Writes are not transactional across nodes. A crash between two writes can
//! leave references that disagree; `tree::heal_collection` repairs them on
//! the next full read.

mod error;
pub mod events;
mod file_store;
mod node_store;
pub mod record;

pub use error::StoreError;
pub use events::{DomainEvent, TreeOperation};
pub use file_store::FileStore;
pub use node_store::{MemoryStore, NodeStore};
