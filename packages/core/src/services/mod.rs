//! Business Services
//!
//! - `TreeService` - read → heal → mutate → persist delta → publish, with a
//!   process-wide write lock
//!
//! Services sit between the persistence layer and the API layer and own the
//! only copy of the store handle.

pub mod error;
pub mod tree_service;

pub use error::ServiceError;
pub use tree_service::TreeService;
