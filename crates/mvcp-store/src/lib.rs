pub mod error;
pub mod memory;
pub mod redb_store;
pub mod store;

pub use error::StoreError;
pub use memory::{InMemoryEventBus, InMemoryRepository};
pub use redb_store::RedbRepository;
pub use store::{EventBus, Repository, VM_EVENTS_TOPIC};
