mod filters;
mod memory;
mod redb_store;
mod traits;

pub use filters::{EdgeFilter, InventoryFilter, StoreStats};
pub use memory::MemoryStore;
pub use redb_store::{RedbStore, CURRENT_SCHEMA_VERSION};
pub use traits::Store;
