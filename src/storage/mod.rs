pub mod sled_store;
pub mod session_store;
#[cfg(test)]
mod memory;

pub use sled_store::*;
pub use session_store::*;
#[cfg(test)]
pub use memory::MemoryStore;

use anyhow::Result;

/// Durable string key-value storage for client session state.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}
