//! Persistent registry of watched directories.

pub mod entry;
pub mod store;

pub use entry::{EvictionOrder, EvictionPolicy, WatchedDirectory};
pub use store::{Registry, RegistrySnapshot};
