//! Snapshot store adapters.

mod in_memory;
mod redis;

pub use in_memory::InMemorySnapshotStore;
pub use redis::RedisSnapshotStore;
