#[cfg(feature = "redb")]
pub mod redb_store;

#[cfg(feature = "redis")]
pub mod redis_store;

pub mod memory_store;
