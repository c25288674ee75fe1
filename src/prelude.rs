//! Prelude module for convenient imports.
//!
//! ```rust
//! use kvdb::prelude::*;
//! ```

pub use crate::config::{MemoryConfig, RedbConfig, RedisConfig};
pub use crate::connection::ConnectionString;
pub use crate::databases::memory_store::{MemoryCatalog, MemoryStore};
pub use crate::errors::{KvdbError, KvdbResult};
pub use crate::record::{Outcome, Payload, Record};
pub use crate::registry::{Registry, SchemeDescriptor};
pub use crate::traits::{BackendKind, Handler, KvBackend, KvBackendExt};

#[cfg(feature = "redb")]
pub use crate::databases::redb_store::{RedbCatalog, RedbStore};

#[cfg(feature = "redis")]
pub use crate::databases::redis_store::RedisStore;
