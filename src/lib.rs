//! # kvdb
//!
//! One key-value contract over three very different engines, picked by
//! connection string:
//!
//! | Scheme  | Engine | Example |
//! |---------|--------|---------|
//! | `redb`  | single-file ordered store | `redb://service.db/service?count=20&path=./base` |
//! | `redis` | one redis hash per namespace | `redis://localhost:6379/service?count=50&dbno=1` |
//! | `mem`   | process-local maps | `mem://temp/serv?count=20&password=123` |
//!
//! Every handle is an `Arc<dyn KvBackend>`. Operations answer with an
//! [`Outcome`] instead of panicking or returning errors, and listings are paged
//! the same way on every backend (see [`pagination`]).
//!
//! ## Quick Start
//!
//! ```rust
//! use kvdb::prelude::*;
//!
//! let registry = Registry::with_defaults();
//! let store = registry.open("mem://app/users?count=2").unwrap();
//!
//! store.set(Record::new("alice", "1"));
//! store.set(Record::new("bob", "2"));
//! store.set(Record::new("carol", "3"));
//!
//! assert_eq!(store.get("alice").record().unwrap().value, b"1");
//! assert_eq!(store.key_count(), 3);
//! assert_eq!(store.list_keys(0).len(), 2);
//!
//! let found = store.find_one(&mut |key, value| {
//!     if value == b"2" {
//!         Outcome::ok(Record::new(key, value))
//!     } else {
//!         Outcome::reject()
//!     }
//! });
//! assert_eq!(found.record().unwrap().key, "bob");
//! ```

pub mod config;
pub mod connection;
pub mod databases;
pub mod errors;
pub mod pagination;
pub mod prelude;
pub mod record;
pub mod registry;
pub mod traits;

pub use errors::{KvdbError, KvdbResult};
pub use record::{Outcome, Payload, Record};
pub use registry::{Registry, open, register};
pub use traits::{BackendKind, Handler, KvBackend, KvBackendExt};
