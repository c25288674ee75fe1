//! The contract every storage adapter satisfies.
//!
//! Handles are always used as `Arc<dyn KvBackend>`; callers never branch on
//! which engine sits underneath.

use std::fmt::Debug;
use std::num::NonZeroUsize;

use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

use crate::errors::KvdbResult;
use crate::record::{Outcome, Record};

/// Caller-supplied predicate for [`KvBackend::find_one`] and [`KvBackend::list`].
///
/// A successful outcome accepts the record and its payload is what the
/// operation returns; anything else rejects it. No backend lock is held while
/// the handler runs, so it may call back into the same store.
pub type Handler<'a> = &'a mut dyn FnMut(&str, &[u8]) -> Outcome;

/// Backend kinds, named by their connection-string scheme.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, IntoStaticStr, EnumString, EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum BackendKind {
    /// Single-file ordered store.
    Redb,
    /// One hash per namespace in a redis server.
    Redis,
    /// Process-local maps.
    Mem,
}

impl BackendKind {
    pub fn scheme(self) -> &'static str {
        self.into()
    }

    /// Prefix of instance names created under this kind.
    pub fn name_prefix(self) -> &'static str {
        match self {
            BackendKind::Redb => "Redb_",
            BackendKind::Redis => "Redis_",
            BackendKind::Mem => "Mem_",
        }
    }

    /// Name of the instance of this kind serving `namespace`.
    pub fn instance_name(self, namespace: &str) -> String {
        format!("{}{}", self.name_prefix(), namespace)
    }
}

pub trait KvBackend: Send + Sync + Debug {
    /// Stable identity, unique among live instances of one scheme.
    fn name(&self) -> &str;

    fn kind(&self) -> BackendKind;

    /// Number of entries per page for [`list_keys`](Self::list_keys) and
    /// [`list`](Self::list).
    fn page_size(&self) -> NonZeroUsize;

    /// True iff a record for `key` is present. A missing bucket reads as absent.
    fn exists(&self, key: &str) -> bool;

    fn get(&self, key: &str) -> Outcome;

    /// Walks records in backend order and returns the first handler outcome
    /// that accepts one.
    fn find_one(&self, handler: Handler<'_>) -> Outcome;

    /// Upserts `record` and returns it as the payload.
    fn set(&self, record: Record) -> Outcome;

    /// Removes `key`, returning the record as it was. Deleting an absent key
    /// fails.
    fn delete(&self, key: &str) -> Outcome;

    fn try_key_count(&self) -> KvdbResult<usize>;

    /// Number of live keys, `0` when the count cannot be read.
    fn key_count(&self) -> usize {
        match self.try_key_count() {
            Ok(count) => count,
            Err(e) => {
                log::warn!("{}: key count unavailable: {}", self.name(), e);
                0
            }
        }
    }

    /// Keys at ordinal positions `[page * page_size, (page + 1) * page_size)`.
    fn list_keys(&self, page: usize) -> Vec<String>;

    /// Handler payloads for accepted records on `page`, where the page window
    /// is measured in accepted records only.
    fn list(&self, page: usize, handler: Handler<'_>) -> Outcome;
}
