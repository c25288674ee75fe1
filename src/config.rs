//! Backend configuration.
//!
//! Each backend has a config struct built either from a parsed
//! [`ConnectionString`] or programmatically through `typed-builder`.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use typed_builder::TypedBuilder;

use crate::connection::ConnectionString;
use crate::errors::{KvdbError, KvdbResult};

/// Page size used when the connection string carries no `count`.
pub const DEFAULT_PAGE_SIZE: NonZeroUsize = match NonZeroUsize::new(50) {
    Some(n) => n,
    None => unreachable!(),
};

/// Configuration for the single-file ordered store.
///
/// Connection string: `redb://<file>/<bucket>?[count=]&[path=]`, for example
/// `redb://service.db/service?count=20&path=./base`.
///
/// ```
/// use kvdb::config::RedbConfig;
///
/// let config = RedbConfig::builder()
///     .path("/data/store.redb")
///     .bucket("users")
///     .build();
/// assert_eq!(config.page_size.get(), 50);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
#[builder(doc)]
pub struct RedbConfig {
    /// Path to the database file
    #[builder(default = PathBuf::from("service.db"), setter(into))]
    pub path: PathBuf,

    /// Table holding this instance's keys
    #[builder(default = "service".to_string(), setter(into))]
    pub bucket: String,

    #[builder(default = DEFAULT_PAGE_SIZE)]
    pub page_size: NonZeroUsize,
}

impl Default for RedbConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RedbConfig {
    /// The host names the file; a `path` parameter is joined in front of it as
    /// its directory.
    pub fn from_connection(cs: &ConnectionString) -> KvdbResult<Self> {
        let defaults = Self::default();
        let file = cs.host().map(PathBuf::from).unwrap_or(defaults.path);
        let path = match cs.param("path") {
            Some(dir) => PathBuf::from(dir).join(file),
            None => file,
        };
        Ok(Self {
            path,
            bucket: cs.bucket().map(str::to_string).unwrap_or(defaults.bucket),
            page_size: cs.page_size()?.unwrap_or(defaults.page_size),
        })
    }
}

/// Configuration for the redis hash backend.
///
/// Connection string: `redis://<host>[:port]/<hashkey>?[count=]&[password=]&[dbno=]`.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
#[builder(doc)]
pub struct RedisConfig {
    /// `host:port` of the server
    #[builder(default = "localhost:6379".to_string(), setter(into))]
    pub address: String,

    #[builder(default, setter(strip_option, into))]
    pub password: Option<String>,

    /// Logical database number
    #[builder(default = 0)]
    pub db: i64,

    /// Hash holding this instance's fields
    #[builder(setter(into))]
    pub hash_key: String,

    #[builder(default = DEFAULT_PAGE_SIZE)]
    pub page_size: NonZeroUsize,
}

impl RedisConfig {
    pub fn from_connection(cs: &ConnectionString) -> KvdbResult<Self> {
        let hash_key = cs
            .bucket()
            .ok_or(KvdbError::MissingComponent("hash key"))?
            .to_string();
        Ok(Self {
            address: cs.address().unwrap_or_else(|| "localhost:6379".to_string()),
            password: cs.password().map(str::to_string),
            db: cs.int_param("dbno")?.unwrap_or(0),
            hash_key,
            page_size: cs.page_size()?.unwrap_or(DEFAULT_PAGE_SIZE),
        })
    }
}

/// Configuration for the in-memory backend.
///
/// Connection string: `mem://<database>/<bucket>?[count=]&[password=]`. The
/// database is shared by every bucket opened under the same name.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
#[builder(doc)]
pub struct MemoryConfig {
    #[builder(setter(into))]
    pub database: String,

    #[builder(setter(into))]
    pub bucket: String,

    /// Recorded when the database is created, checked on later opens
    #[builder(default, setter(strip_option, into))]
    pub password: Option<String>,

    /// Applied only when the database is created
    #[builder(default = DEFAULT_PAGE_SIZE)]
    pub page_size: NonZeroUsize,
}

impl MemoryConfig {
    pub fn from_connection(cs: &ConnectionString) -> KvdbResult<Self> {
        Ok(Self {
            database: cs
                .host()
                .ok_or(KvdbError::MissingComponent("database name"))?
                .to_string(),
            bucket: cs
                .bucket()
                .ok_or(KvdbError::MissingComponent("bucket label"))?
                .to_string(),
            password: cs.password().map(str::to_string),
            page_size: cs.page_size()?.unwrap_or(DEFAULT_PAGE_SIZE),
        })
    }
}
