//! Process-local backend.
//!
//! Storage is two-level: a named database shared by every handle opened with
//! the same host, and buckets inside it. The first open of a database fixes its
//! page size and password; later opens must present the same password (when
//! one was set) and create their bucket on demand.
//!
//! Iteration follows hash map order, which is not stable across calls, so page
//! boundaries are best-effort for this backend. Scans walk a snapshot taken
//! under the read lock; handlers run after it is released and may write to
//! the same bucket.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::MemoryConfig;
use crate::connection::ConnectionString;
use crate::errors::{KvdbError, KvdbResult};
use crate::pagination::{PageWindow, first_accepted, page_accepted, page_keys};
use crate::record::{Outcome, Payload, Record};
use crate::traits::backend::{BackendKind, Handler, KvBackend};

type BucketData = RwLock<HashMap<String, Vec<u8>>>;

/// Named in-memory databases. Handles opened through the same catalog share
/// databases by name.
#[derive(Debug, Default, Clone)]
pub struct MemoryCatalog {
    databases: Arc<Mutex<HashMap<String, Arc<MemoryDatabase>>>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database(&self, label: &str) -> Option<Arc<MemoryDatabase>> {
        self.databases.lock().get(label).cloned()
    }

    pub fn database_names(&self) -> Vec<String> {
        self.databases.lock().keys().cloned().collect()
    }

    /// Returns the database named by `config`, creating it on first use.
    fn open_database(&self, config: &MemoryConfig) -> KvdbResult<Arc<MemoryDatabase>> {
        let mut databases = self.databases.lock();
        if let Some(db) = databases.get(&config.database) {
            if let Some(expected) = &db.password {
                if config.password.as_ref() != Some(expected) {
                    return Err(KvdbError::PasswordMismatch(config.database.clone()));
                }
            }
            return Ok(Arc::clone(db));
        }

        log::debug!("creating memory database {}", config.database);
        let db = Arc::new(MemoryDatabase {
            label: config.database.clone(),
            password: config.password.clone(),
            page_size: config.page_size,
            buckets: Mutex::new(HashMap::new()),
        });
        databases.insert(config.database.clone(), Arc::clone(&db));
        Ok(db)
    }
}

#[derive(Debug)]
pub struct MemoryDatabase {
    label: String,
    password: Option<String>,
    page_size: NonZeroUsize,
    buckets: Mutex<HashMap<String, Arc<BucketData>>>,
}

impl MemoryDatabase {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn page_size(&self) -> NonZeroUsize {
        self.page_size
    }

    pub fn bucket_labels(&self) -> Vec<String> {
        self.buckets.lock().keys().cloned().collect()
    }

    fn bucket(&self, label: &str) -> Arc<BucketData> {
        let mut buckets = self.buckets.lock();
        Arc::clone(buckets.entry(label.to_string()).or_default())
    }
}

/// A handle on one bucket of a [`MemoryDatabase`].
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    label: String,
    database: Arc<MemoryDatabase>,
    data: Arc<BucketData>,
}

impl MemoryStore {
    pub fn open(catalog: &MemoryCatalog, config: MemoryConfig) -> KvdbResult<Self> {
        let database = catalog.open_database(&config)?;
        let data = database.bucket(&config.bucket);
        Ok(Self {
            name: BackendKind::Mem.instance_name(&config.bucket),
            label: config.bucket,
            database,
            data,
        })
    }

    /// Opens a bucket from a `mem://<database>/<bucket>` connection string.
    pub fn from_uri(catalog: &MemoryCatalog, uri: &str) -> KvdbResult<Self> {
        let cs = ConnectionString::parse(uri)?;
        Self::open(catalog, MemoryConfig::from_connection(&cs)?)
    }

    /// The name [`MemoryStore::from_uri`] would give this bucket.
    pub fn instance_name(cs: &ConnectionString) -> KvdbResult<String> {
        let config = MemoryConfig::from_connection(cs)?;
        Ok(BackendKind::Mem.instance_name(&config.bucket))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Copies the bucket's records so no lock is held while a handler runs.
    fn snapshot(&self) -> Vec<(String, Vec<u8>)> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn database(&self) -> &Arc<MemoryDatabase> {
        &self.database
    }
}

impl KvBackend for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Mem
    }

    fn page_size(&self) -> NonZeroUsize {
        self.database.page_size
    }

    fn exists(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    fn get(&self, key: &str) -> Outcome {
        match self.data.read().get(key) {
            Some(value) => Outcome::ok(Record::new(key, value.clone())),
            None => KvdbError::NotFound(key.to_string()).into(),
        }
    }

    fn find_one(&self, handler: Handler<'_>) -> Outcome {
        first_accepted(self.snapshot(), handler).unwrap_or_else(|| Outcome::fail("didn't found kvs"))
    }

    fn set(&self, record: Record) -> Outcome {
        self.data
            .write()
            .insert(record.key.clone(), record.value.clone());
        Outcome::ok(record)
    }

    fn delete(&self, key: &str) -> Outcome {
        match self.data.write().remove(key) {
            Some(value) => Outcome::ok(Record::new(key, value)),
            None => KvdbError::NotFound(key.to_string()).into(),
        }
    }

    fn try_key_count(&self) -> KvdbResult<usize> {
        Ok(self.data.read().len())
    }

    fn list_keys(&self, page: usize) -> Vec<String> {
        let window = PageWindow::new(page, self.page_size());
        let data = self.data.read();
        page_keys(window, data.keys().cloned())
    }

    fn list(&self, page: usize, handler: Handler<'_>) -> Outcome {
        let window = PageWindow::new(page, self.page_size());
        Outcome::ok(Payload::List(page_accepted(window, self.snapshot(), handler)))
    }
}
