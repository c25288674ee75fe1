//! Ordered-store backend on top of [redb](https://docs.rs/redb).
//!
//! Each instance owns one table ("bucket") in a single database file. Every
//! operation runs in its own transaction: one read transaction per lookup or
//! scan, one write transaction per `set`/`delete`. Iteration follows redb's
//! key order, which for `&str` keys is lexicographic over the raw bytes.
//!
//! redb locks its file exclusively, so a [`RedbCatalog`] hands out one shared
//! `redb::Database` per file and several buckets of one file can be open at
//! the same time.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Weak};

use parking_lot::Mutex;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};

use crate::config::RedbConfig;
use crate::connection::ConnectionString;
use crate::errors::{KvdbError, KvdbResult};
use crate::pagination::{PageWindow, first_accepted, page_accepted, page_keys};
use crate::record::{Outcome, Payload, Record};
use crate::traits::backend::{BackendKind, Handler, KvBackend};

static SHARED_CATALOG: LazyLock<RedbCatalog> = LazyLock::new(RedbCatalog::new);

type Bucket<'a> = TableDefinition<'a, &'static str, &'static [u8]>;

/// Open database files, keyed by canonical path.
#[derive(Debug, Default, Clone)]
pub struct RedbCatalog {
    files: Arc<Mutex<HashMap<PathBuf, Weak<Database>>>>,
}

impl RedbCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide catalog used by [`Registry::with_defaults`].
    ///
    /// [`Registry::with_defaults`]: crate::registry::Registry::with_defaults
    pub fn shared() -> Self {
        SHARED_CATALOG.clone()
    }

    /// Opens or creates the file at `path`, creating its parent directory
    /// first. A file already opened through this catalog is shared.
    pub fn open(&self, path: &Path) -> KvdbResult<Arc<Database>> {
        let parent = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;
        let file_name = path
            .file_name()
            .ok_or(KvdbError::MissingComponent("database file name"))?;
        let canonical = std::fs::canonicalize(&parent)?.join(file_name);

        let mut files = self.files.lock();
        files.retain(|_, db| db.strong_count() > 0);
        if let Some(db) = files.get(&canonical).and_then(Weak::upgrade) {
            return Ok(db);
        }
        log::debug!("opening redb file {}", canonical.display());
        let db = Arc::new(Database::create(&canonical)?);
        files.insert(canonical, Arc::downgrade(&db));
        Ok(db)
    }
}

/// A handle on one bucket of a redb file.
pub struct RedbStore {
    name: String,
    path: PathBuf,
    bucket: String,
    page_size: NonZeroUsize,
    db: Arc<Database>,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Opens the file and creates the bucket if it is missing.
    pub fn new(catalog: &RedbCatalog, config: RedbConfig) -> KvdbResult<Self> {
        let db = catalog.open(&config.path)?;
        let store = Self {
            name: BackendKind::Redb.instance_name(&config.bucket),
            path: config.path,
            bucket: config.bucket,
            page_size: config.page_size,
            db,
        };

        let write_txn = store.db.begin_write()?;
        write_txn.open_table(store.table_def())?;
        write_txn.commit()?;

        log::debug!("{} ready at {}", store.name, store.path.display());
        Ok(store)
    }

    pub fn from_uri(catalog: &RedbCatalog, uri: &str) -> KvdbResult<Self> {
        let cs = ConnectionString::parse(uri)?;
        Self::new(catalog, RedbConfig::from_connection(&cs)?)
    }

    /// The name [`RedbStore::from_uri`] would give this bucket.
    pub fn instance_name(cs: &ConnectionString) -> KvdbResult<String> {
        let config = RedbConfig::from_connection(cs)?;
        Ok(BackendKind::Redb.instance_name(&config.bucket))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Get direct access to the underlying redb database
    pub fn db(&self) -> &Database {
        &self.db
    }

    fn table_def(&self) -> Bucket<'_> {
        TableDefinition::new(&self.bucket)
    }

    /// Runs `f` over the bucket's records in key order inside one read
    /// transaction. An engine error part way through ends the scan and is
    /// returned after `f` has seen the records read so far.
    fn scan<R>(
        &self,
        f: impl FnOnce(&mut dyn Iterator<Item = (String, Vec<u8>)>) -> R,
    ) -> KvdbResult<R> {
        let read_txn = self.db.begin_read()?;
        let table = self.open_read_table(&read_txn)?;
        let mut failure = None;
        let result = {
            let mut records = table.iter()?.map_while(|entry| match entry {
                Ok((k, v)) => Some((k.value().to_string(), v.value().to_vec())),
                Err(e) => {
                    failure = Some(e);
                    None
                }
            });
            f(&mut records)
        };
        match failure {
            Some(e) => Err(e.into()),
            None => Ok(result),
        }
    }

    fn open_read_table(
        &self,
        read_txn: &redb::ReadTransaction,
    ) -> KvdbResult<redb::ReadOnlyTable<&'static str, &'static [u8]>> {
        match read_txn.open_table(self.table_def()) {
            Ok(table) => Ok(table),
            Err(redb::TableError::TableDoesNotExist(_)) => {
                Err(KvdbError::BucketUnavailable(self.bucket.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn read_value(&self, key: &str) -> KvdbResult<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = self.open_read_table(&read_txn)?;
        Ok(table.get(key)?.map(|guard| guard.value().to_vec()))
    }

    fn write_value(&self, record: &Record) -> KvdbResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(self.table_def())?;
            table.insert(record.key.as_str(), record.value.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Reads and removes `key` in one write transaction.
    fn remove_value(&self, key: &str) -> KvdbResult<Option<Vec<u8>>> {
        let write_txn = self.db.begin_write()?;
        let previous = {
            let mut table = write_txn.open_table(self.table_def())?;
            let removed = table.remove(key)?;
            removed.map(|guard| guard.value().to_vec())
        };
        write_txn.commit()?;
        Ok(previous)
    }
}

impl KvBackend for RedbStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Redb
    }

    fn page_size(&self) -> NonZeroUsize {
        self.page_size
    }

    fn exists(&self, key: &str) -> bool {
        matches!(self.read_value(key), Ok(Some(_)))
    }

    fn get(&self, key: &str) -> Outcome {
        match self.read_value(key) {
            Ok(Some(value)) => Outcome::ok(Record::new(key, value)),
            Ok(None) => KvdbError::NotFound(key.to_string()).into(),
            Err(e) => e.into(),
        }
    }

    fn find_one(&self, handler: Handler<'_>) -> Outcome {
        match self.scan(|records| first_accepted(records, handler)) {
            Ok(Some(outcome)) => outcome,
            Ok(None) => Outcome::fail("didn't found kvs"),
            Err(e) => e.into(),
        }
    }

    fn set(&self, record: Record) -> Outcome {
        match self.write_value(&record) {
            Ok(()) => Outcome::ok(record),
            Err(e) => e.into(),
        }
    }

    fn delete(&self, key: &str) -> Outcome {
        match self.remove_value(key) {
            Ok(Some(value)) => Outcome::ok(Record::new(key, value)),
            Ok(None) => KvdbError::NotFound(key.to_string()).into(),
            Err(e) => e.into(),
        }
    }

    fn try_key_count(&self) -> KvdbResult<usize> {
        let read_txn = self.db.begin_read()?;
        let table = self.open_read_table(&read_txn)?;
        Ok(table.len()? as usize)
    }

    fn list_keys(&self, page: usize) -> Vec<String> {
        let window = PageWindow::new(page, self.page_size);
        match self.scan(|records| page_keys(window, records.map(|(k, _)| k))) {
            Ok(keys) => keys,
            Err(e) => {
                log::warn!("{}: key listing failed: {}", self.name, e);
                Vec::new()
            }
        }
    }

    fn list(&self, page: usize, handler: Handler<'_>) -> Outcome {
        let window = PageWindow::new(page, self.page_size);
        self.scan(|records| Payload::List(page_accepted(window, records, handler)))
            .into()
    }
}
