//! Remote-cache backend: one redis hash per instance.
//!
//! Scans walk the hash with an explicit `HSCAN` cursor in batches of
//! [`SCAN_BATCH`] field names and fetch each value with its own `HGET`, so a
//! scan costs two round trips per visited record. A field whose fetch fails or
//! that disappeared in between is skipped. `HSCAN` may report a field more than
//! once while the hash is being rehashed; pages are exact only when the hash
//! is not modified during the listing.
//!
//! The connection is locked per command, so a handler may call back into the
//! same store while a scan is running.

use std::collections::VecDeque;
use std::num::NonZeroUsize;

use parking_lot::Mutex;
use redis::{Commands, Connection, ConnectionLike};
use url::Url;

use crate::config::RedisConfig;
use crate::connection::ConnectionString;
use crate::errors::{KvdbError, KvdbResult};
use crate::pagination::{PageWindow, first_accepted, page_accepted, page_keys};
use crate::record::{Outcome, Payload, Record};
use crate::traits::backend::{BackendKind, Handler, KvBackend};

/// `COUNT` hint sent with every `HSCAN`, independent of the page size.
pub const SCAN_BATCH: usize = 10;

/// A handle on one redis hash, generic over the connection so scans can run
/// against any [`ConnectionLike`].
pub struct RedisStore<C = Connection> {
    name: String,
    config: RedisConfig,
    conn: Mutex<C>,
}

impl<C> std::fmt::Debug for RedisStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("name", &self.name)
            .field("address", &self.config.address)
            .field("db", &self.config.db)
            .field("page_size", &self.config.page_size)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connects and pings the server; an unreachable server is an error.
    pub fn new(config: RedisConfig) -> KvdbResult<Self> {
        let client = redis::Client::open(connection_url(&config)?.as_str())?;
        let mut conn = client.get_connection()?;
        let _: String = redis::cmd("PING").query(&mut conn)?;

        log::debug!(
            "connected to redis at {} (db {}) for hash {}",
            config.address,
            config.db,
            config.hash_key
        );
        Ok(Self::with_connection(config, conn))
    }

    pub fn from_uri(uri: &str) -> KvdbResult<Self> {
        let cs = ConnectionString::parse(uri)?;
        Self::new(RedisConfig::from_connection(&cs)?)
    }

    /// The name [`RedisStore::from_uri`] would give this hash, computed
    /// without connecting.
    pub fn instance_name(cs: &ConnectionString) -> KvdbResult<String> {
        let config = RedisConfig::from_connection(cs)?;
        Ok(BackendKind::Redis.instance_name(&config.hash_key))
    }
}

impl<C: ConnectionLike> RedisStore<C> {
    /// Wraps an already established connection. No liveness check is made.
    pub fn with_connection(config: RedisConfig, conn: C) -> Self {
        Self {
            name: BackendKind::Redis.instance_name(&config.hash_key),
            config,
            conn: Mutex::new(conn),
        }
    }

    pub fn hash_key(&self) -> &str {
        &self.config.hash_key
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    fn fetch(&self, key: &str) -> KvdbResult<Option<Vec<u8>>> {
        Ok(self.conn.lock().hget(&self.config.hash_key, key)?)
    }

    /// `HGET` then `HDEL` inside `MULTI`/`EXEC`, so the returned value is the
    /// one that was deleted.
    fn take(&self, key: &str) -> KvdbResult<Option<Vec<u8>>> {
        let (previous, removed): (Option<Vec<u8>>, i64) = redis::pipe()
            .atomic()
            .hget(&self.config.hash_key, key)
            .hdel(&self.config.hash_key, key)
            .query(&mut *self.conn.lock())?;
        Ok(previous.filter(|_| removed > 0))
    }

    fn scanner(&self) -> HashScan<'_, C> {
        HashScan {
            conn: &self.conn,
            hash_key: &self.config.hash_key,
            cursor: 0,
            pending: VecDeque::new(),
            exhausted: false,
            failure: None,
        }
    }
}

/// Builds `redis://[:password@]host[:port]/db` for the client.
fn connection_url(config: &RedisConfig) -> KvdbResult<Url> {
    let mut url = Url::parse(&format!("redis://{}/{}", config.address, config.db))?;
    if let Some(password) = &config.password {
        // Only a URL without a usable host refuses a password.
        url.set_password(Some(password))
            .map_err(|()| KvdbError::InvalidParameter {
                name: "password",
                value: format!("cannot be used with address {:?}", config.address),
            })?;
    }
    Ok(url)
}

/// Cursor-driven walk over one hash. The connection is locked per command,
/// never across a handler call.
struct HashScan<'a, C> {
    conn: &'a Mutex<C>,
    hash_key: &'a str,
    cursor: u64,
    pending: VecDeque<String>,
    exhausted: bool,
    failure: Option<redis::RedisError>,
}

impl<C: ConnectionLike> HashScan<'_, C> {
    fn next_field(&mut self) -> Option<String> {
        loop {
            if let Some(field) = self.pending.pop_front() {
                return Some(field);
            }
            if self.exhausted {
                return None;
            }
            let batch: redis::RedisResult<(u64, Vec<Vec<u8>>)> = redis::cmd("HSCAN")
                .arg(self.hash_key)
                .arg(self.cursor)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query(&mut *self.conn.lock());
            match batch {
                Ok((cursor, items)) => {
                    self.cursor = cursor;
                    self.exhausted = cursor == 0;
                    // Replies alternate field, value; only the names are kept.
                    self.pending.extend(
                        items
                            .into_iter()
                            .step_by(2)
                            .map(|f| String::from_utf8_lossy(&f).into_owned()),
                    );
                }
                Err(e) => {
                    log::warn!("HSCAN on {} aborted: {}", self.hash_key, e);
                    self.failure = Some(e);
                    self.exhausted = true;
                    self.pending.clear();
                }
            }
        }
    }

    fn next_record(&mut self) -> Option<(String, Vec<u8>)> {
        while let Some(field) = self.next_field() {
            let fetched: redis::RedisResult<Option<Vec<u8>>> =
                self.conn.lock().hget(self.hash_key, &field);
            match fetched {
                Ok(Some(value)) => return Some((field, value)),
                Ok(None) => continue,
                Err(e) => {
                    log::warn!("HGET {} {} skipped: {}", self.hash_key, field, e);
                    continue;
                }
            }
        }
        None
    }

    fn finish<R>(self, result: R) -> KvdbResult<R> {
        match self.failure {
            Some(e) => Err(e.into()),
            None => Ok(result),
        }
    }
}

impl<C: ConnectionLike + Send> KvBackend for RedisStore<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Redis
    }

    fn page_size(&self) -> NonZeroUsize {
        self.config.page_size
    }

    fn exists(&self, key: &str) -> bool {
        self.conn
            .lock()
            .hexists(&self.config.hash_key, key)
            .unwrap_or(false)
    }

    fn get(&self, key: &str) -> Outcome {
        match self.fetch(key) {
            Ok(Some(value)) => Outcome::ok(Record::new(key, value)),
            Ok(None) => KvdbError::NotFound(key.to_string()).into(),
            Err(e) => e.into(),
        }
    }

    fn find_one(&self, handler: Handler<'_>) -> Outcome {
        let mut scan = self.scanner();
        let found = first_accepted(std::iter::from_fn(|| scan.next_record()), handler);
        match scan.finish(found) {
            Ok(Some(outcome)) => outcome,
            Ok(None) => Outcome::fail("didn't found kvs"),
            Err(e) => e.into(),
        }
    }

    fn set(&self, record: Record) -> Outcome {
        let written: redis::RedisResult<()> = self.conn.lock().hset(
            &self.config.hash_key,
            &record.key,
            record.value.as_slice(),
        );
        match written {
            Ok(()) => Outcome::ok(record),
            Err(e) => KvdbError::from(e).into(),
        }
    }

    fn delete(&self, key: &str) -> Outcome {
        match self.take(key) {
            Ok(Some(value)) => Outcome::ok(Record::new(key, value)),
            Ok(None) => KvdbError::NotFound(key.to_string()).into(),
            Err(e) => e.into(),
        }
    }

    fn try_key_count(&self) -> KvdbResult<usize> {
        Ok(self.conn.lock().hlen(&self.config.hash_key)?)
    }

    fn list_keys(&self, page: usize) -> Vec<String> {
        let window = PageWindow::new(page, self.config.page_size);
        let mut scan = self.scanner();
        let keys = page_keys(window, std::iter::from_fn(|| scan.next_field()));
        scan.finish(keys).unwrap_or_default()
    }

    fn list(&self, page: usize, handler: Handler<'_>) -> Outcome {
        let window = PageWindow::new(page, self.config.page_size);
        let mut scan = self.scanner();
        let page = page_accepted(window, std::iter::from_fn(|| scan.next_record()), handler);
        scan.finish(Payload::List(page)).into()
    }
}
