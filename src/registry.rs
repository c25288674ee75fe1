//! Scheme registry and backend factory.
//!
//! A [`Registry`] maps each connection-string scheme to a constructor and to
//! the live instances built through it. Instances are registered under their
//! [`KvBackend::name`] and are never removed, so two handles can never silently
//! alias one namespace.
//!
//! Tests and embedders build their own registry with [`Registry::new`] or
//! [`Registry::with_defaults`]. The crate-level [`register`] and [`open`]
//! functions use a process-wide registry that starts with every compiled-in
//! backend.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use parking_lot::{Mutex, RwLock};

use crate::connection::ConnectionString;
use crate::databases::memory_store::{MemoryCatalog, MemoryStore};
use crate::errors::{KvdbError, KvdbResult};
use crate::traits::backend::{BackendKind, KvBackend};

/// Builds a backend from a full connection string.
pub type Constructor = Arc<dyn Fn(&str) -> KvdbResult<Arc<dyn KvBackend>> + Send + Sync>;

/// Computes the name a constructor would give the instance, without building
/// it.
pub type Namer = Arc<dyn Fn(&ConnectionString) -> KvdbResult<String> + Send + Sync>;

pub struct SchemeDescriptor {
    scheme: String,
    constructor: Constructor,
    namer: Option<Namer>,
    instances: Mutex<HashMap<String, Arc<dyn KvBackend>>>,
}

impl SchemeDescriptor {
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn constructor(&self) -> &Constructor {
        &self.constructor
    }

    /// Number of live instances created under this scheme.
    pub fn instance_count(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn instance(&self, name: &str) -> Option<Arc<dyn KvBackend>> {
        self.instances.lock().get(name).cloned()
    }

    pub fn instance_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.instances.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Fails if `cs` names an instance that already exists. Schemes
    /// registered without a namer are only checked after construction.
    fn check_vacant(&self, cs: &ConnectionString) -> KvdbResult<()> {
        let Some(namer) = &self.namer else {
            return Ok(());
        };
        let name = namer(cs)?;
        if self.instances.lock().contains_key(&name) {
            return Err(KvdbError::AlreadyExisted(name));
        }
        Ok(())
    }

    fn adopt(&self, backend: Arc<dyn KvBackend>) -> KvdbResult<Arc<dyn KvBackend>> {
        let mut instances = self.instances.lock();
        let name = backend.name().to_string();
        if instances.contains_key(&name) {
            return Err(KvdbError::AlreadyExisted(name));
        }
        instances.insert(name, Arc::clone(&backend));
        Ok(backend)
    }
}

impl fmt::Debug for SchemeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemeDescriptor")
            .field("scheme", &self.scheme)
            .field("instances", &self.instance_names())
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct Registry {
    schemes: RwLock<HashMap<String, Arc<SchemeDescriptor>>>,
    // Held for the whole of `open` so name checks never race.
    open_lock: Mutex<()>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every compiled-in backend registered.
    ///
    /// Memory databases are private to this registry. redb files go through
    /// the process-wide [`RedbCatalog::shared`] catalog, because redb locks a
    /// file exclusively: two registries can then open buckets of the same
    /// file, and each registry still rejects a second handle on a bucket it
    /// already holds.
    ///
    /// [`RedbCatalog::shared`]: crate::databases::redb_store::RedbCatalog::shared
    pub fn with_defaults() -> Self {
        let registry = Self::new();

        #[cfg(feature = "redb")]
        {
            use crate::databases::redb_store::{RedbCatalog, RedbStore};
            let catalog = RedbCatalog::shared();
            registry.register_builtin(BackendKind::Redb, RedbStore::instance_name, move |uri| {
                Ok(Arc::new(RedbStore::from_uri(&catalog, uri)?))
            });
        }

        #[cfg(feature = "redis")]
        {
            use crate::databases::redis_store::RedisStore;
            registry.register_builtin(BackendKind::Redis, RedisStore::instance_name, |uri| {
                Ok(Arc::new(RedisStore::from_uri(uri)?))
            });
        }

        let catalog = MemoryCatalog::new();
        registry.register_builtin(BackendKind::Mem, MemoryStore::instance_name, move |uri| {
            Ok(Arc::new(MemoryStore::from_uri(&catalog, uri)?))
        });

        registry
    }

    fn register_builtin<N, F>(&self, kind: BackendKind, namer: N, constructor: F)
    where
        N: Fn(&ConnectionString) -> KvdbResult<String> + Send + Sync + 'static,
        F: Fn(&str) -> KvdbResult<Arc<dyn KvBackend>> + Send + Sync + 'static,
    {
        if let Err(e) = self.insert(kind.scheme(), Some(Arc::new(namer)), Arc::new(constructor)) {
            log::warn!("built-in scheme {} not registered: {}", kind, e);
        }
    }

    /// Registers `constructor` for `scheme`. A scheme can be registered once;
    /// a second attempt fails and leaves the first in place.
    pub fn register<F>(&self, scheme: &str, constructor: F) -> KvdbResult<()>
    where
        F: Fn(&str) -> KvdbResult<Arc<dyn KvBackend>> + Send + Sync + 'static,
    {
        self.insert(scheme, None, Arc::new(constructor))
    }

    /// Like [`register`](Self::register), with a `namer` that lets `open`
    /// reject a duplicate name before the constructor runs, so a rejected
    /// open leaves no state behind in the backend.
    pub fn register_named<N, F>(&self, scheme: &str, namer: N, constructor: F) -> KvdbResult<()>
    where
        N: Fn(&ConnectionString) -> KvdbResult<String> + Send + Sync + 'static,
        F: Fn(&str) -> KvdbResult<Arc<dyn KvBackend>> + Send + Sync + 'static,
    {
        self.insert(scheme, Some(Arc::new(namer)), Arc::new(constructor))
    }

    fn insert(&self, scheme: &str, namer: Option<Namer>, constructor: Constructor) -> KvdbResult<()> {
        let mut schemes = self.schemes.write();
        if schemes.contains_key(scheme) {
            return Err(KvdbError::AlreadyExisted(scheme.to_string()));
        }
        log::debug!("registered scheme {}", scheme);
        schemes.insert(
            scheme.to_string(),
            Arc::new(SchemeDescriptor {
                scheme: scheme.to_string(),
                constructor,
                namer,
                instances: Mutex::new(HashMap::new()),
            }),
        );
        Ok(())
    }

    pub fn resolve(&self, scheme: &str) -> Option<Arc<SchemeDescriptor>> {
        self.schemes.read().get(scheme).cloned()
    }

    pub fn schemes(&self) -> Vec<String> {
        let mut schemes: Vec<String> = self.schemes.read().keys().cloned().collect();
        schemes.sort();
        schemes
    }

    /// Builds a backend for `uri` with its scheme's constructor and records
    /// it. Fails when an instance of the same name already exists.
    pub fn open(&self, uri: &str) -> KvdbResult<Arc<dyn KvBackend>> {
        let _guard = self.open_lock.lock();

        let cs = ConnectionString::parse(uri)?;
        let descriptor = self
            .resolve(cs.scheme())
            .ok_or_else(|| KvdbError::UnknownScheme(cs.scheme().to_string()))?;

        descriptor.check_vacant(&cs)?;
        let backend = (descriptor.constructor)(uri)?;
        let backend = descriptor.adopt(backend)?;
        log::debug!("opened {} via {}", backend.name(), descriptor.scheme);
        Ok(backend)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("schemes", &self.schemes())
            .finish_non_exhaustive()
    }
}

static DEFAULT_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::with_defaults);

/// Registers a scheme in the process-wide registry.
pub fn register<F>(scheme: &str, constructor: F) -> KvdbResult<()>
where
    F: Fn(&str) -> KvdbResult<Arc<dyn KvBackend>> + Send + Sync + 'static,
{
    DEFAULT_REGISTRY.register(scheme, constructor)
}

/// Opens a backend through the process-wide registry.
///
/// ```
/// let store = kvdb::open("mem://docs/example?count=10").unwrap();
/// assert_eq!(store.name(), "Mem_example");
/// assert_eq!(store.page_size().get(), 10);
/// ```
pub fn open(uri: &str) -> KvdbResult<Arc<dyn KvBackend>> {
    DEFAULT_REGISTRY.open(uri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use assert_matches::assert_matches;

    #[test]
    fn defaults_include_memory() {
        let registry = Registry::with_defaults();
        assert!(registry.schemes().contains(&"mem".to_string()));
        assert!(registry.resolve("mem").is_some());
        assert!(registry.resolve("nope").is_none());
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let registry = Registry::new();
        assert_matches!(
            registry.open("mem://db/bucket"),
            Err(KvdbError::UnknownScheme(s)) if s == "mem"
        );
    }

    #[test]
    fn duplicate_scheme_keeps_first_constructor() {
        let registry = Registry::with_defaults();
        let second = registry.register("mem", |_| Err(KvdbError::MissingComponent("never")));
        assert_matches!(second, Err(KvdbError::AlreadyExisted(s)) if s == "mem");

        // The original constructor still answers.
        assert!(registry.open("mem://db/still-works").is_ok());
    }

    #[test]
    fn duplicate_instance_name_is_rejected() {
        let registry = Registry::with_defaults();
        let first = registry.open("mem://db/serv").unwrap();
        first.set(Record::new("k", "v"));

        let err = registry.open("mem://db/serv").unwrap_err();
        assert_eq!(err.to_string(), "Mem_serv already existed");

        let descriptor = registry.resolve("mem").unwrap();
        assert_eq!(descriptor.instance_count(), 1);
        assert!(descriptor.instance("Mem_serv").unwrap().exists("k"));
    }

    #[test]
    fn constructor_errors_do_not_register() {
        let registry = Registry::with_defaults();
        assert!(registry.open("mem://db/b?count=0").is_err());
        assert_eq!(registry.resolve("mem").unwrap().instance_count(), 0);
        assert!(registry.open("mem://db/b?count=3").is_ok());
    }

    #[test]
    fn custom_scheme() {
        let registry = Registry::new();
        let catalog = MemoryCatalog::new();
        registry
            .register("scratch", move |uri| {
                let cs = ConnectionString::parse(uri)?;
                let config = crate::config::MemoryConfig::from_connection(&cs)?;
                Ok(Arc::new(MemoryStore::open(&catalog, config)?))
            })
            .unwrap();

        let store = registry.open("scratch://tmp/notes").unwrap();
        assert_eq!(store.kind(), BackendKind::Mem);
        assert_eq!(registry.resolve("scratch").unwrap().instance_names(), vec!["Mem_notes"]);
    }
}
