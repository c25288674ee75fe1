// Process-wide registry and scheme plumbing.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use kvdb::prelude::*;
use serial_test::serial;

#[test]
#[serial]
fn global_open_uses_builtin_schemes() {
    let store = kvdb::open("mem://global/first?count=3").unwrap();
    assert_eq!(store.name(), "Mem_first");
    assert_eq!(store.kind(), BackendKind::Mem);

    let again = kvdb::open("mem://global/first");
    assert!(matches!(again, Err(KvdbError::AlreadyExisted(name)) if name == "Mem_first"));
}

#[test]
#[serial]
fn global_register_adds_a_scheme_once() {
    let catalog = MemoryCatalog::new();
    kvdb::register("scratch", move |uri| {
        let config = MemoryConfig::from_connection(&ConnectionString::parse(uri)?)?;
        Ok(Arc::new(MemoryStore::open(&catalog, config)?) as Arc<dyn KvBackend>)
    })
    .unwrap();

    let store = kvdb::open("scratch://tmp/notes").unwrap();
    assert!(store.set(Record::new("todo", "write docs")).is_success());

    let second = kvdb::register("scratch", |_| Err(KvdbError::MissingComponent("never")));
    assert!(matches!(second, Err(KvdbError::AlreadyExisted(s)) if s == "scratch"));
}

#[cfg(feature = "redb")]
#[test]
#[serial]
fn global_and_local_registries_open_the_same_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let uri = format!(
        "redb://global.redb/shared?path={}",
        temp_dir.path().display()
    );
    let global = kvdb::open(&uri).unwrap();
    let local = Registry::with_defaults().open(&uri).unwrap();

    global.set(Record::new("k", "v"));
    assert!(local.exists("k"));
}

#[test]
fn named_schemes_reject_duplicates_before_constructing() {
    let registry = Registry::new();
    let built = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&built);
    let catalog = MemoryCatalog::new();
    registry
        .register_named("notes", MemoryStore::instance_name, move |uri| {
            counter.fetch_add(1, Ordering::SeqCst);
            let config = MemoryConfig::from_connection(&ConnectionString::parse(uri)?)?;
            Ok(Arc::new(MemoryStore::open(&catalog, config)?) as Arc<dyn KvBackend>)
        })
        .unwrap();

    registry.open("notes://db/todo").unwrap();
    assert!(matches!(
        registry.open("notes://db/todo"),
        Err(KvdbError::AlreadyExisted(name)) if name == "Mem_todo"
    ));
    assert_eq!(built.load(Ordering::SeqCst), 1);
}

#[test]
fn unknown_scheme_names_the_scheme() {
    let registry = Registry::with_defaults();
    let err = registry.open("etcd://localhost/service").unwrap_err();
    assert_eq!(err.to_string(), "This type of database [etcd] didn't exist");
}

#[test]
fn malformed_uri_is_rejected() {
    let registry = Registry::with_defaults();
    assert!(matches!(
        registry.open("not a connection string"),
        Err(KvdbError::InvalidUri(_))
    ));
}

#[test]
fn builtin_schemes_follow_features() {
    let schemes = Registry::with_defaults().schemes();
    assert!(schemes.contains(&"mem".to_string()));
    assert_eq!(schemes.contains(&"redb".to_string()), cfg!(feature = "redb"));
    assert_eq!(schemes.contains(&"redis".to_string()), cfg!(feature = "redis"));
}

#[test]
fn concurrent_opens_of_one_name_admit_exactly_one() {
    let registry = Arc::new(Registry::with_defaults());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || registry.open("mem://race/shared").is_ok())
        })
        .collect();
    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(winners, 1);
    assert_eq!(registry.resolve("mem").unwrap().instance_count(), 1);
}

#[test]
fn separate_registries_do_not_share_instances() {
    let a = Registry::with_defaults();
    let b = Registry::with_defaults();
    let first = a.open("mem://iso/bucket").unwrap();
    let second = b.open("mem://iso/bucket").unwrap();

    first.set(Record::new("k", "v"));
    assert!(!second.exists("k"));
}
