pub mod common;

use common::{all_pages, seed};
use kvdb::prelude::*;

#[test]
fn buckets_share_a_database_but_not_keys() {
    let registry = Registry::with_defaults();
    let users = registry.open("mem://app/users?count=5").unwrap();
    let posts = registry.open("mem://app/posts").unwrap();

    users.set(Record::new("k", "user"));
    posts.set(Record::new("k", "post"));

    assert_eq!(users.get("k").record().unwrap().value, b"user");
    assert_eq!(posts.get("k").record().unwrap().value, b"post");
    // The page size is fixed by the first open of the database.
    assert_eq!(posts.page_size().get(), 5);
}

#[test]
fn password_is_checked_against_the_first_open() {
    let registry = Registry::with_defaults();
    registry.open("mem://vault/a?password=123").unwrap();

    assert!(matches!(
        registry.open("mem://vault/b?password=456"),
        Err(KvdbError::PasswordMismatch(db)) if db == "vault"
    ));
    assert!(registry.open("mem://vault/c?password=123").is_ok());
}

#[test]
fn same_label_under_another_database_collides() {
    let registry = Registry::with_defaults();
    registry.open("mem://one/shared").unwrap();
    let err = registry.open("mem://two/shared").unwrap_err();
    assert_eq!(err.to_string(), "Mem_shared already existed");
}

#[test]
fn rejected_open_leaves_no_database_behind() {
    let registry = Registry::with_defaults();
    registry.open("mem://one/shared").unwrap();

    let err = registry
        .open("mem://two/shared?password=secret&count=3")
        .unwrap_err();
    assert_eq!(err.to_string(), "Mem_shared already existed");

    // "two" was never created, so this open creates it with its own settings.
    let other = registry.open("mem://two/other?count=10").unwrap();
    assert_eq!(other.page_size().get(), 10);
    assert!(registry.open("mem://two/other2").is_ok());
}

#[test]
fn missing_bucket_fails_construction() {
    let registry = Registry::with_defaults();
    assert!(matches!(
        registry.open("mem://only-db"),
        Err(KvdbError::MissingComponent(_))
    ));
}

#[test]
fn pages_partition_the_keys_in_any_order() {
    let registry = Registry::with_defaults();
    let store = registry.open("mem://paging/b?count=6").unwrap();
    seed(&store, 20);

    let pages: Vec<Vec<String>> = (0..4).map(|p| store.list_keys(p)).collect();
    assert_eq!(
        pages.iter().map(Vec::len).collect::<Vec<_>>(),
        vec![6, 6, 6, 2]
    );

    let mut keys = all_pages(&store);
    keys.sort();
    let mut expected: Vec<String> = (0..20).map(|i| format!("key{i}")).collect();
    expected.sort();
    assert_eq!(keys, expected);
}

#[test]
fn concurrent_writers_on_one_bucket() {
    let registry = Registry::with_defaults();
    let store = registry.open("mem://threads/b").unwrap();

    std::thread::scope(|s| {
        for t in 0..4 {
            let store = &store;
            s.spawn(move || {
                for i in 0..25 {
                    store.set(Record::new(format!("t{t}-{i}"), "x"));
                }
            });
        }
    });

    assert_eq!(store.key_count(), 100);
}
