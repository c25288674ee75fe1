// Common test utilities and helpers

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use kvdb::prelude::*;

/// Connection string for a redb bucket in `dir`.
pub fn redb_uri(dir: &Path, bucket: &str, count: usize) -> String {
    format!(
        "redb://service.redb/{bucket}?count={count}&path={}",
        dir.display()
    )
}

/// Inserts `key0..key{n-1}` with values `value0..`.
pub fn seed(store: &Arc<dyn KvBackend>, n: usize) {
    for i in 0..n {
        let outcome = store.set(Record::new(format!("key{i}"), format!("value{i}")));
        assert!(outcome.is_success(), "seeding key{i}: {}", outcome.error());
    }
}

/// Handler accepting records whose key contains `needle`, returning the record.
pub fn key_contains(needle: &str) -> impl FnMut(&str, &[u8]) -> Outcome + '_ {
    move |key: &str, value: &[u8]| {
        if key.contains(needle) {
            Outcome::ok(Record::new(key, value))
        } else {
            Outcome::reject()
        }
    }
}

/// Keys of the records carried by a `list` outcome.
pub fn listed_keys(outcome: Outcome) -> Vec<String> {
    assert!(outcome.is_success(), "list failed: {}", outcome.error());
    let Payload::List(items) = outcome.payload else {
        panic!("list returned {:?}", outcome.payload);
    };
    items
        .into_iter()
        .map(|item| Record::try_from(item).expect("handler returns records").key)
        .collect()
}

/// Every key, gathered page by page until an empty page.
pub fn all_pages(store: &Arc<dyn KvBackend>) -> Vec<String> {
    let mut keys = Vec::new();
    for page in 0.. {
        let batch = store.list_keys(page);
        if batch.is_empty() {
            break;
        }
        keys.extend(batch);
    }
    keys
}
