//! Page windowing shared by all backends.
//!
//! Backends iterate with very different primitives (a redb range cursor, a
//! redis `HSCAN` cursor, a hash map iterator). They feed those iterators to the
//! helpers here so the page boundaries come out the same everywhere:
//!
//! - [`page_keys`] counts every visited key.
//! - [`page_accepted`] counts only records the handler accepted, but keeps
//!   walking past rejected ones.

use std::num::NonZeroUsize;

use crate::record::{Outcome, Payload};
use crate::traits::backend::Handler;

/// Half-open ordinal range `[start, end)` selected by a page index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub start: usize,
    pub end: usize,
}

impl PageWindow {
    pub fn new(page: usize, page_size: NonZeroUsize) -> Self {
        let size = page_size.get();
        let start = page.saturating_mul(size);
        Self {
            start,
            end: start.saturating_add(size),
        }
    }

    pub fn contains(&self, ordinal: usize) -> bool {
        ordinal >= self.start && ordinal < self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keys whose position among all keys falls inside `window`.
pub fn page_keys<I>(window: PageWindow, keys: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    keys.into_iter()
        .skip(window.start)
        .take(window.len())
        .collect()
}

/// Payloads of accepted records whose position among accepted records falls
/// inside `window`. Iteration stops once the window is full.
pub fn page_accepted<I>(window: PageWindow, records: I, handler: Handler<'_>) -> Vec<Payload>
where
    I: IntoIterator<Item = (String, Vec<u8>)>,
{
    let mut page = Vec::with_capacity(window.len().min(64));
    let mut accepted = 0usize;
    for (key, value) in records {
        if accepted >= window.end {
            break;
        }
        let outcome = handler(&key, &value);
        if !outcome.success {
            continue;
        }
        if window.contains(accepted) {
            page.push(outcome.payload);
        }
        accepted += 1;
    }
    page
}

/// The first handler outcome that accepts a record. No record past it is
/// visited.
pub fn first_accepted<I>(records: I, handler: Handler<'_>) -> Option<Outcome>
where
    I: IntoIterator<Item = (String, Vec<u8>)>,
{
    records
        .into_iter()
        .map(|(key, value)| handler(&key, &value))
        .find(|outcome| outcome.success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn records(n: usize) -> Vec<(String, Vec<u8>)> {
        (0..n)
            .map(|i| (format!("key{i}"), format!("value{i}").into_bytes()))
            .collect()
    }

    #[test]
    fn window_bounds() {
        let window = PageWindow::new(2, size(20));
        assert_eq!(window, PageWindow { start: 40, end: 60 });
        assert!(window.contains(40));
        assert!(!window.contains(60));
    }

    #[test]
    fn window_saturates_instead_of_overflowing() {
        let window = PageWindow::new(usize::MAX, size(3));
        assert_eq!(window.start, usize::MAX);
        assert!(window.is_empty());
    }

    #[test]
    fn keys_count_every_key() {
        let keys = records(7).into_iter().map(|(k, _)| k);
        assert_eq!(page_keys(PageWindow::new(1, size(3)), keys), vec!["key3", "key4", "key5"]);

        let keys = records(7).into_iter().map(|(k, _)| k);
        assert_eq!(page_keys(PageWindow::new(2, size(3)), keys), vec!["key6"]);
    }

    #[test]
    fn accepted_pages_count_only_accepted_records() {
        // Accept even-numbered keys: key0, key2, key4, ...
        let mut handler = |k: &str, v: &[u8]| {
            let n: usize = k.trim_start_matches("key").parse().unwrap();
            if n % 2 == 0 {
                Outcome::ok(Record::new(k, v))
            } else {
                Outcome::reject()
            }
        };
        let page = page_accepted(PageWindow::new(1, size(2)), records(10), &mut handler);
        let keys: Vec<String> = page
            .into_iter()
            .map(|p| Record::try_from(p).unwrap().key)
            .collect();
        assert_eq!(keys, vec!["key4", "key6"]);
    }

    #[test]
    fn accepted_scan_stops_at_window_end() {
        let mut visited = 0;
        let mut handler = |k: &str, _: &[u8]| {
            visited += 1;
            Outcome::ok(Payload::Keys(vec![k.to_string()]))
        };
        let page = page_accepted(PageWindow::new(0, size(3)), records(50), &mut handler);
        assert_eq!(page.len(), 3);
        assert_eq!(visited, 3);
    }

    #[test]
    fn first_accepted_short_circuits() {
        let mut visited = Vec::new();
        let mut handler = |k: &str, v: &[u8]| {
            visited.push(k.to_string());
            if k == "key3" {
                Outcome::ok(Record::new(k, v))
            } else {
                Outcome::reject()
            }
        };
        let found = first_accepted(records(10), &mut handler).unwrap();
        assert_eq!(found.record().unwrap().value, b"value3");
        assert_eq!(visited, vec!["key0", "key1", "key2", "key3"]);
    }

    #[test]
    fn first_accepted_none_when_nothing_matches() {
        let mut handler = |_: &str, _: &[u8]| Outcome::reject();
        assert!(first_accepted(records(5), &mut handler).is_none());
    }
}
