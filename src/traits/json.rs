use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::{KvdbError, KvdbResult};
use crate::record::{Outcome, Payload, Record};
use crate::traits::backend::KvBackend;

/// JSON conveniences layered on any backend.
pub trait KvBackendExt: KvBackend {
    /// Serializes `data` as JSON and stores it under `key`.
    fn set_json<T: Serialize + ?Sized>(&self, key: &str, data: &T) -> Outcome {
        match serde_json::to_vec(data) {
            Ok(value) => self.set(Record::new(key, value)),
            Err(e) => KvdbError::from(e).into(),
        }
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> KvdbResult<T> {
        let outcome = self.get(key);
        match outcome.payload {
            Payload::Record(record) if outcome.success => Ok(serde_json::from_slice(&record.value)?),
            _ => Err(KvdbError::NotFound(key.to_string())),
        }
    }
}

impl<B: KvBackend + ?Sized> KvBackendExt for B {}
