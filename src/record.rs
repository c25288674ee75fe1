//! Value objects shared by every backend.
//!
//! A [`Record`] is a key with an opaque byte value. Every contract operation
//! answers with an [`Outcome`], whose [`Payload`] is a closed set of shapes so
//! callers match on it instead of downcasting.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::KvdbError;

/// A single key/value pair. Values are opaque bytes; interpreting them is up
/// to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Record {
    pub key: String,
    pub value: Vec<u8>,
}

impl Record {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// The value decoded as UTF-8, replacing invalid sequences.
    pub fn value_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }
}

/// Data carried by a successful [`Outcome`].
#[derive(Debug, Clone, PartialEq, Eq, Default, derive_more::From, derive_more::TryInto)]
pub enum Payload {
    #[default]
    #[from(ignore)]
    #[try_into(ignore)]
    Empty,
    Record(Record),
    Records(Vec<Record>),
    Bytes(Vec<u8>),
    Keys(Vec<String>),
    /// Handler-produced payloads collected by a paginated `list`.
    List(Vec<Payload>),
}

impl Payload {
    /// Number of items carried.
    pub fn len(&self) -> usize {
        match self {
            Payload::Empty => 0,
            Payload::Record(_) | Payload::Bytes(_) => 1,
            Payload::Records(records) => records.len(),
            Payload::Keys(keys) => keys.len(),
            Payload::List(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Uniform result of a backend operation.
///
/// `success == false` means `payload` is [`Payload::Empty`] and `message`
/// holds the diagnostic. An `Outcome` doubles as an error value: [`error`]
/// is empty exactly when the operation succeeded.
///
/// [`error`]: Outcome::error
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Outcome {
    pub payload: Payload,
    pub success: bool,
    pub message: String,
}

impl Outcome {
    pub fn ok(payload: impl Into<Payload>) -> Self {
        Self {
            payload: payload.into(),
            success: true,
            message: String::new(),
        }
    }

    /// A failed outcome with the given diagnostic.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            payload: Payload::Empty,
            success: false,
            message: message.into(),
        }
    }

    /// A rejection with no diagnostic, the usual answer of a handler that
    /// does not accept a record.
    pub fn reject() -> Self {
        Self::fail("")
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// The diagnostic, or `""` for a successful outcome.
    pub fn error(&self) -> &str {
        if self.success { "" } else { &self.message }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// The carried record, if the payload is a single record.
    pub fn record(&self) -> Option<&Record> {
        match &self.payload {
            Payload::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<Payload, Outcome> {
        if self.success {
            Ok(self.payload)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.error())
    }
}

impl std::error::Error for Outcome {}

impl From<KvdbError> for Outcome {
    fn from(err: KvdbError) -> Self {
        Outcome::fail(err.to_string())
    }
}

impl<T: Into<Payload>> From<Result<T, KvdbError>> for Outcome {
    fn from(result: Result<T, KvdbError>) -> Self {
        match result {
            Ok(payload) => Outcome::ok(payload),
            Err(err) => err.into(),
        }
    }
}
