pub mod backend;
pub mod json;

// Re-export commonly used types
pub use backend::{BackendKind, Handler, KvBackend};
pub use json::KvBackendExt;
