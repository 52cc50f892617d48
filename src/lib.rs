// Public modules
pub mod chat;
pub mod client;
pub mod controller;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod render;
pub mod server;
pub mod storage;
pub mod store;
pub mod types;

// Re-exports
pub use client::{Completion, CompletionClient, ERROR_MARKER, error_message, is_error_message};
pub use controller::{IgnoreReason, PendingRequest, RequestState, SubmitOutcome, ViewController};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use storage::{DirStore, MemoryStore, PersistentStore};
pub use store::SessionStore;
pub use types::*;
