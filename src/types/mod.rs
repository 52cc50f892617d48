// Public modules
pub mod chat_session;
pub mod message;
pub mod reply;
pub mod session_id;

// Re-exports
pub use chat_session::ChatSession;
pub use message::{Message, MessageRole};
pub use reply::Reply;
pub use session_id::SessionId;
