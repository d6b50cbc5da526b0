//! Canonical request and response types
//!
//! Vendor-neutral representation every wire format converts to and from.

pub mod message;
pub mod request;
pub mod response;
pub mod stream;

pub use message::{Content, ContentPart, Message, Role, normalize_messages};
pub use request::CompletionRequest;
pub use response::{CompletionResponse, FinishReason, Usage};
pub use stream::StreamEvent;
