//! LLM gateway for Parley
//!
//! Takes one canonical chat request and serves it against an
//! OpenAI-compatible, Gemini, Anthropic or Ollama endpoint, buffered or
//! streamed. Vendor failures after dispatch come back as readable replies
//! instead of errors.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod convert;
pub mod decode;
pub mod error;
pub mod gateway;
#[cfg(feature = "http")]
pub mod handler;
pub mod protocol;
pub mod provider;
pub mod types;

pub use error::LlmError;
pub use gateway::{FrameEmitter, Gateway};
#[cfg(feature = "http")]
pub use handler::gateway_router;
pub use provider::{CallLimits, EventStream, Provider, ProviderConfig};
pub use types::{CompletionRequest, CompletionResponse, StreamEvent};
