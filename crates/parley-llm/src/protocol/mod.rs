//! Wire format types
//!
//! Plain serde structs matching each vendor's JSON, plus the gateway's own
//! request and diagnostic shapes. Only used at the boundary.

pub mod anthropic;
pub mod gateway;
pub mod google;
pub mod ollama;
pub mod openai;

use serde::Serialize;

/// Outbound request body for one of the supported vendors
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VendorRequest {
    OpenAi(openai::OpenAiRequest),
    Gemini(google::GoogleRequest),
    Anthropic(anthropic::AnthropicRequest),
    Ollama(ollama::OllamaRequest),
}

impl VendorRequest {
    /// Set the streaming flag on bodies that carry one
    pub fn set_stream(&mut self, stream: bool) {
        match self {
            Self::OpenAi(request) => request.stream = stream,
            Self::Ollama(request) => request.stream = stream,
            Self::Gemini(_) | Self::Anthropic(_) => {}
        }
    }
}
