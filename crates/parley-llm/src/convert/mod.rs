//! Conversion between canonical types and vendor wire formats
//!
//! Parsing is strict per vendor: a body in an unexpected shape is an error,
//! never an empty reply.

pub mod anthropic;
pub mod google;
pub mod ollama;
pub mod openai;

use parley_core::ApiInterface;

use crate::error::LlmError;
use crate::protocol::VendorRequest;
use crate::types::{CompletionRequest, CompletionResponse, StreamEvent};

/// Build the vendor request body for `interface`
///
/// `anthropic_max_tokens` fills the field Anthropic requires when the
/// request carries no limit.
pub fn build_request(interface: ApiInterface, request: &CompletionRequest, anthropic_max_tokens: u32) -> VendorRequest {
    match interface {
        ApiInterface::OpenaiCompatible => VendorRequest::OpenAi(openai::to_wire(request)),
        ApiInterface::GeminiNative => VendorRequest::Gemini(google::to_wire(request)),
        ApiInterface::AnthropicNative => VendorRequest::Anthropic(anthropic::to_wire(request, anthropic_max_tokens)),
        ApiInterface::Ollama => VendorRequest::Ollama(ollama::to_wire(request)),
    }
}

/// Parse a buffered success body
///
/// `model` is the requested model, used when the vendor does not echo one.
pub fn parse_response(interface: ApiInterface, body: &str, model: &str) -> Result<CompletionResponse, LlmError> {
    match interface {
        ApiInterface::OpenaiCompatible => openai::from_response(body, model),
        ApiInterface::GeminiNative => google::from_response(body, model),
        ApiInterface::AnthropicNative => anthropic::from_response(body, model),
        ApiInterface::Ollama => ollama::from_response(body, model),
    }
}

/// Parse one decoded stream payload (SSE `data` or NDJSON line)
pub fn parse_stream_payload(interface: ApiInterface, payload: &str) -> Result<Vec<StreamEvent>, LlmError> {
    match interface {
        ApiInterface::OpenaiCompatible => openai::chunk_events(payload),
        ApiInterface::GeminiNative => google::chunk_events(payload),
        // Served buffered, so a "stream payload" is a whole message
        ApiInterface::AnthropicNative => anthropic::from_response(payload, "").map(|r| anthropic::replay(&r)),
        ApiInterface::Ollama => ollama::chunk_events(payload),
    }
}

/// Parse a model listing body into model ids
pub fn parse_models(interface: ApiInterface, body: &str) -> Result<Vec<String>, LlmError> {
    match interface {
        ApiInterface::OpenaiCompatible => openai::model_ids(body),
        ApiInterface::GeminiNative => google::model_ids(body),
        ApiInterface::AnthropicNative => anthropic::model_ids(body),
        ApiInterface::Ollama => ollama::model_ids(body),
    }
}

fn truncate_for_error(body: &str) -> String {
    parley_core::snippet(body.trim(), 200)
}
