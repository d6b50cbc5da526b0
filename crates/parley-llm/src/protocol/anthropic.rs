//! Anthropic Messages API wire format

use serde::{Deserialize, Serialize};

/// Header carrying the API version
pub const VERSION_HEADER: &str = "anthropic-version";

/// API version every request is pinned to
pub const API_VERSION: &str = "2023-06-01";

// -- Request types --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicRequest {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<AnthropicMessage>,
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// Role is `user` or `assistant`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: String,
}

// -- Response types --

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnthropicResponse {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub content: Vec<AnthropicContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<AnthropicUsage>,
    /// Present when `type` is `error`
    #[serde(default)]
    pub error: Option<AnthropicError>,
}

/// Text, thinking or tool-use block; only text is kept
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnthropicContentBlock {
    #[serde(rename = "type", default)]
    pub block_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct AnthropicUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnthropicError {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default)]
    pub message: String,
}

// -- Models list --

#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicModelList {
    #[serde(default)]
    pub data: Vec<AnthropicModel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicModel {
    pub id: String,
}
