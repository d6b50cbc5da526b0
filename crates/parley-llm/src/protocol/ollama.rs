//! Ollama native chat wire format

use serde::{Deserialize, Serialize};

// -- Request types --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaRequest {
    pub model: String,
    pub messages: Vec<OllamaMessage>,
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<OllamaOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OllamaMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
    /// Raw base64, no `data:` prefix
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

// -- Response types --

/// Buffered body, and one NDJSON line of a stream
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OllamaResponse {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub message: Option<OllamaMessage>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub prompt_eval_count: Option<u32>,
    #[serde(default)]
    pub eval_count: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
}

// -- Models list --

#[derive(Debug, Clone, Deserialize)]
pub struct OllamaTagList {
    #[serde(default)]
    pub models: Vec<OllamaTag>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OllamaTag {
    pub name: String,
}
