use serde::{Deserialize, Serialize};

/// Reason the model stopped generating
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end, or anything the vendor reports that is not a cut-off
    #[default]
    Stop,
    /// Output token limit reached
    Length,
    /// Vendor safety filter
    ContentFilter,
}

impl FinishReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ContentFilter => "content_filter",
        }
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub const fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Canonical buffered completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    /// Model name as reported by the vendor, or as requested
    pub model: String,
    /// Assistant text, never empty
    pub text: String,
    pub finish_reason: FinishReason,
    pub usage: Option<Usage>,
}
