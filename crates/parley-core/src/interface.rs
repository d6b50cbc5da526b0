use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Vendor wire protocol a base URL speaks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiInterface {
    /// `OpenAI` chat completions and the many APIs that clone it
    #[default]
    #[serde(alias = "openai", alias = "openai-compatible")]
    OpenaiCompatible,
    /// Google Generative Language `generateContent`
    #[serde(alias = "gemini", alias = "gemini-native")]
    GeminiNative,
    /// Anthropic Messages API
    #[serde(alias = "anthropic", alias = "anthropic-native")]
    AnthropicNative,
    /// Ollama native `/api/chat`
    Ollama,
}

impl ApiInterface {
    /// Canonical snake-case name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenaiCompatible => "openai_compatible",
            Self::GeminiNative => "gemini_native",
            Self::AnthropicNative => "anthropic_native",
            Self::Ollama => "ollama",
        }
    }

    /// Version suffix appended when a base URL carries none
    pub const fn version_suffix(self) -> &'static str {
        match self {
            Self::OpenaiCompatible | Self::AnthropicNative => "/v1",
            Self::GeminiNative => "/v1beta",
            Self::Ollama => "/api",
        }
    }
}

impl fmt::Display for ApiInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when an interface name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown api interface: {0}")]
pub struct UnknownInterface(pub String);

impl FromStr for ApiInterface {
    type Err = UnknownInterface;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "" | "openai" | "openai_compatible" => Ok(Self::OpenaiCompatible),
            "gemini" | "gemini_native" | "google" => Ok(Self::GeminiNative),
            "anthropic" | "anthropic_native" | "claude" => Ok(Self::AnthropicNative),
            "ollama" => Ok(Self::Ollama),
            _ => Err(UnknownInterface(s.to_owned())),
        }
    }
}
