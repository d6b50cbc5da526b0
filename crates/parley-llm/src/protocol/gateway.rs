//! Request and diagnostic shapes of the gateway's own endpoints

use std::fmt;

use parley_core::{ErrorCategory, ErrorInfo, Stage};
use serde::{Deserialize, Serialize};

use crate::types::CompletionRequest;

/// Response header naming the failure category of a diagnostic reply
pub const DIAGNOSTIC_HEADER: &str = "x-parley-diagnostic";

/// Vendor coordinates supplied by the caller on every request
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSpec {
    #[serde(default)]
    pub api_base_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Interface name; `openai_compatible` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_interface: Option<String>,
}

impl fmt::Debug for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetSpec")
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &"[REDACTED]")
            .field("api_interface", &self.api_interface)
            .finish()
    }
}

/// `POST /gateway/chat` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayChatRequest {
    #[serde(flatten)]
    pub target: TargetSpec,
    pub payload: CompletionRequest,
}

/// Machine-readable marker on a reply whose content describes a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub category: ErrorCategory,
    pub stage: Stage,
    #[serde(default)]
    pub upstream_status: Option<u16>,
}

impl From<&ErrorInfo> for Diagnostic {
    fn from(info: &ErrorInfo) -> Self {
        Self {
            category: info.category(),
            stage: info.stage(),
            upstream_status: info.upstream_status(),
        }
    }
}

/// `/gateway/models` success body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
}

impl ModelList {
    pub fn new(ids: Vec<String>) -> Self {
        Self {
            object: "list".to_owned(),
            data: ids.into_iter().map(|id| ModelEntry { id }).collect(),
        }
    }
}
