use std::fmt;

use serde::{Deserialize, Serialize};

use crate::classify::{ErrorCategory, FailureKind, RawFailure, classify};

/// Pipeline stage a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Request validation before any outbound call
    Validate,
    /// Model listing
    Models,
    /// Buffered chat call
    Chat,
    /// Streaming chat call, transport side
    Stream,
    /// Streaming chat call, payload decoding
    StreamParse,
    /// Client call through the gateway
    Proxy,
    /// Client call straight to the vendor
    Direct,
    /// Follow-up call for a truncated reply
    Continuation,
}

impl Stage {
    /// Wire name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Models => "models",
            Self::Chat => "chat",
            Self::Stream => "stream",
            Self::StreamParse => "stream-parse",
            Self::Proxy => "proxy",
            Self::Direct => "direct",
            Self::Continuation => "continuation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified description of a failed call
///
/// Built once where the failure is first observed. Outer layers may only
/// re-tag the stage through [`ErrorInfo::with_stage`], which consumes the
/// value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    upstream_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    upstream_body: Option<String>,
    stage: Stage,
    category: ErrorCategory,
}

impl ErrorInfo {
    /// Classify a failure that never reached an HTTP response
    pub fn new(kind: FailureKind, message: impl Into<String>, stage: Stage) -> Self {
        let message = message.into();
        let category = classify(&RawFailure {
            kind,
            status: None,
            message: &message,
        });

        Self {
            message,
            upstream_status: None,
            upstream_body: None,
            stage,
            category,
        }
    }

    /// Classify a non-success vendor response
    ///
    /// The full body takes part in classification; only a snippet of at most
    /// `snippet_chars` characters is kept.
    pub fn upstream(status: u16, message: impl Into<String>, body: &str, stage: Stage, snippet_chars: usize) -> Self {
        let message = message.into();
        let haystack = format!("{message}\n{body}");
        let category = classify(&RawFailure {
            kind: FailureKind::Http,
            status: Some(status),
            message: &haystack,
        });

        let body = body.trim();
        Self {
            message,
            upstream_status: Some(status),
            upstream_body: (!body.is_empty()).then(|| snippet(body, snippet_chars)),
            stage,
            category,
        }
    }

    /// Rebuild from parts already classified elsewhere (e.g. a gateway diagnostic)
    pub fn from_parts(
        category: ErrorCategory,
        stage: Stage,
        message: impl Into<String>,
        upstream_status: Option<u16>,
    ) -> Self {
        Self {
            message: message.into(),
            upstream_status,
            upstream_body: None,
            stage,
            category,
        }
    }

    /// Re-tag the stage
    #[must_use]
    pub fn with_stage(self, stage: Stage) -> Self {
        Self { stage, ..self }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn upstream_status(&self) -> Option<u16> {
        self.upstream_status
    }

    pub fn upstream_body(&self) -> Option<&str> {
        self.upstream_body.as_deref()
    }

    pub const fn stage(&self) -> Stage {
        self.stage
    }

    pub const fn category(&self) -> ErrorCategory {
        self.category
    }

    /// Text shown in the chat in place of a model reply
    pub fn display_text(&self) -> String {
        let mut text = format!(
            "[{}] {}\n\nDetails ({}",
            self.category.title(),
            self.category.remediation(),
            self.stage
        );
        if let Some(status) = self.upstream_status {
            text.push_str(&format!(", HTTP {status}"));
        }
        text.push_str(&format!("): {}", self.message));
        if let Some(body) = &self.upstream_body
            && body != &self.message
        {
            text.push_str(&format!("\nUpstream response: {body}"));
        }
        text
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.category, self.stage, self.message)
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut
pub fn snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_owned(),
    }
}
