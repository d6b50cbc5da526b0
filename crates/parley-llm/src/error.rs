use http::StatusCode;
use parley_core::{ErrorInfo, FailureKind, HttpError, Stage, UnsafeTarget};
use thiserror::Error;

use crate::decode::DecodeError;

/// Errors raised by adapters, the decoder and the gateway
///
/// Variants carry the stage they happened in but are never classified here;
/// [`LlmError::to_error_info`] does that at the edge.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Vendor answered with a non-success status
    #[error("upstream returned {status}: {message}")]
    Upstream {
        status: u16,
        /// Vendor's own message when the body had one, the body otherwise
        message: String,
        body: String,
        stage: Stage,
    },

    /// Vendor answered 200 but reported an error inside the payload
    #[error("provider reported an error: {message}")]
    Vendor { message: String, stage: Stage },

    /// No HTTP response (connect, DNS, TLS, reset)
    #[error("request to provider failed: {message}")]
    Transport { message: String, stage: Stage },

    /// Abort signal: deadline elapsed or caller gave up
    #[error("provider did not respond in time: {message}")]
    Timeout { message: String, stage: Stage },

    /// Body or stream payload in an unexpected shape
    #[error("could not decode provider response: {message}")]
    Decode { message: String, stage: Stage },

    /// Vendor answered without any usable text
    #[error("provider returned no text: {0}")]
    EmptyContent(String),

    /// Caller sent a malformed request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Target refused by the outbound filter
    #[error("target refused: {0}")]
    UnsafeTarget(#[from] UnsafeTarget),

    /// Programming error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl LlmError {
    /// Map a `reqwest` failure, keeping timeouts apart from connection errors
    pub fn from_reqwest(error: &reqwest::Error, stage: Stage) -> Self {
        let message = error.to_string();
        if error.is_timeout() {
            Self::Timeout { message, stage }
        } else if error.is_decode() || error.is_body() {
            Self::Decode { message, stage }
        } else {
            Self::Transport { message, stage }
        }
    }

    pub fn decode(message: impl Into<String>, stage: Stage) -> Self {
        Self::Decode {
            message: message.into(),
            stage,
        }
    }

    pub const fn stage(&self) -> Stage {
        match self {
            Self::Upstream { stage, .. }
            | Self::Vendor { stage, .. }
            | Self::Transport { stage, .. }
            | Self::Timeout { stage, .. }
            | Self::Decode { stage, .. } => *stage,
            Self::EmptyContent(_) => Stage::Chat,
            Self::InvalidRequest(_) | Self::UnsafeTarget(_) | Self::Internal(_) => Stage::Validate,
        }
    }

    pub const fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the request was refused before anything was sent out
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::InvalidRequest(_) | Self::UnsafeTarget(_))
    }

    /// Classify into the shared failure taxonomy
    pub fn to_error_info(&self, snippet_chars: usize) -> ErrorInfo {
        let stage = self.stage();
        match self {
            Self::Upstream {
                status, message, body, ..
            } => ErrorInfo::upstream(*status, message.clone(), body, stage, snippet_chars),
            Self::Timeout { .. } => ErrorInfo::new(FailureKind::Aborted, self.to_string(), stage),
            Self::Transport { .. } => ErrorInfo::new(FailureKind::Connection, self.to_string(), stage),
            Self::EmptyContent(_) => ErrorInfo::new(FailureKind::EmptyContent, self.to_string(), stage),
            _ => ErrorInfo::new(FailureKind::Other, self.to_string(), stage),
        }
    }
}

impl From<DecodeError> for LlmError {
    fn from(error: DecodeError) -> Self {
        Self::decode(error.to_string(), Stage::StreamParse)
    }
}

impl HttpError for LlmError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::UnsafeTarget(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { status, .. } => StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Vendor { .. } | Self::Transport { .. } | Self::Decode { .. } | Self::EmptyContent(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::UnsafeTarget(_) => "unsafe_target_error",
            Self::Upstream { .. } | Self::Vendor { .. } => "upstream_error",
            Self::Transport { .. } => "network_error",
            Self::Timeout { .. } => "timeout_error",
            Self::Decode { .. } | Self::EmptyContent(_) => "upstream_decode_error",
            Self::Internal(_) => "internal_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "an internal error occurred".to_owned(),
            other => other.to_string(),
        }
    }

    fn error_body(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "message": self.client_message(),
                "type": self.error_type(),
                "stage": self.stage(),
                "upstream_status": self.upstream_status(),
            }
        })
    }
}

/// Best-effort extraction of the vendor's own message from an error body
pub fn vendor_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error").unwrap_or(&value);

    let message = match error {
        serde_json::Value::String(text) => Some(text.as_str()),
        other => other
            .get("message")
            .or_else(|| other.get("msg"))
            .or_else(|| other.get("detail"))
            .and_then(serde_json::Value::as_str),
    }?;

    let message = message.trim();
    (!message.is_empty()).then(|| message.to_owned())
}

#[cfg(test)]
mod tests {
    use parley_core::ErrorCategory;

    use super::*;

    #[test]
    fn vendor_message_shapes() {
        assert_eq!(
            vendor_message(r#"{"error":{"message":"Invalid API key","type":"auth"}}"#).as_deref(),
            Some("Invalid API key")
        );
        assert_eq!(vendor_message(r#"{"error":"model not found"}"#).as_deref(), Some("model not found"));
        assert_eq!(vendor_message(r#"{"detail":"Not Found"}"#).as_deref(), Some("Not Found"));
        assert_eq!(vendor_message("<html>502</html>"), None);
    }

    #[test]
    fn upstream_status_is_propagated() {
        let error = LlmError::Upstream {
            status: 401,
            message: "bad key".to_owned(),
            body: String::new(),
            stage: Stage::Models,
        };
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(error.to_error_info(600).category(), ErrorCategory::Unauthorized);
    }

    #[test]
    fn vendor_client_error_is_not_a_server_error() {
        let error = LlmError::Upstream {
            status: 400,
            message: "Invalid value for 'temperature': must be <= 2".to_owned(),
            body: r#"{"error":{"message":"Invalid value for 'temperature': must be <= 2"}}"#.to_owned(),
            stage: Stage::Chat,
        };
        let info = error.to_error_info(600);
        assert_eq!(info.category(), ErrorCategory::Unknown);
        assert_eq!(info.message(), "Invalid value for 'temperature': must be <= 2");
        assert_eq!(info.upstream_status(), Some(400));
    }

    #[test]
    fn timeout_maps_to_504_and_timeout_category() {
        let error = LlmError::Timeout {
            message: "deadline".to_owned(),
            stage: Stage::Chat,
        };
        assert_eq!(error.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(error.to_error_info(600).category(), ErrorCategory::Timeout);
    }

    #[test]
    fn rejection_body_carries_stage() {
        let error = LlmError::InvalidRequest("apiBaseUrl is required".to_owned());
        let body = error.error_body();
        assert_eq!(body["error"]["type"], "invalid_request_error");
        assert_eq!(body["error"]["stage"], "validate");
    }
}
