//! Failure taxonomy
//!
//! Maps a raw failure (transport kind, HTTP status, vendor wording) to a
//! fixed category. Rules are checked in a fixed priority order and the first
//! match wins, so an aborted request whose message also mentions the network
//! is still a timeout.

use std::fmt;
use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Category of a failed LLM call, in classification priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Abort signal fired (idle timeout or caller cancellation)
    Timeout,
    /// Connection-level failure, CORS or mixed content
    NetworkOrCors,
    /// Prompt plus output exceeds the model's context window
    ContextLengthExceeded,
    /// Model name unknown to the vendor
    ModelNotFound,
    /// Missing or invalid API key
    Unauthorized,
    /// Key valid but not permitted
    Forbidden,
    /// Rate limit or exhausted quota/balance
    RateLimitedOrQuota,
    /// Vendor or an intermediate gateway failed
    UpstreamServerError,
    /// Successful response without usable text
    EmptyOrUnsupportedContent,
    /// Nothing matched
    Unknown,
}

impl ErrorCategory {
    /// Machine-readable name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::NetworkOrCors => "network_or_cors",
            Self::ContextLengthExceeded => "context_length_exceeded",
            Self::ModelNotFound => "model_not_found",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::RateLimitedOrQuota => "rate_limited_or_quota",
            Self::UpstreamServerError => "upstream_server_error",
            Self::EmptyOrUnsupportedContent => "empty_or_unsupported_content",
            Self::Unknown => "unknown",
        }
    }

    /// Short human-readable headline
    pub const fn title(self) -> &'static str {
        match self {
            Self::Timeout => "Request timed out",
            Self::NetworkOrCors => "Network error",
            Self::ContextLengthExceeded => "Conversation too long",
            Self::ModelNotFound => "Model not found",
            Self::Unauthorized => "API key rejected",
            Self::Forbidden => "Access denied",
            Self::RateLimitedOrQuota => "Rate limited or out of quota",
            Self::UpstreamServerError => "Provider server error",
            Self::EmptyOrUnsupportedContent => "Empty reply",
            Self::Unknown => "Request failed",
        }
    }

    /// Fixed remediation advice shown next to the vendor's own message
    pub const fn remediation(self) -> &'static str {
        match self {
            Self::Timeout => {
                "The model did not answer in time. Try again, pick a faster model, or lower the maximum reply length."
            }
            Self::NetworkOrCors => {
                "The provider could not be reached. Check the API address, your connection, and whether the \
                 provider allows browser requests; an https page cannot call a plain http address directly."
            }
            Self::ContextLengthExceeded => {
                "The conversation plus the requested reply exceeds the model's context window. Shorten the \
                 history or memory, or lower the maximum reply tokens."
            }
            Self::ModelNotFound => {
                "The provider does not know this model name. Refresh the model list and pick one it offers."
            }
            Self::Unauthorized => "The API key is missing, mistyped, or revoked. Paste the key again.",
            Self::Forbidden => {
                "The key is valid but not allowed to use this model or region. Check the account's permissions."
            }
            Self::RateLimitedOrQuota => {
                "Too many requests or the account balance/quota is exhausted. Wait a moment or top up the account."
            }
            Self::UpstreamServerError => {
                "The provider or a relay in front of it failed. This is usually temporary; retry shortly."
            }
            Self::EmptyOrUnsupportedContent => {
                "The model answered without any text (possibly only a tool call or a filtered reply). Retry or \
                 rephrase the last message."
            }
            Self::Unknown => "An unexpected error occurred. The provider's message is shown below.",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of failure happened, as far as the transport knows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Abort signal fired: timeout or caller disconnect
    Aborted,
    /// No HTTP response at all (connect, DNS, TLS, reset)
    Connection,
    /// Vendor answered with a non-success status
    Http,
    /// Vendor answered successfully but without usable text
    EmptyContent,
    /// Anything else (malformed body, broken stream)
    Other,
}

/// Input to the classifier
#[derive(Debug, Clone, Copy)]
pub struct RawFailure<'a> {
    /// Transport-level kind
    pub kind: FailureKind,
    /// HTTP status, when the vendor answered
    pub status: Option<u16>,
    /// Error message and/or vendor body
    pub message: &'a str,
}

fn pattern(source: &str) -> Regex {
    RegexBuilder::new(source)
        .case_insensitive(true)
        .build()
        .expect("must be valid regex")
}

macro_rules! patterns {
    ($($name:ident => $source:expr;)*) => {
        $(
            fn $name() -> &'static Regex {
                static RE: OnceLock<Regex> = OnceLock::new();
                RE.get_or_init(|| pattern($source))
            }
        )*
    };
}

patterns! {
    timeout_words => r"aborterror|timed? ?out|deadline exceeded|请求超时";
    network_words => r"failed to fetch|networkerror|network error|cors|mixed content|connection (refused|reset|closed)|error sending request|dns error|tls|certificate|econnreset|econnrefused|网络错误";
    context_words => r"context.?length|context.?window|maximum context|too many tokens|token limit|tokens? exceed|exceeds? the (maximum|max)|prompt is too long|input is too long|上下文.{0,6}(长度|过长|超)|超出.{0,6}(长度|限制)";
    model_words => r"model.{0,40}(not found|does not exist|not exist|is not supported|unavailable)|no such model|model_not_found|unknown model|模型不存在";
    auth_words => r"invalid.{0,20}(api.?key|token|x-api-key)|incorrect api key|api key not valid|unauthenticated|unauthorized|authentication_error|密钥无效";
    forbidden_words => r"forbidden|permission.?denied|access denied|not allowed|unsupported (country|region)|无权限";
    quota_words => r"rate.?limit|quota|resource.?exhausted|too many requests|exceeded your current|insufficient.?(balance|funds)|余额不足|额度|限流";
    server_words => r"bad gateway|gateway time-?out|service unavailable|overloaded|internal server error|upstream (connect|request|timed? ?out)";
}

/// Classify a failure. First match in priority order wins.
pub fn classify(raw: &RawFailure<'_>) -> ErrorCategory {
    let text = raw.message;
    let status = raw.status.unwrap_or(0);
    let is_http = raw.kind == FailureKind::Http;

    if raw.kind == FailureKind::Aborted || (!is_http && timeout_words().is_match(text)) {
        return ErrorCategory::Timeout;
    }
    if raw.kind == FailureKind::Connection || (!is_http && network_words().is_match(text)) {
        return ErrorCategory::NetworkOrCors;
    }
    if context_words().is_match(text) {
        return ErrorCategory::ContextLengthExceeded;
    }
    if status == 404 || model_words().is_match(text) {
        return ErrorCategory::ModelNotFound;
    }
    if status == 401 || auth_words().is_match(text) {
        return ErrorCategory::Unauthorized;
    }
    if status == 403 || forbidden_words().is_match(text) {
        return ErrorCategory::Forbidden;
    }
    if status == 429 || quota_words().is_match(text) {
        return ErrorCategory::RateLimitedOrQuota;
    }
    if status >= 500 || server_words().is_match(text) {
        return ErrorCategory::UpstreamServerError;
    }
    if raw.kind == FailureKind::EmptyContent {
        return ErrorCategory::EmptyOrUnsupportedContent;
    }
    ErrorCategory::Unknown
}
