use parley_core::ErrorInfo;

/// Client-specific result type
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors from the chat client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Every planned strategy failed; carries the first, classified failure
    #[error("{0}")]
    Call(ErrorInfo),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// Classified failure, when the error came from a call
    pub const fn info(&self) -> Option<&ErrorInfo> {
        match self {
            Self::Call(info) => Some(info),
            Self::Config(_) => None,
        }
    }

    /// Text to show in the chat in place of a reply
    pub fn display_text(&self) -> String {
        match self {
            Self::Call(info) => info.display_text(),
            Self::Config(_) => self.to_string(),
        }
    }
}

impl From<ErrorInfo> for ClientError {
    fn from(info: ErrorInfo) -> Self {
        Self::Call(info)
    }
}
