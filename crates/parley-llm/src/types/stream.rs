use super::response::{FinishReason, Usage};

/// One decoded event of a vendor stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental assistant text
    Delta(String),
    /// Vendor reported why generation stopped
    Finish(FinishReason),
    /// Token usage, usually near the end
    Usage(Usage),
    /// Vendor stream ended
    Done,
}
