//! Shared building blocks for the Parley gateway
//!
//! Vendor interface names, base URL normalization, the outbound target
//! filter and the failure taxonomy used by both the gateway and the client.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod base_url;
pub mod classify;
mod error;
pub mod guard;
mod info;
mod interface;

pub use base_url::normalize_base_url;
pub use classify::{ErrorCategory, FailureKind};
pub use error::HttpError;
pub use guard::UnsafeTarget;
pub use info::{ErrorInfo, Stage, snippet};
pub use interface::{ApiInterface, UnknownInterface};
