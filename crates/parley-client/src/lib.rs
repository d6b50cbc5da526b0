//! Chat call orchestration for Parley
//!
//! Sends a conversation through the gateway or straight to the vendor,
//! bounds every call with a timeout and a cancellation token, and repairs
//! replies that were cut off. Failures that remain are classified so the
//! caller can show them in place of a reply.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod client;
pub mod continuation;
mod direct;
pub mod error;
mod options;
mod proxy;
pub mod strategy;

pub use client::{ChatClient, ChatTarget, Reply};
pub use continuation::{HeuristicTruncation, TruncationPolicy, merge_overlap};
pub use error::{ClientError, Result};
pub use options::{ClientOptions, Deployment};
pub use strategy::Strategy;
pub use tokio_util::sync::CancellationToken;
