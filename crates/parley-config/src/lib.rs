//! Parley configuration
//!
//! A single TOML file with `[server]`, `[gateway]` and `[telemetry]`
//! sections. Every section is optional; an empty file is a valid config.

#![allow(clippy::must_use_candidate)]

pub mod cors;
mod env;
pub mod gateway;
mod loader;
pub mod server;
pub mod telemetry;

use serde::Deserialize;

pub use cors::*;
pub use env::ExpandError;
pub use gateway::GatewayConfig;
pub use server::*;
pub use telemetry::{LogFormat, TelemetryConfig};

/// Top-level configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
