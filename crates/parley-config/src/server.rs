use std::net::SocketAddr;

use serde::Deserialize;

use crate::cors::CorsConfig;

/// Default bind address when neither config nor CLI sets one
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:3000";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub listen_address: Option<SocketAddr>,
    #[serde(default)]
    pub health: HealthConfig,
    /// Browser access; the chat app is usually served from another origin
    #[serde(default)]
    pub cors: Option<CorsConfig>,
}

/// Liveness endpoint
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/health".to_owned(),
        }
    }
}
