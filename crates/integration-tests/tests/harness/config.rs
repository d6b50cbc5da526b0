//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;
use std::time::Duration;

use parley_config::{Config, CorsConfig, GatewayConfig, HealthConfig, ServerConfig};

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Minimal config; mock vendors live on loopback so the address guard is off
    pub fn new() -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    health: HealthConfig::default(),
                    cors: None,
                },
                gateway: GatewayConfig {
                    allow_private_targets: true,
                    ..GatewayConfig::default()
                },
                ..Config::default()
            },
        }
    }

    /// Re-enable the private address check
    pub fn with_target_guard(mut self) -> Self {
        self.config.gateway.allow_private_targets = false;
        self
    }

    pub fn with_chat_timeout(mut self, limit: Duration) -> Self {
        self.config.gateway.chat_timeout = limit;
        self
    }

    pub fn with_stream_idle_timeout(mut self, limit: Duration) -> Self {
        self.config.gateway.stream_idle_timeout = limit;
        self
    }

    pub fn with_cors(mut self, config: CorsConfig) -> Self {
        self.config.server.cors = Some(config);
        self
    }

    pub fn without_health(mut self) -> Self {
        self.config.server.health.enabled = false;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
