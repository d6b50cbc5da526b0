//! HTTP server assembly for the Parley gateway

mod cors;

use std::net::SocketAddr;

use axum::Router;
use axum::response::IntoResponse;
use http::StatusCode;
use parley_config::{Config, DEFAULT_LISTEN_ADDRESS};
use parley_llm::{Gateway, gateway_router};
use tower_http::trace::TraceLayer;

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
}

impl Server {
    /// Build the server from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the listen address is invalid or the outbound
    /// HTTP client cannot be built
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let listen_address = match config.server.listen_address {
            Some(address) => address,
            None => DEFAULT_LISTEN_ADDRESS.parse()?,
        };

        if config.gateway.allow_private_targets {
            tracing::warn!("gateway.allow_private_targets is set, private and loopback targets are reachable");
        }

        let gateway = Gateway::from_config(&config.gateway)?;
        let mut app = gateway_router(gateway);

        if config.server.health.enabled {
            app = app.route(&config.server.health.path, axum::routing::get(health));
        }

        app = app.layer(TraceLayer::new_for_http());

        if let Some(ref cors_config) = config.server.cors {
            app = app.layer(cors::cors_layer(cors_config));
        }

        Ok(Self {
            router: app,
            listen_address,
        })
    }

    /// Get the configured listen address
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
