//! Test server wrapper that starts the gateway on a random port

use std::net::SocketAddr;

use parley_config::Config;
use parley_server::Server;
use tokio_util::sync::CancellationToken;

/// A running test server instance
pub struct TestServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    client: reqwest::Client,
}

impl TestServer {
    /// Start a test server with the given configuration
    ///
    /// Binds to port 0 for automatic port assignment
    pub async fn start(config: Config) -> anyhow::Result<Self> {
        let server = Server::new(&config)?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        tokio::spawn(async move {
            axum::serve(listener, server.into_router())
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        let client = reqwest::Client::new();

        Ok(Self { addr, shutdown, client })
    }

    /// Absolute URL of `path` on the running server
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Root URL, as the chat client takes it
    pub fn root(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// `POST /gateway/chat` with a JSON body
    pub async fn chat(&self, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url("/gateway/chat"))
            .json(body)
            .send()
            .await
            .expect("gateway reachable")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Gateway chat body for one target and a single user message
pub fn chat_body(base_url: &str, interface: &str, stream: bool) -> serde_json::Value {
    serde_json::json!({
        "apiBaseUrl": base_url,
        "apiKey": "sk-test",
        "apiInterface": interface,
        "payload": {
            "model": "mock-model",
            "messages": [
                {"role": "system", "content": "You are a friendly neighbour."},
                {"role": "user", "content": "Say hello"}
            ],
            "stream": stream
        }
    })
}

/// `data:` payloads of an SSE body, in order
pub fn sse_data(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.trim().to_owned())
        .filter(|data| !data.is_empty())
        .collect()
}
