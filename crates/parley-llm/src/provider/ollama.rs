//! Ollama native adapter

use async_trait::async_trait;
use parley_core::{ApiInterface, Stage};
use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;

use super::{EventStream, Provider, ProviderConfig};
use crate::convert;
use crate::decode::response_events;
use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse};

/// Local or LAN Ollama; a key is only sent when one was given (reverse proxies)
pub struct OllamaProvider {
    client: Client,
    config: ProviderConfig,
}

impl OllamaProvider {
    pub const fn new(client: Client, config: ProviderConfig) -> Self {
        Self { client, config }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let key = self.config.api_key.expose_secret();
        if key.is_empty() { builder } else { builder.bearer_auth(key) }
    }

    fn chat(&self, request: &CompletionRequest, stream: bool) -> RequestBuilder {
        // Ollama streams unless told otherwise, so the flag is always sent
        let mut body = convert::build_request(self.interface(), request, self.config.limits.anthropic_max_tokens);
        body.set_stream(stream);
        self.authorized(self.client.post(self.config.endpoint("chat")).json(&body))
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn interface(&self) -> ApiInterface {
        ApiInterface::Ollama
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        super::buffered_chat(self.chat(request, false), self.interface(), &request.model).await
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<EventStream, LlmError> {
        let response = super::send(self.chat(request, true), self.interface(), Stage::Stream).await?;
        Ok(response_events(
            response,
            self.interface(),
            self.config.limits.max_stream_line_bytes,
        ))
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let builder = self.authorized(self.client.get(self.config.endpoint("tags")));
        super::model_listing(builder, self.interface()).await
    }
}
