//! OpenAI-compatible adapter

use async_trait::async_trait;
use parley_core::{ApiInterface, Stage};
use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;

use super::{EventStream, Provider, ProviderConfig};
use crate::convert;
use crate::decode::response_events;
use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse};

/// `OpenAI` chat completions and compatible APIs, Bearer auth
pub struct OpenAiProvider {
    client: Client,
    config: ProviderConfig,
}

impl OpenAiProvider {
    pub const fn new(client: Client, config: ProviderConfig) -> Self {
        Self { client, config }
    }

    fn chat(&self, request: &CompletionRequest, stream: bool) -> RequestBuilder {
        let mut body = convert::build_request(self.interface(), request, self.config.limits.anthropic_max_tokens);
        body.set_stream(stream);

        self.client
            .post(self.config.endpoint("chat/completions"))
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&body)
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn interface(&self) -> ApiInterface {
        ApiInterface::OpenaiCompatible
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
        let builder = self
            .client
            .get(self.config.endpoint("models"))
            .bearer_auth(self.config.api_key.expose_secret());
        super::model_listing(builder, self.interface()).await
    }
}
