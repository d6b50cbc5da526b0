//! Anthropic Messages adapter
//!
//! Served buffered only. A stream request makes a buffered call and replays
//! the reply as events.

use async_trait::async_trait;
use futures_util::stream;
use parley_core::ApiInterface;
use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;

use super::{EventStream, Provider, ProviderConfig};
use crate::convert;
use crate::error::LlmError;
use crate::protocol::anthropic::{API_VERSION, VERSION_HEADER};
use crate::types::{CompletionRequest, CompletionResponse, StreamEvent};

const API_KEY_HEADER: &str = "x-api-key";

pub struct AnthropicProvider {
    client: Client,
    config: ProviderConfig,
}

impl AnthropicProvider {
    pub const fn new(client: Client, config: ProviderConfig) -> Self {
        Self { client, config }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .header(VERSION_HEADER, API_VERSION)
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn interface(&self) -> ApiInterface {
        ApiInterface::AnthropicNative
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = convert::build_request(self.interface(), request, self.config.limits.anthropic_max_tokens);
        let builder = self.authorized(self.client.post(self.config.endpoint("messages")).json(&body));
        super::buffered_chat(builder, self.interface(), &request.model).await
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<EventStream, LlmError> {
        let response = self.complete(request).await?;
        let events = convert::anthropic::replay(&response)
            .into_iter()
            .chain(std::iter::once(StreamEvent::Done))
            .map(Ok);
        Ok(Box::pin(stream::iter(events)))
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let builder = self.authorized(self.client.get(self.config.endpoint("models")));
        super::model_listing(builder, self.interface()).await
    }
}
