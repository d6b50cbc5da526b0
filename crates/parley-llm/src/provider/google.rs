//! Gemini native adapter

use async_trait::async_trait;
use parley_core::{ApiInterface, Stage};
use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;
use url::Url;

use super::{EventStream, Provider, ProviderConfig};
use crate::convert;
use crate::decode::response_events;
use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Generative Language `generateContent`, key in `x-goog-api-key`
pub struct GoogleProvider {
    client: Client,
    config: ProviderConfig,
}

impl GoogleProvider {
    pub const fn new(client: Client, config: ProviderConfig) -> Self {
        Self { client, config }
    }

    /// `{base}/models/{model}:{method}`; the `models/` prefix may already be
    /// part of the id
    fn model_url(&self, model: &str, method: &str) -> Url {
        let model = model.trim().trim_start_matches("models/");
        self.config.endpoint(&format!("models/{model}:{method}"))
    }

    fn chat(&self, request: &CompletionRequest, method: &str) -> RequestBuilder {
        let body = convert::build_request(self.interface(), request, self.config.limits.anthropic_max_tokens);

        self.client
            .post(self.model_url(&request.model, method))
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .json(&body)
    }
}

#[async_trait]
impl Provider for GoogleProvider {
    fn interface(&self) -> ApiInterface {
        ApiInterface::GeminiNative
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        super::buffered_chat(self.chat(request, "generateContent"), self.interface(), &request.model).await
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<EventStream, LlmError> {
        // Without alt=sse the body is a JSON array; the decoder copes with both
        let builder = self.chat(request, "streamGenerateContent").query(&[("alt", "sse")]);
        let response = super::send(builder, self.interface(), Stage::Stream).await?;
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
            .query(&[("pageSize", "1000")])
            .header(API_KEY_HEADER, self.config.api_key.expose_secret());
        super::model_listing(builder, self.interface()).await
    }
}
