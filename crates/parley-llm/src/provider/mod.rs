//! Provider trait and the four vendor adapters

pub mod anthropic;
pub mod google;
pub mod ollama;
pub mod openai;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use parley_config::GatewayConfig;
use parley_core::{ApiInterface, Stage, normalize_base_url};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::SecretString;
use url::Url;

use crate::convert;
use crate::error::{LlmError, vendor_message};
use crate::types::{CompletionRequest, CompletionResponse, StreamEvent};

/// Canonical events decoded from a vendor stream
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

/// Per-call limits taken from the gateway configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallLimits {
    pub max_stream_line_bytes: usize,
    pub anthropic_max_tokens: u32,
}

impl Default for CallLimits {
    fn default() -> Self {
        Self::from(&GatewayConfig::default())
    }
}

impl From<&GatewayConfig> for CallLimits {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            max_stream_line_bytes: config.max_stream_line_bytes,
            anthropic_max_tokens: config.anthropic_max_tokens,
        }
    }
}

/// Vendor coordinates for a single request
///
/// Built per request and never cached; only the `reqwest` pool is shared.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Normalized root, e.g. `https://api.openai.com/v1`
    pub base_url: Url,
    pub api_key: SecretString,
    pub interface: ApiInterface,
    pub limits: CallLimits,
}

impl ProviderConfig {
    /// Normalize `raw_base_url` for `interface` and parse it
    pub fn new(
        raw_base_url: &str,
        api_key: &str,
        interface: ApiInterface,
        limits: CallLimits,
    ) -> Result<Self, LlmError> {
        let normalized = normalize_base_url(raw_base_url, interface);
        let base_url = Url::parse(&normalized)
            .map_err(|e| LlmError::InvalidRequest(format!("apiBaseUrl is not a valid URL ({e}): {normalized}")))?;

        Ok(Self {
            base_url,
            api_key: SecretString::from(api_key.to_owned()),
            interface,
            limits,
        })
    }

    /// `{base}/{path}`, keeping any query the base URL carries
    pub fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        // http(s) URLs always have a path
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(path.split('/'));
        }
        url
    }
}

/// One vendor wire protocol
#[async_trait]
pub trait Provider: Send + Sync {
    fn interface(&self) -> ApiInterface;

    /// Buffered chat call
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Streaming chat call
    ///
    /// Returns once the vendor accepted the request; failures after that
    /// arrive as items of the stream.
    async fn complete_stream(&self, request: &CompletionRequest) -> Result<EventStream, LlmError>;

    /// Model ids the key can use
    async fn list_models(&self) -> Result<Vec<String>, LlmError>;
}

/// Adapter for `config.interface`
pub fn for_config(client: Client, config: ProviderConfig) -> Box<dyn Provider> {
    match config.interface {
        ApiInterface::OpenaiCompatible => Box::new(openai::OpenAiProvider::new(client, config)),
        ApiInterface::GeminiNative => Box::new(google::GoogleProvider::new(client, config)),
        ApiInterface::AnthropicNative => Box::new(anthropic::AnthropicProvider::new(client, config)),
        ApiInterface::Ollama => Box::new(ollama::OllamaProvider::new(client, config)),
    }
}

/// Buffered call, retried once without images when an OpenAI-compatible
/// vendor rejects multimodal input with 400
///
/// When the retry fails too, the original error is returned.
pub async fn complete_with_downgrade(
    provider: &dyn Provider,
    request: &CompletionRequest,
) -> Result<CompletionResponse, LlmError> {
    match provider.complete(request).await {
        Err(error) if should_downgrade(provider.interface(), request, &error) => {
            tracing::info!(interface = %provider.interface(), "vendor rejected image input, retrying as text");
            provider.complete(&request.without_images()).await.map_err(|retry| {
                tracing::debug!(error = %retry, "text-only retry failed");
                error
            })
        }
        other => other,
    }
}

/// Streaming counterpart of [`complete_with_downgrade`]
pub async fn stream_with_downgrade(provider: &dyn Provider, request: &CompletionRequest) -> Result<EventStream, LlmError> {
    match provider.complete_stream(request).await {
        Err(error) if should_downgrade(provider.interface(), request, &error) => {
            tracing::info!(interface = %provider.interface(), "vendor rejected image input, retrying as text");
            provider.complete_stream(&request.without_images()).await.map_err(|retry| {
                tracing::debug!(error = %retry, "text-only retry failed");
                error
            })
        }
        other => other,
    }
}

fn should_downgrade(interface: ApiInterface, request: &CompletionRequest, error: &LlmError) -> bool {
    interface == ApiInterface::OpenaiCompatible && request.has_images() && error.upstream_status() == Some(400)
}

// -- Shared plumbing --

/// Send and turn a non-success status into [`LlmError::Upstream`]
async fn send(builder: RequestBuilder, interface: ApiInterface, stage: Stage) -> Result<Response, LlmError> {
    let response = builder.send().await.map_err(|e| {
        tracing::warn!(%interface, %stage, error = %e, "provider request failed");
        LlmError::from_reqwest(&e, stage)
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!(%interface, %stage, error = %e, "failed to read error body");
            String::new()
        }
    };
    tracing::warn!(%interface, %stage, status = status.as_u16(), "provider returned error status");

    Err(upstream_error(status, body, stage))
}

fn upstream_error(status: StatusCode, body: String, stage: Stage) -> LlmError {
    let message = vendor_message(&body).unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            format!("{status} without a readable body")
        } else {
            parley_core::snippet(trimmed, 200)
        }
    });
    LlmError::Upstream {
        status: status.as_u16(),
        message,
        body,
        stage,
    }
}

async fn read_body(response: Response, stage: Stage) -> Result<String, LlmError> {
    response.text().await.map_err(|e| LlmError::from_reqwest(&e, stage))
}

/// Send a chat body and parse the buffered reply
async fn buffered_chat(
    builder: RequestBuilder,
    interface: ApiInterface,
    model: &str,
) -> Result<CompletionResponse, LlmError> {
    let response = send(builder, interface, Stage::Chat).await?;
    let body = read_body(response, Stage::Chat).await?;
    convert::parse_response(interface, &body, model)
}

/// Send a model listing request and parse the ids
async fn model_listing(builder: RequestBuilder, interface: ApiInterface) -> Result<Vec<String>, LlmError> {
    let response = send(builder, interface, Stage::Models).await?;
    let body = read_body(response, Stage::Models).await?;
    convert::parse_models(interface, &body)
}
