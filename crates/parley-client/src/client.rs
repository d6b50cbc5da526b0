use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parley_core::{ApiInterface, ErrorInfo, FailureKind, Stage};
use parley_llm::protocol::gateway::{Diagnostic, TargetSpec};
use parley_llm::provider::{self, ProviderConfig};
use parley_llm::types::{CompletionRequest, FinishReason, Message, Role, normalize_messages};
use tokio_util::sync::CancellationToken;

use crate::continuation::{HeuristicTruncation, TruncationPolicy, merge_overlap};
use crate::error::{ClientError, Result};
use crate::options::ClientOptions;
use crate::strategy::{self, Strategy};
use crate::{direct, proxy};

/// Vendor coordinates chosen by the user
#[derive(Clone)]
pub struct ChatTarget {
    pub base_url: String,
    pub api_key: String,
    pub interface: ApiInterface,
}

impl fmt::Debug for ChatTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatTarget")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("interface", &self.interface)
            .finish()
    }
}

impl ChatTarget {
    fn spec(&self) -> TargetSpec {
        TargetSpec {
            api_base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            api_interface: Some(self.interface.as_str().to_owned()),
        }
    }
}

/// Assembled reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub finish_reason: Option<FinishReason>,
    /// Set when the text describes a gateway-side failure
    pub diagnostic: Option<Diagnostic>,
    /// Whether a continuation call was merged in
    pub continued: bool,
}

/// Chat client choosing between the gateway and a direct vendor call
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    options: ClientOptions,
    policy: Arc<dyn TruncationPolicy>,
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    pub fn new(options: ClientOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            options,
            policy: Arc::new(HeuristicTruncation::default()),
        })
    }

    /// Replace the truncation heuristics
    #[must_use]
    pub fn with_policy(mut self, policy: impl TruncationPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub const fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Send a conversation and return the assembled reply
    ///
    /// A reply that looks cut off gets exactly one continuation call. If that
    /// call fails the first text is returned as is.
    pub async fn chat(
        &self,
        target: &ChatTarget,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<Reply> {
        let mut request = request.clone();
        request.messages = normalize_messages(request.messages);

        let strategies = strategy::plan(&self.options, &target.base_url);
        let (strategy, mut reply) =
            strategy::first_success(&strategies, |s| self.attempt(s, target, &request, cancel)).await?;

        if reply.diagnostic.is_some() || !self.policy.needs_continuation(&reply.text, reply.finish_reason) {
            return Ok(reply);
        }

        let mut follow_up = request.clone();
        follow_up.messages.push(Message::text(Role::Assistant, reply.text.clone()));
        follow_up
            .messages
            .push(Message::text(Role::User, self.policy.continuation_prompt()));

        tracing::debug!(%strategy, chars = reply.text.chars().count(), "reply looks truncated, continuing once");
        match self.attempt(strategy, target, &follow_up, cancel).await {
            Ok(next) if next.diagnostic.is_none() => {
                reply.text = merge_overlap(&reply.text, &next.text);
                reply.finish_reason = next.finish_reason;
                reply.continued = true;
            }
            Ok(_) => tracing::debug!("continuation answered with a diagnostic, keeping first reply"),
            Err(info) => {
                let info = info.with_stage(Stage::Continuation);
                tracing::debug!(category = %info.category(), error = %info, "continuation failed, keeping first reply");
            }
        }

        Ok(reply)
    }

    /// Like [`ChatClient::chat`], but a failure becomes displayable text
    pub async fn send(&self, target: &ChatTarget, request: &CompletionRequest, cancel: &CancellationToken) -> String {
        match self.chat(target, request, cancel).await {
            Ok(reply) => reply.text,
            Err(error) => error.display_text(),
        }
    }

    /// Connectivity check: list the models the key can use
    pub async fn probe(&self, target: &ChatTarget, cancel: &CancellationToken) -> Result<Vec<String>> {
        let strategies = strategy::plan(&self.options, &target.base_url);
        let limit = self.options.probe_timeout;
        let snippet_chars = self.options.snippet_chars;

        let (_, models) = strategy::first_success(&strategies, |strategy| {
            cancellable(cancel, strategy.stage(), async move {
                match (strategy, &self.options.proxy_url) {
                    (Strategy::Proxy, Some(proxy_url)) => {
                        proxy::models(&self.http, proxy_url, &target.spec(), limit, snippet_chars).await
                    }
                    _ => {
                        let provider = self.provider(target)?;
                        direct::models(provider.as_ref(), limit, snippet_chars).await
                    }
                }
            })
        })
        .await?;

        Ok(models)
    }

    async fn attempt(
        &self,
        strategy: Strategy,
        target: &ChatTarget,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> std::result::Result<Reply, ErrorInfo> {
        let limit = self.options.chat_timeout;
        let snippet_chars = self.options.snippet_chars;
        let stream = self.options.stream;

        cancellable(cancel, strategy.stage(), async move {
            match (strategy, &self.options.proxy_url) {
                (Strategy::Proxy, Some(proxy_url)) => {
                    proxy::chat(&self.http, proxy_url, target.spec(), request, stream, limit, snippet_chars).await
                }
                _ => {
                    let provider = self.provider(target)?;
                    direct::chat(provider.as_ref(), request, stream, limit, snippet_chars).await
                }
            }
        })
        .await
    }

    fn provider(&self, target: &ChatTarget) -> std::result::Result<Box<dyn provider::Provider>, ErrorInfo> {
        let config = ProviderConfig::new(&target.base_url, target.api_key.trim(), target.interface, self.options.limits)
            .map_err(|e| e.to_error_info(self.options.snippet_chars).with_stage(Stage::Direct))?;
        Ok(provider::for_config(self.http.clone(), config))
    }
}

/// Race `call` against the caller's cancellation
async fn cancellable<T>(
    cancel: &CancellationToken,
    stage: Stage,
    call: impl Future<Output = std::result::Result<T, ErrorInfo>>,
) -> std::result::Result<T, ErrorInfo> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ErrorInfo::new(FailureKind::Aborted, "request was cancelled", stage)),
        result = call => result,
    }
}
