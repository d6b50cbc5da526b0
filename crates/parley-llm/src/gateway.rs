//! Gateway orchestration
//!
//! Validation failures are the only errors a caller sees as such. Anything
//! that goes wrong after the vendor was contacted is turned into a reply
//! whose text describes the failure, so the chat UI always has something to
//! show.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::{Stream, StreamExt, stream};
use parley_config::GatewayConfig;
use parley_core::{ApiInterface, ErrorCategory, ErrorInfo, Stage, guard};
use reqwest::Client;
use tokio::time::timeout;

use crate::convert::openai::completion_body;
use crate::error::LlmError;
use crate::protocol::gateway::{Diagnostic, GatewayChatRequest, TargetSpec};
use crate::protocol::openai::{OpenAiResponse, OpenAiStreamChoice, OpenAiStreamChunk, OpenAiStreamDelta, OpenAiUsage};
use crate::provider::{self, CallLimits, EventStream, Provider, ProviderConfig};
use crate::types::{CompletionRequest, CompletionResponse, FinishReason, StreamEvent, Usage, normalize_messages};

/// Frames of a streamed reply
pub type FrameStream = Pin<Box<dyn Stream<Item = Frame> + Send>>;

/// One server-sent event of a streamed reply
#[derive(Debug, Clone)]
pub enum Frame {
    Chunk(Box<OpenAiStreamChunk>),
    /// `data: [DONE]`
    Done,
}

/// Shared gateway state
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    client: Client,
    settings: GatewayConfig,
}

/// A validated chat request bound to its adapter
pub struct PreparedChat {
    provider: Box<dyn Provider>,
    request: CompletionRequest,
}

impl PreparedChat {
    pub fn interface(&self) -> ApiInterface {
        self.provider.interface()
    }

    pub fn model(&self) -> &str {
        &self.request.model
    }
}

impl Gateway {
    pub fn from_config(settings: &GatewayConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .build()
            .map_err(|e| LlmError::Internal(anyhow::Error::new(e).context("failed to build HTTP client")))?;

        Ok(Self {
            inner: Arc::new(GatewayInner {
                client,
                settings: settings.clone(),
            }),
        })
    }

    pub fn settings(&self) -> &GatewayConfig {
        &self.inner.settings
    }

    /// Validate vendor coordinates, normalize the base URL and apply the
    /// outbound target filter
    pub fn resolve(&self, target: &TargetSpec) -> Result<ProviderConfig, LlmError> {
        let interface = match target.api_interface.as_deref().map(str::trim) {
            None | Some("") => ApiInterface::default(),
            Some(name) => name
                .parse()
                .map_err(|e: parley_core::UnknownInterface| LlmError::InvalidRequest(e.to_string()))?,
        };

        if target.api_base_url.trim().is_empty() {
            return Err(LlmError::InvalidRequest("apiBaseUrl is required".to_owned()));
        }
        let api_key = target.api_key.trim();
        if api_key.is_empty() && interface != ApiInterface::Ollama {
            return Err(LlmError::InvalidRequest("apiKey is required".to_owned()));
        }

        let config = ProviderConfig::new(
            &target.api_base_url,
            api_key,
            interface,
            CallLimits::from(self.settings()),
        )?;

        if !self.settings().allow_private_targets {
            guard::check_target(&config.base_url)?;
        }

        Ok(config)
    }

    /// Validate a chat body and pick its adapter
    pub fn prepare(&self, body: GatewayChatRequest) -> Result<PreparedChat, LlmError> {
        let config = self.resolve(&body.target)?;

        let mut request = body.payload;
        if request.model.trim().is_empty() {
            return Err(LlmError::InvalidRequest("payload.model is required".to_owned()));
        }
        if request.messages.is_empty() {
            return Err(LlmError::InvalidRequest("payload.messages must not be empty".to_owned()));
        }
        request.messages = normalize_messages(request.messages);

        Ok(PreparedChat {
            provider: provider::for_config(self.inner.client.clone(), config),
            request,
        })
    }

    /// List models for a target, bounded by the probe timeout
    pub async fn models(&self, target: &TargetSpec) -> Result<Vec<String>, LlmError> {
        let config = self.resolve(target)?;
        let interface = config.interface;
        let provider = provider::for_config(self.inner.client.clone(), config);
        let limit = self.settings().probe_timeout;

        let result = timeout(limit, provider.list_models())
            .await
            .unwrap_or_else(|_| Err(elapsed(limit, Stage::Models)));

        match &result {
            Ok(ids) => tracing::debug!(%interface, count = ids.len(), "listed models"),
            Err(error) => tracing::warn!(%interface, stage = %error.stage(), error = %error, "model listing failed"),
        }
        result
    }

    /// Buffered chat call; a failure comes back classified
    pub async fn complete(&self, chat: &PreparedChat) -> Result<CompletionResponse, ErrorInfo> {
        let limit = self.settings().chat_timeout;
        let result = timeout(limit, provider::complete_with_downgrade(chat.provider.as_ref(), &chat.request))
            .await
            .unwrap_or_else(|_| Err(elapsed(limit, Stage::Chat)));

        result.map_err(|error| self.diagnose(chat.interface(), &error))
    }

    /// Streaming chat call
    ///
    /// Dispatch happens before this returns so that a failure to start is
    /// known up front; its category is returned alongside the frames.
    pub async fn open_stream(&self, chat: PreparedChat) -> (FrameStream, Option<ErrorCategory>) {
        let limit = self.settings().chat_timeout;
        let mut stream_request = chat.request.clone();
        stream_request.stream = true;

        let opened = timeout(limit, provider::stream_with_downgrade(chat.provider.as_ref(), &stream_request))
            .await
            .unwrap_or_else(|_| Err(elapsed(limit, Stage::Stream)));

        let mut relay = Relay {
            events: None,
            emitter: FrameEmitter::new(&chat.request.model),
            pending: VecDeque::new(),
            idle_timeout: self.settings().stream_idle_timeout,
            snippet_chars: self.settings().diagnostic_snippet_chars,
            interface: chat.interface(),
            finish: None,
            closed: false,
        };

        let failure = match opened {
            Ok(events) => {
                relay.events = Some(events);
                None
            }
            Err(error) => Some(relay.fail(&error)),
        };

        let frames = stream::unfold(relay, |mut relay| async move {
            let frame = relay.next_frame().await?;
            Some((frame, relay))
        });

        (Box::pin(frames), failure)
    }

    fn diagnose(&self, interface: ApiInterface, error: &LlmError) -> ErrorInfo {
        diagnose(interface, error, self.settings().diagnostic_snippet_chars)
    }
}

fn diagnose(interface: ApiInterface, error: &LlmError, snippet_chars: usize) -> ErrorInfo {
    let info = error.to_error_info(snippet_chars);
    tracing::warn!(
        %interface,
        stage = %info.stage(),
        category = %info.category(),
        status = info.upstream_status(),
        error = %error,
        "chat call failed, answering with a diagnostic"
    );
    info
}

fn elapsed(limit: Duration, stage: Stage) -> LlmError {
    LlmError::Timeout {
        message: format!("no response within {}s", limit.as_secs()),
        stage,
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn completion_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())
}

/// `chat.completion` body for a successful buffered call
pub fn success_body(response: CompletionResponse) -> OpenAiResponse {
    let mut body = completion_body(
        &completion_id(),
        unix_now(),
        &response.model,
        response.text,
        response.finish_reason,
    );
    body.usage = response.usage.map(OpenAiUsage::from);
    body
}

/// `chat.completion` body carrying a failure description as its content
pub fn diagnostic_body(info: &ErrorInfo, model: &str) -> OpenAiResponse {
    let mut body = completion_body(&completion_id(), unix_now(), model, info.display_text(), FinishReason::Stop);
    body.diagnostic = Some(Diagnostic::from(info));
    body
}

// -- Streaming --

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EmitPhase {
    Idle,
    Emitting,
    Finished,
}

/// Builds `chat.completion.chunk` frames for one reply
///
/// The first frame carries the assistant role and exactly one frame carries
/// a finish reason. Nothing is produced after it.
#[derive(Debug)]
pub struct FrameEmitter {
    id: String,
    created: u64,
    model: String,
    usage: Option<Usage>,
    phase: EmitPhase,
}

impl FrameEmitter {
    pub fn new(model: &str) -> Self {
        Self {
            id: completion_id(),
            created: unix_now(),
            model: model.to_owned(),
            usage: None,
            phase: EmitPhase::Idle,
        }
    }

    pub fn has_content(&self) -> bool {
        self.phase == EmitPhase::Emitting
    }

    pub fn is_finished(&self) -> bool {
        self.phase == EmitPhase::Finished
    }

    /// Remember usage for the terminal frame
    pub fn record_usage(&mut self, usage: Usage) {
        self.usage = Some(usage);
    }

    pub fn content(&mut self, text: String) -> Option<OpenAiStreamChunk> {
        let role = match self.phase {
            EmitPhase::Finished => return None,
            EmitPhase::Idle => Some("assistant"),
            EmitPhase::Emitting => None,
        };
        self.phase = EmitPhase::Emitting;
        Some(self.chunk(role, Some(text), None))
    }

    /// Terminal frame, `None` once finished
    pub fn finish(&mut self, reason: FinishReason, diagnostic: Option<Diagnostic>) -> Option<OpenAiStreamChunk> {
        let role = match self.phase {
            EmitPhase::Finished => return None,
            EmitPhase::Idle => Some("assistant"),
            EmitPhase::Emitting => None,
        };
        self.phase = EmitPhase::Finished;

        let mut chunk = self.chunk(role, None, Some(reason));
        chunk.usage = self.usage.take().map(OpenAiUsage::from);
        chunk.diagnostic = diagnostic;
        Some(chunk)
    }

    /// Diagnostic text as content, then the terminal frame
    pub fn fail(&mut self, info: &ErrorInfo) -> Vec<OpenAiStreamChunk> {
        let separator = if self.has_content() { "\n\n" } else { "" };
        let mut frames = Vec::with_capacity(2);
        frames.extend(self.content(format!("{separator}{}", info.display_text())));
        frames.extend(self.finish(FinishReason::Stop, Some(Diagnostic::from(info))));
        frames
    }

    fn chunk(&self, role: Option<&str>, content: Option<String>, finish: Option<FinishReason>) -> OpenAiStreamChunk {
        OpenAiStreamChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_owned(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![OpenAiStreamChoice {
                index: 0,
                delta: OpenAiStreamDelta {
                    role: role.map(str::to_owned),
                    content,
                },
                finish_reason: finish.map(|r| r.as_str().to_owned()),
            }],
            ..OpenAiStreamChunk::default()
        }
    }
}

/// Pull loop from vendor events to frames
struct Relay {
    events: Option<EventStream>,
    emitter: FrameEmitter,
    pending: VecDeque<Frame>,
    idle_timeout: Duration,
    snippet_chars: usize,
    interface: ApiInterface,
    /// Finish reason seen but not yet emitted; trailing usage may follow
    finish: Option<FinishReason>,
    closed: bool,
}

impl Relay {
    async fn next_frame(&mut self) -> Option<Frame> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Some(frame);
            }
            if self.closed {
                return None;
            }
            let Some(events) = self.events.as_mut() else {
                self.closed = true;
                continue;
            };

            match timeout(self.idle_timeout, events.next()).await {
                Ok(Some(Ok(StreamEvent::Delta(text)))) => {
                    if self.finish.is_none()
                        && let Some(chunk) = self.emitter.content(text)
                    {
                        self.pending.push_back(Frame::Chunk(Box::new(chunk)));
                    }
                }
                Ok(Some(Ok(StreamEvent::Usage(usage)))) => self.emitter.record_usage(usage),
                Ok(Some(Ok(StreamEvent::Finish(reason)))) => {
                    self.finish.get_or_insert(reason);
                }
                Ok(Some(Ok(StreamEvent::Done)) | None) => self.complete(self.finish),
                // Noise after a finished reply does not spoil it
                Ok(Some(Err(_))) | Err(_) if self.finish.is_some() && self.emitter.has_content() => {
                    self.complete(self.finish);
                }
                Ok(Some(Err(error))) => {
                    self.fail(&error);
                }
                Err(_) => {
                    let error = LlmError::Timeout {
                        message: format!("no data from provider for {}s", self.idle_timeout.as_secs()),
                        stage: Stage::Stream,
                    };
                    self.fail(&error);
                }
            }
        }
    }

    /// Vendor ended the reply, with or without a finish reason
    fn complete(&mut self, reason: Option<FinishReason>) {
        if !self.emitter.has_content() {
            let reason = reason.map_or("none", FinishReason::as_str);
            self.fail(&LlmError::EmptyContent(format!("stream ended without text (finish_reason {reason})")));
            return;
        }
        if let Some(chunk) = self.emitter.finish(reason.unwrap_or_default(), None) {
            self.pending.push_back(Frame::Chunk(Box::new(chunk)));
        }
        self.close();
    }

    fn fail(&mut self, error: &LlmError) -> ErrorCategory {
        let info = diagnose(self.interface, error, self.snippet_chars);
        for chunk in self.emitter.fail(&info) {
            self.pending.push_back(Frame::Chunk(Box::new(chunk)));
        }
        self.close();
        info.category()
    }

    /// Drop the vendor stream, closing its connection
    fn close(&mut self) {
        self.events = None;
        self.closed = true;
        self.pending.push_back(Frame::Done);
    }
}
