//! Calls through the gateway's HTTP endpoints

use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::StreamExt;
use parley_core::{ErrorInfo, FailureKind, Stage};
use parley_llm::convert::openai::map_finish_reason;
use parley_llm::error::vendor_message;
use parley_llm::protocol::gateway::{GatewayChatRequest, ModelList, TargetSpec};
use parley_llm::protocol::openai::{OpenAiResponse, OpenAiStreamChunk};
use parley_llm::types::{CompletionRequest, FinishReason};
use reqwest::header::ACCEPT;
use tokio::time::timeout;
use url::Url;

use crate::client::Reply;

const CHAT_PATH: &str = "gateway/chat";
const MODELS_PATH: &str = "gateway/models";

fn make_url(proxy_url: &Url, path: &str) -> Url {
    let mut url = proxy_url.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().extend(path.split('/'));
    }
    url
}

fn transport_failure(error: &reqwest::Error) -> ErrorInfo {
    let kind = if error.is_timeout() {
        FailureKind::Aborted
    } else if error.is_connect() || error.is_request() {
        FailureKind::Connection
    } else {
        FailureKind::Other
    };
    ErrorInfo::new(kind, error.to_string(), Stage::Proxy)
}

fn elapsed(limit: Duration) -> ErrorInfo {
    ErrorInfo::new(
        FailureKind::Aborted,
        format!("gateway did not respond within {}s", limit.as_secs()),
        Stage::Proxy,
    )
}

/// Send and turn a non-success status into a classified failure
async fn send(
    builder: reqwest::RequestBuilder,
    limit: Duration,
    snippet_chars: usize,
) -> Result<reqwest::Response, ErrorInfo> {
    let response = timeout(limit, builder.send())
        .await
        .map_err(|_| elapsed(limit))?
        .map_err(|e| transport_failure(&e))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!(%status, error = %e, "failed to read gateway error body");
            String::new()
        }
    };
    Err(gateway_failure(status, &body, snippet_chars))
}

fn gateway_failure(status: reqwest::StatusCode, body: &str, snippet_chars: usize) -> ErrorInfo {
    let message = vendor_message(body).unwrap_or_else(|| format!("gateway returned {status}"));
    ErrorInfo::upstream(status.as_u16(), message, body, Stage::Proxy, snippet_chars)
}

/// `POST /gateway/chat`
pub async fn chat(
    http: &reqwest::Client,
    proxy_url: &Url,
    target: TargetSpec,
    request: &CompletionRequest,
    stream: bool,
    limit: Duration,
    snippet_chars: usize,
) -> Result<Reply, ErrorInfo> {
    let mut payload = request.clone();
    payload.stream = stream;
    let body = GatewayChatRequest { target, payload };

    let mut builder = http.post(make_url(proxy_url, CHAT_PATH)).json(&body);
    if stream {
        builder = builder.header(ACCEPT, "text/event-stream");
    }
    let response = send(builder, limit, snippet_chars).await?;

    if stream {
        read_stream(response, limit).await
    } else {
        let text = timeout(limit, response.text())
            .await
            .map_err(|_| elapsed(limit))?
            .map_err(|e| transport_failure(&e))?;
        parse_buffered(&text, &request.model)
    }
}

/// Diagnostic replies are returned as text; anything else goes through the
/// strict completion parser
fn parse_buffered(body: &str, model: &str) -> Result<Reply, ErrorInfo> {
    if let Ok(wire) = serde_json::from_str::<OpenAiResponse>(body)
        && let Some(diagnostic) = wire.diagnostic
    {
        let text = wire
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .and_then(|c| c.as_str().map(str::to_owned))
            .unwrap_or_default();
        return Ok(Reply {
            text,
            finish_reason: Some(FinishReason::Stop),
            diagnostic: Some(diagnostic),
            continued: false,
        });
    }

    parley_llm::convert::openai::from_response(body, model)
        .map(|response| Reply {
            text: response.text,
            finish_reason: Some(response.finish_reason),
            diagnostic: None,
            continued: false,
        })
        .map_err(|e| e.to_error_info(200).with_stage(Stage::Proxy))
}

/// Assemble a `chat.completion.chunk` stream
async fn read_stream(response: reqwest::Response, idle: Duration) -> Result<Reply, ErrorInfo> {
    let mut events = response.bytes_stream().eventsource();
    let mut reply = Reply::default();

    loop {
        let event = match timeout(idle, events.next()).await {
            Err(_) => return Err(elapsed(idle)),
            Ok(None) => break,
            Ok(Some(Err(e))) => return Err(ErrorInfo::new(FailureKind::Connection, e.to_string(), Stage::Proxy)),
            Ok(Some(Ok(event))) => event,
        };

        let data = event.data.trim();
        if data == "[DONE]" {
            break;
        }

        let chunk: OpenAiStreamChunk = serde_json::from_str(data).map_err(|e| {
            ErrorInfo::new(
                FailureKind::Other,
                format!("unreadable gateway frame ({e}): {}", parley_core::snippet(data, 200)),
                Stage::Proxy,
            )
        })?;

        if let Some(choice) = chunk.choices.into_iter().next() {
            if let Some(content) = choice.delta.content {
                reply.text.push_str(&content);
            }
            if let Some(reason) = choice.finish_reason.as_deref() {
                reply.finish_reason = Some(map_finish_reason(reason));
            }
        }
        if chunk.diagnostic.is_some() {
            reply.diagnostic = chunk.diagnostic;
        }
    }

    if reply.text.is_empty() {
        return Err(ErrorInfo::new(
            FailureKind::EmptyContent,
            "gateway stream carried no text",
            Stage::Proxy,
        ));
    }
    Ok(reply)
}

/// `POST /gateway/models`
pub async fn models(
    http: &reqwest::Client,
    proxy_url: &Url,
    target: &TargetSpec,
    limit: Duration,
    snippet_chars: usize,
) -> Result<Vec<String>, ErrorInfo> {
    let builder = http.post(make_url(proxy_url, MODELS_PATH)).json(target);
    let response = send(builder, limit, snippet_chars).await?;

    let list: ModelList = timeout(limit, response.json())
        .await
        .map_err(|_| elapsed(limit))?
        .map_err(|e| ErrorInfo::new(FailureKind::Other, format!("unreadable model list: {e}"), Stage::Proxy))?;

    Ok(list.data.into_iter().map(|m| m.id).collect())
}
