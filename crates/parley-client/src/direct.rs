//! Calls straight to the vendor with the in-process adapters

use std::time::Duration;

use futures::StreamExt;
use parley_core::{ErrorInfo, FailureKind, Stage};
use parley_llm::error::LlmError;
use parley_llm::provider::{self, Provider};
use parley_llm::types::{CompletionRequest, StreamEvent};
use tokio::time::timeout;

use crate::client::Reply;

fn classify(error: &LlmError, snippet_chars: usize) -> ErrorInfo {
    error.to_error_info(snippet_chars).with_stage(Stage::Direct)
}

fn elapsed(limit: Duration) -> ErrorInfo {
    ErrorInfo::new(
        FailureKind::Aborted,
        format!("provider did not respond within {}s", limit.as_secs()),
        Stage::Direct,
    )
}

pub async fn chat(
    provider: &dyn Provider,
    request: &CompletionRequest,
    stream: bool,
    limit: Duration,
    snippet_chars: usize,
) -> Result<Reply, ErrorInfo> {
    if !stream {
        let response = timeout(limit, provider::complete_with_downgrade(provider, request))
            .await
            .map_err(|_| elapsed(limit))?
            .map_err(|e| classify(&e, snippet_chars))?;

        return Ok(Reply {
            text: response.text,
            finish_reason: Some(response.finish_reason),
            diagnostic: None,
            continued: false,
        });
    }

    let mut events = timeout(limit, provider::stream_with_downgrade(provider, request))
        .await
        .map_err(|_| elapsed(limit))?
        .map_err(|e| classify(&e, snippet_chars))?;

    let mut reply = Reply::default();
    loop {
        match timeout(limit, events.next()).await.map_err(|_| elapsed(limit))? {
            Some(Ok(StreamEvent::Delta(text))) => reply.text.push_str(&text),
            Some(Ok(StreamEvent::Finish(reason))) => {
                reply.finish_reason.get_or_insert(reason);
            }
            Some(Ok(StreamEvent::Usage(_))) => {}
            Some(Ok(StreamEvent::Done)) | None => break,
            Some(Err(error)) => return Err(classify(&error, snippet_chars)),
        }
    }

    if reply.text.is_empty() {
        return Err(classify(
            &LlmError::EmptyContent("stream ended without text".to_owned()),
            snippet_chars,
        ));
    }
    Ok(reply)
}

pub async fn models(provider: &dyn Provider, limit: Duration, snippet_chars: usize) -> Result<Vec<String>, ErrorInfo> {
    timeout(limit, provider.list_models())
        .await
        .map_err(|_| elapsed(limit))?
        .map_err(|e| classify(&e, snippet_chars))
}
