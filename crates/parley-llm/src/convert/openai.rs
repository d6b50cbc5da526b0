//! Conversion for OpenAI-compatible chat completions

use parley_core::Stage;

use super::truncate_for_error;
use crate::error::LlmError;
use crate::protocol::openai::{
    OpenAiChoice, OpenAiChoiceMessage, OpenAiContent, OpenAiContentPart, OpenAiImageUrl, OpenAiMessage,
    OpenAiModelList, OpenAiRequest, OpenAiResponse, OpenAiStreamChunk, OpenAiUsage,
};
use crate::types::{CompletionRequest, CompletionResponse, Content, ContentPart, FinishReason, StreamEvent, Usage};

// -- Outbound --

pub fn to_wire(request: &CompletionRequest) -> OpenAiRequest {
    let messages = request
        .messages
        .iter()
        .map(|message| OpenAiMessage {
            role: message.role.as_str().to_owned(),
            content: match &message.content {
                Content::Text(text) => OpenAiContent::Text(text.clone()),
                Content::Parts(parts) => OpenAiContent::Parts(
                    parts
                        .iter()
                        .map(|part| match part {
                            ContentPart::Text { text } => OpenAiContentPart::Text { text: text.clone() },
                            ContentPart::Image { url } => OpenAiContentPart::ImageUrl {
                                image_url: OpenAiImageUrl { url: url.clone() },
                            },
                        })
                        .collect(),
                ),
            },
        })
        .collect();

    OpenAiRequest {
        model: request.model.clone(),
        messages,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        stream: request.stream,
    }
}

// -- Inbound --

/// Tool and function calls carry no text, so they count as a normal stop
pub fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "length" | "max_tokens" => FinishReason::Length,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

impl From<OpenAiUsage> for Usage {
    fn from(usage: OpenAiUsage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

impl From<Usage> for OpenAiUsage {
    fn from(usage: Usage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

fn content_text(content: Option<&serde_json::Value>) -> String {
    match content {
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(serde_json::Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(serde_json::Value::as_str))
            .collect(),
        _ => String::new(),
    }
}

pub fn from_response(body: &str, model: &str) -> Result<CompletionResponse, LlmError> {
    let wire: OpenAiResponse = serde_json::from_str(body).map_err(|e| {
        LlmError::decode(
            format!("not a chat completion ({e}): {}", truncate_for_error(body)),
            Stage::Chat,
        )
    })?;

    if let Some(error) = wire.error {
        return Err(LlmError::Vendor {
            message: error.message,
            stage: Stage::Chat,
        });
    }

    let Some(choice) = wire.choices.into_iter().next() else {
        return Err(LlmError::decode("response has no choices", Stage::Chat));
    };

    let text = content_text(choice.message.content.as_ref());
    if text.is_empty() {
        let reason = if choice.message.tool_calls.is_some() || choice.message.function_call.is_some() {
            "response contained only tool calls".to_owned()
        } else {
            format!(
                "empty message (finish_reason {})",
                choice.finish_reason.as_deref().unwrap_or("none")
            )
        };
        return Err(LlmError::EmptyContent(reason));
    }

    Ok(CompletionResponse {
        model: if wire.model.is_empty() { model.to_owned() } else { wire.model },
        text,
        finish_reason: choice.finish_reason.as_deref().map_or(FinishReason::Stop, map_finish_reason),
        usage: wire.usage.map(Usage::from),
    })
}

pub fn chunk_events(payload: &str) -> Result<Vec<StreamEvent>, LlmError> {
    let chunk: OpenAiStreamChunk = serde_json::from_str(payload).map_err(|e| {
        LlmError::decode(
            format!("not a completion chunk ({e}): {}", truncate_for_error(payload)),
            Stage::StreamParse,
        )
    })?;

    if let Some(error) = chunk.error {
        return Err(LlmError::Vendor {
            message: error.message,
            stage: Stage::StreamParse,
        });
    }

    let mut events = Vec::new();
    if let Some(choice) = chunk.choices.into_iter().find(|c| c.index == 0) {
        if let Some(content) = choice.delta.content
            && !content.is_empty()
        {
            events.push(StreamEvent::Delta(content));
        }
        if let Some(reason) = choice.finish_reason.as_deref() {
            events.push(StreamEvent::Finish(map_finish_reason(reason)));
        }
    }
    if let Some(usage) = chunk.usage {
        events.push(StreamEvent::Usage(usage.into()));
    }

    Ok(events)
}

pub fn model_ids(body: &str) -> Result<Vec<String>, LlmError> {
    let list: OpenAiModelList = serde_json::from_str(body)
        .map_err(|e| LlmError::decode(format!("not a model list ({e}): {}", truncate_for_error(body)), Stage::Models))?;
    Ok(list.data.into_iter().map(|m| m.id).collect())
}

// -- Gateway output --

/// `chat.completion` body returned by the gateway
pub fn completion_body(id: &str, created: u64, model: &str, text: String, finish_reason: FinishReason) -> OpenAiResponse {
    OpenAiResponse {
        id: id.to_owned(),
        object: "chat.completion".to_owned(),
        created,
        model: model.to_owned(),
        choices: vec![OpenAiChoice {
            index: 0,
            message: OpenAiChoiceMessage {
                role: "assistant".to_owned(),
                content: Some(serde_json::Value::String(text)),
                tool_calls: None,
                function_call: None,
            },
            finish_reason: Some(finish_reason.as_str().to_owned()),
        }],
        ..OpenAiResponse::default()
    }
}
