//! Conversion for the Anthropic Messages API

use parley_core::Stage;

use super::truncate_for_error;
use crate::error::LlmError;
use crate::protocol::anthropic::{AnthropicMessage, AnthropicModelList, AnthropicRequest, AnthropicResponse};
use crate::types::{CompletionRequest, CompletionResponse, FinishReason, Role, StreamEvent, Usage};

// -- Outbound --

/// System text goes top-level; only `user` and `assistant` turns remain and
/// consecutive turns of one role are merged.
pub fn to_wire(request: &CompletionRequest, default_max_tokens: u32) -> AnthropicRequest {
    let mut system = Vec::new();
    let mut messages: Vec<AnthropicMessage> = Vec::new();

    for message in &request.messages {
        let text = message.content.as_text();
        if text.trim().is_empty() {
            continue;
        }

        let role = match message.role {
            Role::System => {
                system.push(text);
                continue;
            }
            Role::Assistant => "assistant",
            Role::User | Role::Tool => "user",
        };

        match messages.last_mut() {
            Some(last) if last.role == role => {
                last.content.push_str("\n\n");
                last.content.push_str(&text);
            }
            _ => messages.push(AnthropicMessage {
                role: role.to_owned(),
                content: text,
            }),
        }
    }

    AnthropicRequest {
        model: request.model.clone(),
        system: (!system.is_empty()).then(|| system.join("\n\n")),
        messages,
        max_tokens: request.max_tokens.unwrap_or(default_max_tokens),
        temperature: request.temperature,
    }
}

// -- Inbound --

pub fn map_stop_reason(reason: &str) -> FinishReason {
    match reason {
        "max_tokens" => FinishReason::Length,
        "refusal" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

pub fn from_response(body: &str, model: &str) -> Result<CompletionResponse, LlmError> {
    let wire: AnthropicResponse = serde_json::from_str(body).map_err(|e| {
        LlmError::decode(
            format!("not a messages response ({e}): {}", truncate_for_error(body)),
            Stage::Chat,
        )
    })?;

    if let Some(error) = wire.error {
        return Err(LlmError::Vendor {
            message: format!("{}: {}", error.error_type, error.message),
            stage: Stage::Chat,
        });
    }

    let text: String = wire
        .content
        .iter()
        .filter(|block| block.block_type == "text")
        .filter_map(|block| block.text.as_deref())
        .collect();

    if text.is_empty() {
        return Err(LlmError::EmptyContent(format!(
            "no text blocks (stop_reason {})",
            wire.stop_reason.as_deref().unwrap_or("none")
        )));
    }

    Ok(CompletionResponse {
        model: if wire.model.is_empty() { model.to_owned() } else { wire.model },
        text,
        finish_reason: wire.stop_reason.as_deref().map_or(FinishReason::Stop, map_stop_reason),
        usage: wire.usage.map(|u| Usage::new(u.input_tokens, u.output_tokens)),
    })
}

/// Stream events equivalent to a buffered response
pub fn replay(response: &CompletionResponse) -> Vec<StreamEvent> {
    let mut events = vec![StreamEvent::Delta(response.text.clone())];
    if let Some(usage) = response.usage {
        events.push(StreamEvent::Usage(usage));
    }
    events.push(StreamEvent::Finish(response.finish_reason));
    events
}

pub fn model_ids(body: &str) -> Result<Vec<String>, LlmError> {
    let list: AnthropicModelList = serde_json::from_str(body)
        .map_err(|e| LlmError::decode(format!("not a model list ({e}): {}", truncate_for_error(body)), Stage::Models))?;
    Ok(list.data.into_iter().map(|m| m.id).collect())
}
