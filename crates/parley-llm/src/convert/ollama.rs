//! Conversion for the Ollama native chat API

use parley_core::Stage;

use super::truncate_for_error;
use crate::error::LlmError;
use crate::protocol::ollama::{OllamaMessage, OllamaOptions, OllamaRequest, OllamaResponse, OllamaTagList};
use crate::types::message::IMAGE_PLACEHOLDER;
use crate::types::{CompletionRequest, CompletionResponse, Content, ContentPart, FinishReason, StreamEvent, Usage};

// -- Outbound --

/// Base64 payload of a `data:` URI
fn data_uri_payload(url: &str) -> Option<&str> {
    let rest = url.strip_prefix("data:")?;
    let (meta, data) = rest.split_once(',')?;
    meta.ends_with(";base64").then_some(data)
}

fn to_message(role: &str, content: &Content) -> OllamaMessage {
    let mut message = OllamaMessage {
        role: role.to_owned(),
        ..OllamaMessage::default()
    };

    match content {
        Content::Text(text) => message.content.clone_from(text),
        Content::Parts(parts) => {
            let mut texts = Vec::new();
            for part in parts {
                match part {
                    ContentPart::Text { text } => texts.push(text.as_str()),
                    ContentPart::Image { url } => match data_uri_payload(url) {
                        Some(data) => message.images.push(data.to_owned()),
                        None => texts.push(IMAGE_PLACEHOLDER),
                    },
                }
            }
            message.content = texts.join("\n");
        }
    }

    message
}

pub fn to_wire(request: &CompletionRequest) -> OllamaRequest {
    let options = (request.temperature.is_some() || request.max_tokens.is_some()).then_some(OllamaOptions {
        temperature: request.temperature,
        num_predict: request.max_tokens,
    });

    OllamaRequest {
        model: request.model.clone(),
        messages: request
            .messages
            .iter()
            .map(|m| to_message(m.role.as_str(), &m.content))
            .collect(),
        stream: request.stream,
        options,
    }
}

// -- Inbound --

fn finish_reason(wire: &OllamaResponse) -> FinishReason {
    match wire.done_reason.as_deref() {
        Some("length") => FinishReason::Length,
        _ => FinishReason::Stop,
    }
}

fn usage(wire: &OllamaResponse) -> Option<Usage> {
    match (wire.prompt_eval_count, wire.eval_count) {
        (None, None) => None,
        (prompt, completion) => Some(Usage::new(prompt.unwrap_or(0), completion.unwrap_or(0))),
    }
}

fn parse(body: &str, stage: Stage) -> Result<OllamaResponse, LlmError> {
    let wire: OllamaResponse = serde_json::from_str(body).map_err(|e| {
        LlmError::decode(
            format!("not an ollama chat response ({e}): {}", truncate_for_error(body)),
            stage,
        )
    })?;

    match wire.error {
        Some(message) => Err(LlmError::Vendor { message, stage }),
        None => Ok(wire),
    }
}

pub fn from_response(body: &str, model: &str) -> Result<CompletionResponse, LlmError> {
    let wire = parse(body, Stage::Chat)?;

    let Some(message) = wire.message.as_ref() else {
        return Err(LlmError::decode("response has no message", Stage::Chat));
    };
    if message.content.is_empty() {
        return Err(LlmError::EmptyContent("empty message".to_owned()));
    }

    Ok(CompletionResponse {
        model: if wire.model.is_empty() { model.to_owned() } else { wire.model.clone() },
        text: message.content.clone(),
        finish_reason: finish_reason(&wire),
        usage: usage(&wire),
    })
}

pub fn chunk_events(payload: &str) -> Result<Vec<StreamEvent>, LlmError> {
    let wire = parse(payload, Stage::StreamParse)?;
    let mut events = Vec::new();

    if let Some(message) = &wire.message
        && !message.content.is_empty()
    {
        events.push(StreamEvent::Delta(message.content.clone()));
    }

    if wire.done {
        if let Some(usage) = usage(&wire) {
            events.push(StreamEvent::Usage(usage));
        }
        events.push(StreamEvent::Finish(finish_reason(&wire)));
    }

    Ok(events)
}

pub fn model_ids(body: &str) -> Result<Vec<String>, LlmError> {
    let list: OllamaTagList = serde_json::from_str(body)
        .map_err(|e| LlmError::decode(format!("not a tag list ({e}): {}", truncate_for_error(body)), Stage::Models))?;
    Ok(list.models.into_iter().map(|m| m.name).collect())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::{Message, Role};

    #[test]
    fn wire_payload_with_images() {
        let mut request = CompletionRequest::new("llava", vec![
            Message::text(Role::System, "sys"),
            Message {
                role: Role::User,
                content: Content::Parts(vec![
                    ContentPart::Text { text: "what is".to_owned() },
                    ContentPart::Image {
                        url: "data:image/png;base64,iVBORw0K".to_owned(),
                    },
                    ContentPart::Image {
                        url: "https://x.test/remote.png".to_owned(),
                    },
                ]),
            },
        ]);
        request.temperature = Some(0.5);
        request.max_tokens = Some(64);
        request.stream = true;

        let wire = serde_json::to_value(to_wire(&request)).unwrap();
        assert_eq!(
            wire,
            json!({
                "model": "llava",
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "what is\n[image]", "images": ["iVBORw0K"]}
                ],
                "stream": true,
                "options": {"temperature": 0.5, "num_predict": 64}
            })
        );
    }

    #[test]
    fn done_line_finishes_with_length() {
        let events = chunk_events(
            r#"{"model":"llama3","message":{"role":"assistant","content":""},"done":true,"done_reason":"length","prompt_eval_count":4,"eval_count":9}"#,
        )
        .unwrap();
        assert_eq!(events, vec![StreamEvent::Usage(Usage::new(4, 9)), StreamEvent::Finish(FinishReason::Length)]);
    }

    #[test]
    fn content_line() {
        let events = chunk_events(r#"{"message":{"role":"assistant","content":"Hi"},"done":false}"#).unwrap();
        assert_eq!(events, vec![StreamEvent::Delta("Hi".to_owned())]);
    }

    #[test]
    fn error_line() {
        let err = chunk_events(r#"{"error":"model 'nope' not found"}"#).unwrap_err();
        assert!(matches!(err, LlmError::Vendor { ref message, .. } if message.contains("not found")));
    }

    #[test]
    fn buffered_response() {
        let response = from_response(
            r#"{"model":"llama3","message":{"role":"assistant","content":"Hello"},"done":true,"done_reason":"stop"}"#,
            "x",
        )
        .unwrap();
        assert_eq!(response.text, "Hello");
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.model, "llama3");
    }

    #[test]
    fn tags() {
        let ids = model_ids(r#"{"models":[{"name":"llama3:8b","size":1},{"name":"qwen2.5:7b"}]}"#).unwrap();
        assert_eq!(ids, vec!["llama3:8b", "qwen2.5:7b"]);
    }
}
