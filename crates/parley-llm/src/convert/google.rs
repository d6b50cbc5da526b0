//! Conversion for the Gemini native API

use parley_core::Stage;

use super::truncate_for_error;
use crate::error::LlmError;
use crate::protocol::google::{
    GoogleContent, GoogleGenerationConfig, GoogleModelList, GooglePart, GoogleRequest, GoogleResponse,
};
use crate::types::{CompletionRequest, CompletionResponse, FinishReason, Role, StreamEvent, Usage};

// -- Outbound --

/// System messages are lifted into `systemInstruction`; consecutive turns of
/// the same role are merged since Gemini expects alternation.
pub fn to_wire(request: &CompletionRequest) -> GoogleRequest {
    let mut system = Vec::new();
    let mut contents: Vec<GoogleContent> = Vec::new();

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
            Role::Assistant => "model",
            Role::User | Role::Tool => "user",
        };

        let part = GooglePart {
            text: Some(text),
            thought: None,
        };
        match contents.last_mut() {
            Some(last) if last.role.as_deref() == Some(role) => last.parts.push(part),
            _ => contents.push(GoogleContent {
                role: Some(role.to_owned()),
                parts: vec![part],
            }),
        }
    }

    let system_instruction = (!system.is_empty()).then(|| GoogleContent {
        role: None,
        parts: vec![GooglePart {
            text: Some(system.join("\n\n")),
            thought: None,
        }],
    });

    let generation_config = (request.temperature.is_some() || request.max_tokens.is_some()).then_some(
        GoogleGenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_tokens,
        },
    );

    GoogleRequest {
        contents,
        system_instruction,
        generation_config,
    }
}

// -- Inbound --

pub fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "MAX_TOKENS" => FinishReason::Length,
        "SAFETY" | "RECITATION" | "OTHER" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => {
            FinishReason::ContentFilter
        }
        _ => FinishReason::Stop,
    }
}

fn candidate_text(response: &GoogleResponse) -> String {
    response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter(|p| p.thought != Some(true))
                .filter_map(|p| p.text.as_deref())
                .collect()
        })
        .unwrap_or_default()
}

fn usage(response: &GoogleResponse) -> Option<Usage> {
    response
        .usage_metadata
        .as_ref()
        .map(|u| Usage::new(u.prompt_token_count, u.candidates_token_count))
}

fn parse(body: &str, stage: Stage) -> Result<GoogleResponse, LlmError> {
    let wire: GoogleResponse = serde_json::from_str(body).map_err(|e| {
        LlmError::decode(
            format!("not a generateContent response ({e}): {}", truncate_for_error(body)),
            stage,
        )
    })?;

    if let Some(error) = &wire.error {
        let status = error.status.as_deref().unwrap_or("ERROR");
        return Err(LlmError::Vendor {
            message: format!("{status}: {}", error.message),
            stage,
        });
    }

    Ok(wire)
}

pub fn from_response(body: &str, model: &str) -> Result<CompletionResponse, LlmError> {
    let wire = parse(body, Stage::Chat)?;

    if wire.candidates.is_empty() {
        let reason = wire
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
            .map_or_else(|| "no candidates".to_owned(), |r| format!("prompt blocked ({r})"));
        return Err(LlmError::EmptyContent(reason));
    }

    let finish = wire.candidates[0].finish_reason.clone();
    let text = candidate_text(&wire);
    if text.is_empty() {
        return Err(LlmError::EmptyContent(format!(
            "candidate without text (finishReason {})",
            finish.as_deref().unwrap_or("none")
        )));
    }

    Ok(CompletionResponse {
        model: wire.model_version.clone().unwrap_or_else(|| model.to_owned()),
        text,
        finish_reason: finish.as_deref().map_or(FinishReason::Stop, map_finish_reason),
        usage: usage(&wire),
    })
}

pub fn chunk_events(payload: &str) -> Result<Vec<StreamEvent>, LlmError> {
    let wire = parse(payload, Stage::StreamParse)?;
    let mut events = Vec::new();

    let text = candidate_text(&wire);
    if !text.is_empty() {
        events.push(StreamEvent::Delta(text));
    }

    let finish = wire.candidates.first().and_then(|c| c.finish_reason.as_deref());
    let blocked = wire.candidates.is_empty()
        && wire
            .prompt_feedback
            .as_ref()
            .is_some_and(|f| f.block_reason.is_some());

    if let Some(reason) = finish {
        if let Some(usage) = usage(&wire) {
            events.push(StreamEvent::Usage(usage));
        }
        events.push(StreamEvent::Finish(map_finish_reason(reason)));
    } else if blocked {
        events.push(StreamEvent::Finish(FinishReason::ContentFilter));
    }

    Ok(events)
}

/// Model ids without the `models/` prefix, limited to chat-capable models
pub fn model_ids(body: &str) -> Result<Vec<String>, LlmError> {
    let list: GoogleModelList = serde_json::from_str(body)
        .map_err(|e| LlmError::decode(format!("not a model list ({e}): {}", truncate_for_error(body)), Stage::Models))?;

    Ok(list
        .models
        .into_iter()
        .filter(|m| {
            m.supported_generation_methods.is_empty()
                || m.supported_generation_methods.iter().any(|g| g == "generateContent")
        })
        .map(|m| m.name.strip_prefix("models/").map_or_else(|| m.name.clone(), str::to_owned))
        .collect())
}
