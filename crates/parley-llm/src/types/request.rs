use serde::{Deserialize, Serialize};

use super::message::{Content, ContentPart, IMAGE_PLACEHOLDER, Message};

/// Canonical chat completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub stream: bool,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            stream: false,
        }
    }

    /// Whether any message carries an image part
    pub fn has_images(&self) -> bool {
        self.messages.iter().any(|m| m.content.has_images())
    }

    /// Copy of the request with every image replaced by placeholder text
    #[must_use]
    pub fn without_images(&self) -> Self {
        let messages = self
            .messages
            .iter()
            .map(|message| {
                let content = match &message.content {
                    Content::Parts(parts) => Content::Parts(
                        parts
                            .iter()
                            .map(|part| match part {
                                ContentPart::Image { .. } => ContentPart::Text {
                                    text: IMAGE_PLACEHOLDER.to_owned(),
                                },
                                text => text.clone(),
                            })
                            .collect(),
                    ),
                    text => text.clone(),
                };
                Message {
                    role: message.role,
                    content,
                }
            })
            .collect();

        Self {
            messages,
            ..self.clone()
        }
    }
}
