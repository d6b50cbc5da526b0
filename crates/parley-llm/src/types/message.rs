use serde::{Deserialize, Serialize};

/// Text sent in place of an image a vendor cannot take
pub const IMAGE_PLACEHOLDER: &str = "[image]";

/// Text sent in place of an animated GIF
pub const GIF_PLACEHOLDER: &str = "[GIF image omitted]";

/// Role of a message participant
///
/// Anything unrecognised is treated as the user speaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "system" | "developer" => Self::System,
            "assistant" | "model" => Self::Assistant,
            "tool" | "function" => Self::Tool,
            _ => Self::User,
        }
    }
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// Message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: Content,
}

impl Message {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: Content::Text(text.into()),
        }
    }
}

/// Message content, either plain text or ordered parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, from = "RawContent")]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Default for Content {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl Content {
    /// Text with images collapsed to a placeholder
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => text.as_str(),
                    ContentPart::Image { .. } => IMAGE_PLACEHOLDER,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn has_images(&self) -> bool {
        matches!(self, Self::Parts(parts) if parts.iter().any(|p| matches!(p, ContentPart::Image { .. })))
    }
}

/// Part of a multipart message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    /// HTTP(S) URL or `data:` URI
    #[serde(rename = "image_url")]
    Image {
        url: String,
    },
}

impl ContentPart {
    fn is_gif(&self) -> bool {
        let Self::Image { url } = self else {
            return false;
        };
        let lower = url.to_ascii_lowercase();
        if lower.starts_with("data:") {
            return lower.starts_with("data:image/gif");
        }
        let path = lower.split(['?', '#']).next().unwrap_or_default();
        path.ends_with(".gif")
    }
}

// Inbound content is whatever chat UIs and SDKs send: a string, null, or a
// list of parts in OpenAI or Responses-API spelling.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawContent {
    Text(String),
    Parts(Vec<RawPart>),
    Other(serde_json::Value),
}

#[derive(Deserialize)]
struct RawPart {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    image_url: Option<RawImageUrl>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawImageUrl {
    Bare(String),
    Object { url: String },
}

impl From<RawContent> for Content {
    fn from(raw: RawContent) -> Self {
        match raw {
            RawContent::Text(text) => Self::Text(text),
            RawContent::Parts(parts) => Self::Parts(parts.into_iter().filter_map(RawPart::into_part).collect()),
            RawContent::Other(_) => Self::default(),
        }
    }
}

impl RawPart {
    fn into_part(self) -> Option<ContentPart> {
        match self.kind.as_deref() {
            Some("text" | "input_text") | None if self.text.is_some() => {
                self.text.map(|text| ContentPart::Text { text })
            }
            Some("image_url" | "image" | "input_image") => {
                let url = match self.image_url {
                    Some(RawImageUrl::Bare(url) | RawImageUrl::Object { url }) => Some(url),
                    None => self.image.or(self.url),
                }?;
                (!url.is_empty()).then_some(ContentPart::Image { url })
            }
            _ => None,
        }
    }
}

/// Prepare messages for any vendor call
///
/// GIFs are replaced by a text placeholder since no supported vendor
/// accepts animated images.
pub fn normalize_messages(messages: Vec<Message>) -> Vec<Message> {
    messages
        .into_iter()
        .map(|message| {
            let content = match message.content {
                Content::Parts(parts) => Content::Parts(
                    parts
                        .into_iter()
                        .map(|part| {
                            if part.is_gif() {
                                ContentPart::Text {
                                    text: GIF_PLACEHOLDER.to_owned(),
                                }
                            } else {
                                part
                            }
                        })
                        .collect(),
                ),
                text => text,
            };
            Message { content, ..message }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn unknown_role_becomes_user() {
        let message: Message = serde_json::from_value(json!({"role": "narrator", "content": "hi"})).unwrap();
        assert_eq!(message.role, Role::User);
    }

    #[test]
    fn accepts_wire_part_spellings_and_drops_unknown() {
        let message: Message = serde_json::from_value(json!({
            "role": "user",
            "content": [
                {"type": "text", "text": "look"},
                {"type": "input_text", "text": "here"},
                {"type": "image_url", "image_url": {"url": "https://x.test/a.png"}},
                {"type": "image_url", "image_url": "https://x.test/b.png"},
                {"type": "input_image", "image_url": "data:image/png;base64,AAAA"},
                {"type": "image", "image": "https://x.test/c.jpg"},
                {"type": "audio", "data": "..."},
            ]
        }))
        .unwrap();

        let Content::Parts(parts) = message.content else {
            panic!("expected parts");
        };
        assert_eq!(parts.len(), 6);
        assert_eq!(parts[3], ContentPart::Image {
            url: "https://x.test/b.png".to_owned()
        });
    }

    #[test]
    fn null_content_is_empty_text() {
        let message: Message = serde_json::from_value(json!({"role": "assistant", "content": null})).unwrap();
        assert_eq!(message.content, Content::Text(String::new()));
    }

    #[test]
    fn gifs_are_replaced() {
        let messages = vec![Message {
            role: Role::User,
            content: Content::Parts(vec![
                ContentPart::Image {
                    url: "https://cdn.test/funny.GIF?size=2".to_owned(),
                },
                ContentPart::Image {
                    url: "data:image/gif;base64,R0lG".to_owned(),
                },
                ContentPart::Image {
                    url: "https://cdn.test/photo.png".to_owned(),
                },
            ]),
        }];

        let normalized = normalize_messages(messages);
        let Content::Parts(parts) = &normalized[0].content else {
            panic!("expected parts");
        };
        assert_eq!(parts[0], ContentPart::Text {
            text: GIF_PLACEHOLDER.to_owned()
        });
        assert_eq!(parts[1], ContentPart::Text {
            text: GIF_PLACEHOLDER.to_owned()
        });
        assert!(matches!(parts[2], ContentPart::Image { .. }));
    }

    #[test]
    fn as_text_collapses_images() {
        let content = Content::Parts(vec![
            ContentPart::Text { text: "see".to_owned() },
            ContentPart::Image {
                url: "https://x.test/a.png".to_owned(),
            },
        ]);
        assert_eq!(content.as_text(), "see\n[image]");
        assert!(content.has_images());
    }

    #[test]
    fn serialized_parts_read_back() {
        let content = Content::Parts(vec![ContentPart::Image {
            url: "https://x.test/a.png".to_owned(),
        }]);
        let back: Content = serde_json::from_value(serde_json::to_value(&content).unwrap()).unwrap();
        assert_eq!(back, content);
    }
}
