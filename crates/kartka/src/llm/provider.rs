//! Vision model trait and request types.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One piece of a multi-part user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

/// Inline image reference (a `data:` URL).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Message body: plain text or text plus image parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A role-tagged chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    /// User message carrying instruction text and one inline image.
    pub fn user_with_image(text: impl Into<String>, image_data_url: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_data_url.into(),
                    },
                },
            ]),
        }
    }

    /// Concatenated text of this message, ignoring images.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A completed request ready to send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: usize,
}

impl ChatRequest {
    /// Standard shape for every call: system instructions, then a user turn
    /// with the instruction text and the image.
    pub fn vision(
        system: impl Into<String>,
        user_text: impl Into<String>,
        image_data_url: impl Into<String>,
        max_tokens: usize,
    ) -> Self {
        Self {
            messages: vec![
                ChatMessage::system(system),
                ChatMessage::user_with_image(user_text, image_data_url),
            ],
            max_tokens,
        }
    }

    /// Text of the system message, if any.
    pub fn system_text(&self) -> Option<String> {
        self.messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(ChatMessage::text)
    }
}

/// Which endpoint and model produced a result. Stored in every result file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelIdentity {
    pub endpoint: String,
    pub model: String,
}

/// Trait for vision models.
///
/// Implementations must be thread-safe (Send + Sync) so that independent
/// pairs can be processed from separate tasks.
pub trait VisionModel: Send + Sync {
    /// Send the request and return the assistant's raw text.
    ///
    /// Transport failures are errors. Whatever text comes back is returned
    /// as-is; interpreting it is the caller's job.
    fn complete(&self, request: &ChatRequest) -> Result<String>;

    /// Endpoint and model identifier used for the result record.
    fn identity(&self) -> ModelIdentity;

    /// Get the name of this provider (for logging/debugging).
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_request_shape() {
        let request = ChatRequest::vision("sys", "look", "data:image/jpeg;base64,AAAA", 32);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "sys");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"][0]["type"], "text");
        assert_eq!(json["messages"][1]["content"][1]["type"], "image_url");
        assert_eq!(
            json["messages"][1]["content"][1]["image_url"]["url"],
            "data:image/jpeg;base64,AAAA"
        );
    }

    #[test]
    fn test_message_text_skips_images() {
        let msg = ChatMessage::user_with_image("read this", "data:image/jpeg;base64,AAAA");
        assert_eq!(msg.text(), "read this");
        assert_eq!(
            ChatRequest::vision("rules", "x", "y", 1).system_text().as_deref(),
            Some("rules")
        );
    }
}
