use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// Information about a model backend
#[derive(Debug, Clone)]
pub struct ClientInfo {
    /// Human-readable backend name
    pub name: &'static str,
    /// Model identifier sent with each request
    pub model: String,
    /// Whether the backend accepts inline page images
    pub supports_images: bool,
}

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One part of a chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    /// Inline image as a `data:` URL
    Image { data_url: String },
}

/// A chat message made of one or more parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            parts: vec![ContentPart::Text(text.into())],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![ContentPart::Text(text.into())],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            parts: vec![ContentPart::Text(text.into())],
        }
    }

    /// Attach an inline image to this message.
    #[must_use]
    pub fn with_image(mut self, data_url: impl Into<String>) -> Self {
        self.parts.push(ContentPart::Image {
            data_url: data_url.into(),
        });
        self
    }

    /// Concatenated text parts (images omitted).
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text(t) => Some(t.as_str()),
                ContentPart::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn has_image(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, ContentPart::Image { .. }))
    }
}

/// JSON Schema the response must follow
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    /// Schema name (`[a-zA-Z0-9_-]`, as required by OpenAI)
    pub name: &'static str,
    pub schema: serde_json::Value,
}

/// A single model request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub response_schema: Option<ResponseSchema>,
    /// Overrides the client's configured temperature
    pub temperature: Option<f32>,
}

impl ChatRequest {
    pub const fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            response_schema: None,
            temperature: None,
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: ResponseSchema) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

/// Trait for model backends
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Get information about this backend
    fn info(&self) -> ClientInfo;

    /// Get the backend name (convenience method)
    fn name(&self) -> &'static str {
        self.info().name
    }

    /// Send a request and return the raw assistant message content
    async fn complete(&self, request: &ChatRequest) -> Result<String>;
}
