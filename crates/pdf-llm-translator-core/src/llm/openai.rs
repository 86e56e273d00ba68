use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

use super::traits::{ChatMessage, ChatRequest, ClientInfo, ContentPart, LlmClient, Role};
use crate::config::LlmConfig;
use crate::error::{Error, Result};

/// Seconds to wait after a 429 without a `Retry-After` header
const DEFAULT_RATE_LIMIT_WAIT_SECS: u64 = 5;

/// OpenAI-compatible chat completions client.
/// Works with: llama.cpp server, Ollama, vLLM, OpenAI, etc.
pub struct OpenAiClient {
    client: Client,
    config: LlmConfig,
}

// =============================================================================
// Wire format
// =============================================================================

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<WireResponseFormat<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: WireContent<'a>,
}

/// Plain string for text-only messages, part array when images are attached
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireContent<'a> {
    Text(String),
    Parts(Vec<WirePart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: WireImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct WireImageUrl<'a> {
    url: &'a str,
    detail: &'static str,
}

#[derive(Debug, Serialize)]
struct WireResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: WireJsonSchema<'a>,
}

#[derive(Debug, Serialize)]
struct WireJsonSchema<'a> {
    name: &'a str,
    strict: bool,
    schema: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

impl<'a> WireMessage<'a> {
    fn from_message(message: &'a ChatMessage) -> Self {
        let content = if message.has_image() {
            WireContent::Parts(
                message
                    .parts
                    .iter()
                    .map(|part| match part {
                        ContentPart::Text(text) => WirePart::Text { text },
                        ContentPart::Image { data_url } => WirePart::ImageUrl {
                            image_url: WireImageUrl {
                                url: data_url,
                                detail: "high",
                            },
                        },
                    })
                    .collect(),
            )
        } else {
            WireContent::Text(message.text())
        };

        Self {
            role: message.role,
            content,
        }
    }
}

impl OpenAiClient {
    /// Create a new client from endpoint configuration.
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::LlmClientInit(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub const fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'))
    }

    fn build_body<'a>(&'a self, request: &'a ChatRequest) -> WireRequest<'a> {
        WireRequest {
            model: &self.config.model,
            messages: request.messages.iter().map(WireMessage::from_message).collect(),
            temperature: Some(request.temperature.unwrap_or(self.config.temperature)),
            max_tokens: self.config.max_tokens,
            response_format: request.response_schema.as_ref().map(|s| WireResponseFormat {
                format_type: "json_schema",
                json_schema: WireJsonSchema {
                    name: s.name,
                    strict: true,
                    schema: &s.schema,
                },
            }),
        }
    }

    /// Pull the assistant text out of a successful response body
    fn parse_content(body: &str) -> Result<String> {
        let response: ChatResponse = serde_json::from_str(body)
            .map_err(|e| Error::LlmInvalidResponse(format!("malformed envelope: {e}")))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::LlmInvalidResponse("No choices in response".to_string()))?;

        if let Some(refusal) = choice.message.refusal.filter(|r| !r.is_empty()) {
            return Err(Error::LlmInvalidResponse(format!("model refused: {refusal}")));
        }

        if choice.finish_reason.as_deref() == Some("length") {
            warn!("Model output was truncated at the token limit");
        }

        choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| Error::LlmInvalidResponse("Empty message content".to_string()))
    }

    /// Make API request with retry logic
    async fn request_with_retry(&self, request: &ChatRequest) -> Result<String> {
        let url = self.endpoint();
        let body = self.build_body(request);
        let attempts = self.config.retry_count.max(1);

        let mut last_error = None;

        for attempt in 0..attempts {
            debug!(
                "Model request attempt {}/{} to {} (schema: {})",
                attempt + 1,
                attempts,
                url,
                request.response_schema.as_ref().map_or("none", |s| s.name)
            );

            let mut req = self.client.post(&url).json(&body);

            if let Some(ref key) = self.config.api_key {
                req = req.bearer_auth(key);
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        match response.text().await {
                            Ok(text) => match Self::parse_content(&text) {
                                Ok(content) => return Ok(content),
                                Err(e) => {
                                    warn!("Unusable model response: {}", e);
                                    last_error = Some(e);
                                }
                            },
                            Err(e) => {
                                warn!("Failed to read response body: {}", e);
                                last_error = Some(Error::LlmInvalidResponse(e.to_string()));
                            }
                        }
                    } else if status.as_u16() == 429 {
                        let retry_after = response
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.trim().parse().ok());

                        warn!("Rate limited, retry after {:?}s", retry_after);
                        last_error = Some(Error::LlmRateLimited { retry_after });

                        if attempt + 1 < attempts {
                            let wait = retry_after.unwrap_or(DEFAULT_RATE_LIMIT_WAIT_SECS);
                            tokio::time::sleep(Duration::from_secs(wait)).await;
                        }
                        continue;
                    } else {
                        let body = response.text().await.unwrap_or_default();
                        warn!("API error: {} - {}", status, crate::util::truncate_chars(&body, 500));
                        last_error = Some(Error::LlmRequest(format!("HTTP {status}: {body}")));

                        // Client errors other than 408 will not improve on retry
                        if status.is_client_error() && status.as_u16() != 408 {
                            break;
                        }
                    }
                }
                Err(e) => {
                    warn!("Request failed: {}", e);
                    if e.is_timeout() {
                        last_error = Some(Error::LlmTimeout);
                    } else {
                        last_error = Some(Error::LlmRequest(e.to_string()));
                    }
                }
            }

            if attempt + 1 < attempts {
                tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
            }
        }

        error!("Model request failed after {} attempts", attempts);
        Err(last_error.unwrap_or(Error::LlmMaxRetriesExceeded))
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn info(&self) -> ClientInfo {
        ClientInfo {
            name: "OpenAI Compatible",
            model: self.config.model.clone(),
            supports_images: true,
        }
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        self.request_with_retry(request).await
    }
}
