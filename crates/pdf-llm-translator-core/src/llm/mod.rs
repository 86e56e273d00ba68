mod openai;
mod traits;

pub use openai::OpenAiClient;
pub use traits::{ChatMessage, ChatRequest, ClientInfo, ContentPart, LlmClient, ResponseSchema, Role};

use crate::config::LlmConfig;
use crate::error::Result;
use std::sync::Arc;

/// Create a model client from configuration
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let client = OpenAiClient::new(config.clone())?;
    Ok(Arc::new(client))
}
