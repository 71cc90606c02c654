pub mod anthropic;
pub mod models;

use anthropic::AnthropicProvider;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{AppConfig, ConfigError};
use models::{ChatOptions, ChatResponse, Turn};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Network Error: {0}")]
    Network(String),
    #[error("API Error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Invalid Request: {0}")]
    InvalidRequest(String),
    #[error("Malformed Response: {0}")]
    Decode(String),
    #[error("Response contained no text content")]
    EmptyReply,
}

/// A remote completion backend. One call is one network request: no retries, no streaming.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn chat(&self, turns: &[Turn], options: &ChatOptions) -> Result<ChatResponse, LlmError>;
}

pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create_default(config: &AppConfig) -> Result<Arc<dyn LlmProvider>, ConfigError> {
        let api_key = config.require_api_key()?;
        Ok(Arc::new(AnthropicProvider::new(
            api_key.to_string(),
            config.llm.api_base.clone(),
            config.llm.api_version.clone(),
        )))
    }
}
