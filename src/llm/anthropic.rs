use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use crate::llm::{
    models::{ChatOptions, ChatResponse, Turn},
    LlmError, LlmProvider,
};

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
    api_version: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String, base_url: String, api_version: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_version,
        }
    }

    fn validate(turns: &[Turn], options: &ChatOptions) -> Result<(), LlmError> {
        if turns.is_empty() {
            return Err(LlmError::InvalidRequest("no messages to send".to_string()));
        }
        if !(0.0..=1.0).contains(&options.temperature) {
            return Err(LlmError::InvalidRequest(format!(
                "temperature {} outside [0.0, 1.0]",
                options.temperature
            )));
        }
        if options.max_tokens == 0 {
            return Err(LlmError::InvalidRequest("max_tokens must be positive".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn chat(&self, turns: &[Turn], options: &ChatOptions) -> Result<ChatResponse, LlmError> {
        Self::validate(turns, options)?;

        let mut body = json!({
            "model": options.model,
            "messages": turns,
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
        });
        if let Some(system) = options.system_prompt.as_deref().filter(|s| !s.trim().is_empty()) {
            body["system"] = json!(system);
        }

        debug!(model = %options.model, turns = turns.len(), "Sending completion request");

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))
    }
}
