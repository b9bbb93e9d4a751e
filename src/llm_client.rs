// ============================================================================
// File: src/llm_client.rs
// Chat-completion API client
// ============================================================================

use anyhow::{anyhow, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::config::ChatSettings;
use crate::models::{ChatCompletionRequest, ChatCompletionResponse, Message};

#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    api_key: String,
    settings: ChatSettings,
}

impl ChatClient {
    /// Build a client from provisioned settings; `settings.api_key` must be set.
    pub fn new(settings: ChatSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| anyhow!("Chat API key has not been provisioned"))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self { client, api_key, settings })
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    /// Send one completion request and return the reply text.
    pub async fn complete(&self, messages: &[Message]) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.settings.model.clone(),
            messages: messages.to_vec(),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        debug!(
            model = %self.settings.model,
            messages = messages.len(),
            temperature = self.settings.temperature,
            max_tokens = self.settings.max_tokens,
            "calling chat completion"
        );

        let response = self.client
            .post(&self.settings.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "API error for model '{}': HTTP {}\nResponse: {}",
                self.settings.model,
                status,
                Self::truncate(&error_text, 500)
            ));
        }

        let response_text = response.text().await?;
        let response_data: ChatCompletionResponse = serde_json::from_str(&response_text)
            .map_err(|e| anyhow!(
                "Failed to parse response from model '{}': {}\nRaw response (first 500 chars): {}",
                self.settings.model,
                e,
                Self::truncate(&response_text, 500)
            ))?;

        let choice = response_data.choices.first()
            .ok_or_else(|| anyhow!(
                "Model '{}' returned no choices",
                self.settings.model
            ))?;

        // An empty reply is still a reply.
        let content = choice.message.content.clone().unwrap_or_default();

        if let Some(usage) = &response_data.usage {
            debug!(total_tokens = usage.total_tokens, "chat completion finished");
        }

        Ok(content)
    }

    fn truncate(text: &str, max_chars: usize) -> String {
        text.chars().take(max_chars).collect()
    }
}
