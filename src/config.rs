// ============================================================================
// File: src/config.rs
// Configuration structures and validation
// ============================================================================

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main configuration structure, optionally loaded from a JSON file
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// Settings for the arXiv search provider
    pub search: SearchSettings,

    /// Settings for the chat-completion provider
    pub chat: ChatSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SearchSettings {
    /// Query endpoint of the arXiv API
    pub base_url: String,

    /// Number of results requested per search (always starting at offset 0)
    pub page_size: usize,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            base_url: "https://export.arxiv.org/api/query".to_string(),
            page_size: 10,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ChatSettings {
    /// Bearer credential; usually provisioned from the environment or the
    /// credential file instead of the config file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Chat-completions endpoint
    pub base_url: String,

    /// Model identifier (e.g., "gpt-4")
    pub model: String,

    /// Temperature setting for response generation (0.0-2.0)
    pub temperature: f32,

    /// Maximum tokens per reply
    pub max_tokens: usize,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            timeout_secs: 60,
        }
    }
}

impl Config {
    /// Read and parse a JSON config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path.display(), e))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Load `path` if given; a missing file at the default location falls
    /// back to built-in defaults, an explicitly requested one does not.
    pub fn load_or_default(path: Option<&Path>, default_path: &Path) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None if default_path.exists() => Self::load(default_path),
            None => Ok(Self::default()),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.search.base_url.trim().is_empty() {
            return Err(anyhow!("Search base URL is required"));
        }

        if self.search.page_size == 0 || self.search.page_size > 100 {
            return Err(anyhow!(
                "Search page size must be between 1 and 100, got {}",
                self.search.page_size
            ));
        }

        if self.chat.base_url.trim().is_empty() {
            return Err(anyhow!("Chat base URL is required"));
        }

        if self.chat.model.trim().is_empty() {
            return Err(anyhow!("Chat model is required"));
        }

        if !(0.0..=2.0).contains(&self.chat.temperature) {
            return Err(anyhow!(
                "Temperature must be between 0.0 and 2.0, got {}",
                self.chat.temperature
            ));
        }

        if self.chat.max_tokens == 0 {
            return Err(anyhow!("max_tokens must be greater than zero"));
        }

        Ok(())
    }
}
