use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde_json::{json, Value};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Completion backend behind prompt handlers.
///
/// Injectable so tests substitute a deterministic stub; the per-rule timeout
/// is enforced by the caller, not the backend.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send one rendered instruction, return the raw completion text
    async fn complete(&self, instruction: &str) -> Result<String>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Anthropic Messages API backend
pub struct AnthropicBackend {
    client: Client,
    api_key: String,
    model: String,
}

impl AnthropicBackend {
    pub fn new(api_key: &str) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}

#[async_trait]
impl CompletionBackend for AnthropicBackend {
    async fn complete(&self, instruction: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "max_tokens": 1024,
            "temperature": 0.0,
            "messages": [{"role": "user", "content": instruction}],
        });

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("Anthropic API error {}: {}", status, detail));
        }

        let payload: Value = response.json().await?;
        let text = payload["content"]
            .as_array()
            .and_then(|blocks| {
                blocks
                    .iter()
                    .find_map(|b| b["text"].as_str().map(str::to_string))
            })
            .ok_or_else(|| anyhow!("completion response missing text content"))?;

        Ok(text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Backend for hosts without completion credentials. Every prompt rule then
/// degrades to a fail-open handler failure.
#[derive(Debug, Default)]
pub struct NullBackend;

#[async_trait]
impl CompletionBackend for NullBackend {
    async fn complete(&self, _instruction: &str) -> Result<String> {
        Err(anyhow!("no completion backend configured"))
    }

    fn name(&self) -> &str {
        "null"
    }
}
