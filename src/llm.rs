//! Generative model abstraction and implementations.
//!
//! Defines the [`CompletionModel`] trait and concrete implementations:
//! - **[`DisabledCompleter`]** — returns errors; used when no model is configured.
//! - **[`OllamaCompleter`]** — calls a local Ollama instance's `/api/generate` endpoint.
//! - **[`OpenAiCompleter`]** — calls the OpenAI chat completions API.
//!
//! Like the embedding providers, completion providers make exactly one
//! attempt: a failure is fatal for the current request, with no retry and
//! no fallback model.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;

/// Trait for generative completion providers.
///
/// Accepts a fully assembled prompt string and returns the model's text
/// completion.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Returns the model identifier (e.g. `"llama2:7b"`).
    fn model_name(&self) -> &str;
    /// Run a single completion request.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Create the appropriate [`CompletionModel`] based on configuration.
pub fn create_completer(config: &LlmConfig) -> Result<Arc<dyn CompletionModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledCompleter)),
        "ollama" => Ok(Arc::new(OllamaCompleter::new(config)?)),
        "openai" => Ok(Arc::new(OpenAiCompleter::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

// ============ Disabled provider ============

/// A no-op completion provider that always returns errors.
pub struct DisabledCompleter;

#[async_trait]
impl CompletionModel for DisabledCompleter {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn complete(&self, _prompt: &str) -> Result<String> {
        bail!("LLM provider is disabled. Set [llm] provider in config.")
    }
}

// ============ Ollama provider ============

/// Completion provider using a local Ollama instance.
///
/// Calls `POST /api/generate` (non-streaming) on the configured URL
/// (default `http://localhost:11434`).
pub struct OllamaCompleter {
    model: String,
    url: String,
    timeout_secs: u64,
}

impl OllamaCompleter {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("llm.model required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            model,
            url,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl CompletionModel for OllamaCompleter {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let response = client
            .post(format!("{}/api/generate", self.url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                anyhow::anyhow!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url,
                    e
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Ollama API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<String> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response field"))
}

// ============ OpenAI provider ============

/// Completion provider using the OpenAI chat completions API.
///
/// Requires the `OPENAI_API_KEY` environment variable to be set. The
/// assembled prompt is sent as a single user message.
pub struct OpenAiCompleter {
    model: String,
    timeout_secs: u64,
}

impl OpenAiCompleter {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("llm.model required for OpenAI provider"))?;

        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }

        Ok(Self {
            model,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl CompletionModel for OpenAiCompleter {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });

        let response = client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_openai_response(&json)
    }
}

fn parse_openai_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))
}
