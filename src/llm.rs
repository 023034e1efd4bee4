//! Text generation backends.
//!
//! The extraction driver only needs "system instruction + user prompt in,
//! fully assembled text out". That capability is the [`Generator`] trait;
//! concrete clients talk to:
//!
//! - **[`OpenAiGenerator`]**: `POST {url}/chat/completions` (default
//!   `https://api.openai.com/v1`), authenticated with `OPENAI_API_KEY`.
//! - **[`OllamaGenerator`]**: `POST {url}/api/chat` on a local Ollama
//!   instance (default `http://localhost:11434`), non-streaming.
//!
//! [`DisabledGenerator`] stands in where no model is needed.
//!
//! Clients make exactly one request per call. Retrying is the caller's
//! business: the extraction driver treats any error here as a failed
//! attempt.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

/// Anything that can turn a prompt into text.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    /// Run one generation and return the complete response text.
    async fn generate(&self, system: &str, user: &str) -> Result<String>;
}

/// Build the generator selected by `[llm].provider`.
pub fn create_generator(config: &LlmConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiGenerator::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

// ============ Disabled ============

/// Generator for commands that never generate (`init`, `state`, `apply`).
/// Every call fails, which the extraction driver treats as a failed attempt.
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _system: &str, _user: &str) -> Result<String> {
        bail!("Text generation is disabled for this command")
    }
}

fn http_client(config: &LlmConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

async fn post_json(
    client: &reqwest::Client,
    url: &str,
    api_key: Option<&str>,
    body: &Value,
    provider: &str,
) -> Result<Value> {
    let mut request = client
        .post(url)
        .header("Content-Type", "application/json")
        .json(body);
    if let Some(key) = api_key {
        request = request.header("Authorization", format!("Bearer {}", key));
    }

    let response = request
        .send()
        .await
        .map_err(|e| anyhow!("{} connection error ({}): {}", provider, url, e))?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("{} API error {}: {}", provider, status, body_text);
    }

    Ok(response.json().await?)
}

// ============ OpenAI ============

/// Chat-completions client for OpenAI and compatible endpoints.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: String,
    url: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl OpenAiGenerator {
    /// # Errors
    ///
    /// Returns an error if `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| OPENAI_DEFAULT_URL.to_string());

        Ok(Self {
            client: http_client(config)?,
            api_key,
            url: url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_output_tokens,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });
        let url = format!("{}/chat/completions", self.url);
        let json = post_json(&self.client, &url, Some(&self.api_key), &body, "OpenAI").await?;
        parse_openai_response(&json)
    }
}

/// Pull `choices[0].message.content` out of a chat-completions response.
fn parse_openai_response(json: &Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

// ============ Ollama ============

/// Non-streaming `/api/chat` client for a local Ollama instance.
pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl OllamaGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| OLLAMA_DEFAULT_URL.to_string());

        Ok(Self {
            client: http_client(config)?,
            url: url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "num_predict": self.max_output_tokens,
            },
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });
        let url = format!("{}/api/chat", self.url);
        let json = post_json(&self.client, &url, None, &body, "Ollama").await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &Value) -> Result<String> {
    json.pointer("/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing message.content"))
}
