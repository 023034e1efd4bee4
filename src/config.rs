//! TOML configuration parsing and validation.
//!
//! ```toml
//! [store]
//! dir = "./data"
//!
//! [llm]
//! provider = "openai"
//! model = "gpt-4o"
//!
//! [extraction]
//! max_attempts = 3
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! ```
//!
//! Every section except `[store]` and `[llm]` may be omitted.

use anyhow::{Context, Result};
use crm_filler_core::models::Collection;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Location of the four collection files.
///
/// File names default to `existing_companies.json`, `existing_contacts.json`,
/// `previous_deals.json`, and `previous_meetings.json`. Relative overrides
/// are resolved against `dir`.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub dir: PathBuf,
    #[serde(default)]
    pub companies: Option<PathBuf>,
    #[serde(default)]
    pub contacts: Option<PathBuf>,
    #[serde(default)]
    pub deals: Option<PathBuf>,
    #[serde(default)]
    pub meetings: Option<PathBuf>,
}

impl StoreConfig {
    pub fn path_for(&self, collection: Collection) -> PathBuf {
        let custom = match collection {
            Collection::Companies => self.companies.as_ref(),
            Collection::Contacts => self.contacts.as_ref(),
            Collection::Deals => self.deals.as_ref(),
            Collection::Meetings => self.meetings.as_ref(),
        };
        match custom {
            Some(path) => self.dir.join(path),
            None => self.dir.join(collection.default_file_name()),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model: String,
    /// Base URL override. Defaults to the provider's public endpoint.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_max_output_tokens() -> u32 {
    20000
}
fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl ExtractionConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.extraction.max_attempts < 1 {
        anyhow::bail!("extraction.max_attempts must be >= 1");
    }

    match config.llm.provider.as_str() {
        "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be openai or ollama.",
            other
        ),
    }

    if config.llm.model.trim().is_empty() {
        anyhow::bail!("llm.model must not be empty");
    }

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}
