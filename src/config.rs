//! Runtime configuration
//!
//! Read from the environment (a `.env` file is loaded first by the binaries);
//! command-line flags override individual fields afterwards.

use crate::error::{QaError, Result};
use crate::llm::{
    DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL, DEFAULT_OPENAI_MODEL, DEFAULT_OPENAI_URL,
};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_LLM_HTTP_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Ollama,
    OpenAi,
}

impl FromStr for LlmProvider {
    type Err = QaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(LlmProvider::Ollama),
            "openai" => Ok(LlmProvider::OpenAi),
            other => Err(QaError::Config(format!("Unknown LLM provider: {}", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub ollama_url: String,
    pub ollama_model: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub http_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Ollama,
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_URL.to_string(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            http_timeout_secs: DEFAULT_LLM_HTTP_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory containing `holdings.csv` and `trades.csv`.
    pub data_dir: PathBuf,
    pub bind_addr: String,
    /// Upper bound on one question's pipeline; `None` waits indefinitely.
    pub request_timeout_secs: Option<u64>,
    pub llm: LlmConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            request_timeout_secs: None,
            llm: LlmConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        if let Some(dir) = get("HOLDINGS_QA_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(addr) = get("HOLDINGS_QA_BIND") {
            config.bind_addr = addr;
        }
        if let Some(secs) = get("HOLDINGS_QA_TIMEOUT_SECS") {
            config.request_timeout_secs = Some(parse_secs("HOLDINGS_QA_TIMEOUT_SECS", &secs)?);
        }

        if let Some(provider) = get("LLM_PROVIDER") {
            config.llm.provider = provider.parse()?;
        }
        if let Some(url) = get("OLLAMA_URL") {
            config.llm.ollama_url = url;
        }
        if let Some(model) = get("OLLAMA_MODEL") {
            config.llm.ollama_model = model;
        }
        config.llm.openai_api_key = get("OPENAI_API_KEY");
        if let Some(url) = get("OPENAI_BASE_URL") {
            config.llm.openai_base_url = url;
        }
        if let Some(model) = get("OPENAI_MODEL") {
            config.llm.openai_model = model;
        }
        if let Some(secs) = get("LLM_HTTP_TIMEOUT_SECS") {
            config.llm.http_timeout_secs = parse_secs("LLM_HTTP_TIMEOUT_SECS", &secs)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.llm.provider == LlmProvider::OpenAi && self.llm.openai_api_key.is_none() {
            return Err(QaError::Config(
                "OPENAI_API_KEY must be set when LLM_PROVIDER=openai".to_string(),
            ));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(QaError::Config("HOLDINGS_QA_TIMEOUT_SECS must be positive".to_string()));
        }
        Ok(())
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| QaError::Config(format!("{} must be a whole number of seconds: {}", key, e)))
}
