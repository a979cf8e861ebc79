//! Text-generation backends
//!
//! The SQL generator only needs one capability from a language model: a
//! chat call with a system message, a user message and a sampling
//! temperature. [`TextGenerator`] is that seam; [`OllamaClient`] talks to a
//! local Ollama server and [`OpenAiClient`] to any OpenAI-compatible
//! chat-completions endpoint.

use crate::config::{LlmConfig, LlmProvider};
use crate::error::{QaError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One role-separated chat turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

impl ChatRequest {
    /// Request with temperature 0.
    pub fn deterministic(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: 0.0,
        }
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Backend name for logs (e.g. "ollama").
    fn name(&self) -> &str;

    /// Send one chat turn and return the raw text of the reply.
    async fn chat(&self, request: &ChatRequest) -> Result<String>;
}

/// Build the backend selected in config.
pub fn build_generator(config: &LlmConfig) -> Result<Arc<dyn TextGenerator>> {
    let timeout = Duration::from_secs(config.http_timeout_secs);
    match config.provider {
        LlmProvider::Ollama => Ok(Arc::new(
            OllamaClient::with_url(&config.ollama_url, timeout).with_model(&config.ollama_model),
        )),
        LlmProvider::OpenAi => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                QaError::Config("OPENAI_API_KEY is required for the openai provider".to_string())
            })?;
            Ok(Arc::new(OpenAiClient::new(
                api_key,
                config.openai_model.clone(),
                config.openai_base_url.clone(),
                timeout,
            )))
        }
    }
}

/// Whether the configured backend answers right now. Only Ollama can be
/// checked; other backends report `true`.
pub async fn backend_reachable(config: &LlmConfig) -> bool {
    match config.provider {
        LlmProvider::Ollama => {
            let timeout = Duration::from_secs(config.http_timeout_secs);
            OllamaClient::with_url(&config.ollama_url, timeout)
                .is_available()
                .await
        }
        LlmProvider::OpenAi => true,
    }
}

fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

// ============================================================================
// Ollama
// ============================================================================

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2:latest";

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaReply,
}

#[derive(Debug, Deserialize)]
struct OllamaReply {
    content: String,
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::with_url(DEFAULT_OLLAMA_URL, Duration::from_secs(120))
    }
}

impl OllamaClient {
    pub fn with_url(url: &str, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            base_url: url.trim_end_matches('/').to_string(),
            model: DEFAULT_OLLAMA_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check if the server answers within two seconds.
    pub async fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn request_body<'a>(&'a self, request: &'a ChatRequest) -> OllamaChatRequest<'a> {
        OllamaChatRequest {
            model: &self.model,
            messages: vec![
                OllamaMessage {
                    role: "system",
                    content: &request.system,
                },
                OllamaMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
            },
        }
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<String> {
        debug!("Calling Ollama model {}", self.model);

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| QaError::Llm(format!("Failed to send request to Ollama: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QaError::Llm(format!("Ollama API error ({}): {}", status, body)));
        }

        let reply: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| QaError::Llm(format!("Failed to parse Ollama response: {}", e)))?;

        Ok(reply.message.content)
    }
}

// ============================================================================
// OpenAI-compatible
// ============================================================================

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: String, base_url: String, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn request_body(&self, request: &ChatRequest) -> Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user}
            ],
            "temperature": request.temperature,
        })
    }
}

/// Pull `choices[0].message.content` out of a chat-completions reply.
fn extract_completion(response_json: &Value) -> Result<String> {
    if let Some(error) = response_json.get("error") {
        return Err(QaError::Llm(format!("LLM API error: {}", error)));
    }

    let choices = response_json
        .get("choices")
        .and_then(|c| c.as_array())
        .ok_or_else(|| QaError::Llm("No choices array in LLM response".to_string()))?;

    let first = choices
        .first()
        .ok_or_else(|| QaError::Llm("Empty choices array in LLM response".to_string()))?;

    match first.get("finish_reason").and_then(|r| r.as_str()) {
        Some("length") => warn!("LLM response was truncated due to length limit"),
        Some("content_filter") => {
            return Err(QaError::Llm(
                "LLM response was filtered by content policy".to_string(),
            ))
        }
        _ => {}
    }

    let content = first["message"]["content"]
        .as_str()
        .ok_or_else(|| QaError::Llm("No content in LLM response".to_string()))?;

    if content.is_empty() {
        return Err(QaError::Llm("Empty content in LLM response".to_string()));
    }

    Ok(content.to_string())
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<String> {
        debug!("Calling chat completions model {}", self.model);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| QaError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(QaError::Llm(format!("LLM API error ({}): {}", status, error_text)));
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| QaError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        extract_completion(&response_json)
    }
}
