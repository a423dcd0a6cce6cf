//! Minimal Ollama chat client shared by the LLM-backed stages.

use crate::config::ModelConfig;
use crate::error::LlmError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Message in the chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

/// Client for one Ollama model.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http_client: reqwest::Client,
    ollama_url: String,
    model_name: String,
    temperature: f32,
    timeout_seconds: u64,
}

impl OllamaClient {
    pub fn new(config: &ModelConfig) -> Result<Self, LlmError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| LlmError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            ollama_url: config.ollama_url.trim_end_matches('/').to_string(),
            model_name: config.name.clone(),
            temperature: config.temperature,
            timeout_seconds: config.timeout_seconds,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Send a system + user prompt and return the reply text.
    pub async fn chat(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        self.send(system, prompt, None).await
    }

    /// Like [`chat`](Self::chat), but asks Ollama to constrain the reply to JSON.
    pub async fn chat_json(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        self.send(system, prompt, Some("json")).await
    }

    async fn send(
        &self,
        system: &str,
        prompt: &str,
        format: Option<&'static str>,
    ) -> Result<String, LlmError> {
        let url = format!("{}/api/chat", self.ollama_url);

        let request = OllamaChatRequest {
            model: self.model_name.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(prompt)],
            stream: false,
            format,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        debug!("Sending chat request to {} ({})", url, self.model_name);

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout_seconds)
                } else if e.is_connect() {
                    LlmError::Connect(self.ollama_url.clone())
                } else {
                    LlmError::Request(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, body });
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;

        Ok(chat_response.message.content)
    }
}
