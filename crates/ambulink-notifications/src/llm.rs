//! OpenAI-compatible chat completion client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::NotificationError;

/// Language-model endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible API, e.g. `https://api.sambanova.ai/v1`
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_sampling")]
    pub temperature: f64,
    #[serde(default = "default_sampling")]
    pub top_p: f64,
    #[serde(default = "default_llm_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_llm_base_url() -> String {
    "https://api.sambanova.ai/v1".into()
}
fn default_llm_model() -> String {
    "Meta-Llama-3.1-405B-Instruct".into()
}
fn default_sampling() -> f64 {
    0.1
}
fn default_llm_timeout_ms() -> u64 {
    30_000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: None,
            model: default_llm_model(),
            temperature: default_sampling(),
            top_p: default_sampling(),
            timeout_ms: default_llm_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// One completion call: role-tagged messages plus sampling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub top_p: f64,
}

/// Produces a single assistant reply for a conversation.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the assistant text.
    ///
    /// # Errors
    ///
    /// Transport failures, non-2xx statuses and replies without content are
    /// all errors; an empty string is never returned as success.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, NotificationError>;
}

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    top_p: f64,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiCompatibleClient {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatibleClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, NotificationError> {
        if config.base_url.trim().is_empty() {
            return Err(NotificationError::InvalidConfig("Missing llm.base_url".into()));
        }
        let http_client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| NotificationError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatibleClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, NotificationError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionBody {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            top_p: request.top_p,
        };

        let mut builder = self.http_client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        tracing::debug!(
            model = %self.model,
            messages = request.messages.len(),
            "Requesting chat completion"
        );
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NotificationError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| NotificationError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                NotificationError::InvalidResponse("No completion content returned".into())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_body_uses_openai_shape() {
        let messages = vec![
            ChatMessage::system("You are a medical AI assistant"),
            ChatMessage::user("hi"),
        ];
        let body = ChatCompletionBody {
            model: "m",
            messages: &messages,
            temperature: 0.1,
            top_p: 0.1,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "m",
                "messages": [
                    { "role": "system", "content": "You are a medical AI assistant" },
                    { "role": "user", "content": "hi" }
                ],
                "temperature": 0.1,
                "top_p": 0.1
            })
        );
    }

    #[test]
    fn empty_base_url_is_rejected() {
        let config = LlmConfig {
            base_url: " ".into(),
            ..LlmConfig::default()
        };
        assert!(matches!(
            OpenAiCompatibleClient::from_config(&config),
            Err(NotificationError::InvalidConfig(_))
        ));
    }
}
