use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{LlmError, LlmProvider};
use crate::config::LlmConfig;
use crate::services::Service;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone)]
pub struct LlmService {
    client: Client,
    config: LlmConfig,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    system: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl LlmService {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
            config,
        }
    }

    pub fn provider(&self) -> LlmProvider {
        self.config.provider
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn has_key(&self) -> bool {
        self.config.api_key_for(self.config.provider).is_some()
    }

    /// One-shot completion with a system and a user message.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let provider = self.config.provider;
        let key = self
            .config
            .api_key_for(provider)
            .ok_or(LlmError::MissingKey(provider))?;

        debug!("LLM request to {:?} ({})", provider, self.config.model);
        let text = match provider {
            LlmProvider::OpenAi => self.complete_openai(&key, system, user).await?,
            LlmProvider::Anthropic => self.complete_anthropic(&key, system, user).await?,
        };
        Ok(text.trim().to_string())
    }

    async fn complete_openai(&self, key: &str, system: &str, user: &str) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let url = format!("{}/v1/chat/completions", self.config.openai_base_url.trim_end_matches('/'));
        let response = self.client.post(url).bearer_auth(key).json(&body).send().await?;
        let response = ensure_success(response).await?;

        let parsed: ChatResponse = response.json().await.map_err(|e| LlmError::Malformed(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Malformed("no choices in response".to_string()))
    }

    async fn complete_anthropic(&self, key: &str, system: &str, user: &str) -> Result<String, LlmError> {
        let body = MessagesRequest {
            model: &self.config.model,
            system,
            messages: vec![Message {
                role: "user",
                content: user,
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let url = format!("{}/v1/messages", self.config.anthropic_base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .header("x-api-key", key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let parsed: MessagesResponse = response.json().await.map_err(|e| LlmError::Malformed(e.to_string()))?;
        let text: String = parsed
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text)
            .collect();
        if text.is_empty() {
            return Err(LlmError::Malformed("no text blocks in response".to_string()));
        }
        Ok(text)
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(LlmError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl Service for LlmService {
    fn name(&self) -> &str {
        "LlmService"
    }

    async fn initialize(&self) -> anyhow::Result<()> {
        if !self.has_key() {
            info!("No API key for {:?}; self-improvement is disabled", self.config.provider);
        }
        Ok(())
    }

    async fn cleanup(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn health_details(&self) -> anyhow::Result<Value> {
        Ok(json!({
            "provider": self.config.provider,
            "model": self.config.model,
            "api_key_configured": self.has_key(),
        }))
    }
}

impl std::fmt::Debug for LlmService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmService")
            .field("provider", &self.config.provider)
            .field("model", &self.config.model)
            .finish()
    }
}
