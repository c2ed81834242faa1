mod client;
mod rules;

pub use client::LlmService;
pub use rules::parse_rule_suggestions;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[serde(alias = "open_ai")]
    OpenAi,
    Anthropic,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no API key configured for {0:?}")]
    MissingKey(LlmProvider),

    #[error("LLM server error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed LLM response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Anything that turns a system and a user message into a completion.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

#[async_trait]
impl Completion for LlmService {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        LlmService::complete(self, system, user).await
    }
}
