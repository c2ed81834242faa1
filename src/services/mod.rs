//! Long-lived components with an explicit lifecycle and a health probe.

pub mod llm;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub service: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[async_trait]
pub trait Service: Send + Sync {
    fn name(&self) -> &str;

    async fn initialize(&self) -> anyhow::Result<()>;

    async fn cleanup(&self) -> anyhow::Result<()>;

    async fn health_details(&self) -> anyhow::Result<Value>;

    async fn health_check(&self) -> HealthReport {
        match self.health_details().await {
            Ok(details) => HealthReport {
                service: self.name().to_string(),
                status: HealthStatus::Healthy,
                details: Some(details),
                error: None,
            },
            Err(e) => {
                error!("Health check failed for {}: {}", self.name(), e);
                HealthReport {
                    service: self.name().to_string(),
                    status: HealthStatus::Unhealthy,
                    details: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
