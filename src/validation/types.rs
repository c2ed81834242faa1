use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::security::SecurityLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Fields shared by every task document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskHeader {
    pub id: String,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

fn default_automation_timeout() -> Option<u64> {
    Some(300)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationSpec {
    pub target_system: String,
    pub actions: Vec<Map<String, Value>>,
    #[serde(default = "default_automation_timeout")]
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionSpec {
    pub interaction_type: String,
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub require_confirmation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningSpec {
    pub learning_type: String,
    #[serde(default)]
    pub training_data: Option<Map<String, Value>>,
    #[serde(default)]
    pub validation_data: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenericSpec {
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub enum TaskKind {
    Automation(AutomationSpec),
    Interaction(InteractionSpec),
    Learning(LearningSpec),
    System(SystemSpec),
    Generic(GenericSpec),
}

impl TaskKind {
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::Automation(_) => "automation",
            TaskKind::Interaction(_) => "interaction",
            TaskKind::Learning(_) => "learning",
            TaskKind::System(_) => "system",
            TaskKind::Generic(_) => "generic",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Task {
    pub header: TaskHeader,
    pub kind: TaskKind,
}

impl Task {
    pub fn id(&self) -> &str {
        &self.header.id
    }

    /// Requested clearance from `metadata.security_level`, Medium when absent or unreadable.
    pub fn security_level(&self) -> SecurityLevel {
        self.header
            .metadata
            .get("security_level")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    /// Optional duration estimate in seconds from `metadata.expected_duration`.
    pub fn expected_duration(&self) -> Option<f64> {
        self.header.metadata.get("expected_duration").and_then(Value::as_f64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub timestamp: DateTime<Utc>,
}
