use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Dispatch priority. Higher variants are delivered first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    /// Dotted topic, e.g. `security.violation`.
    pub kind: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
    pub priority: EventPriority,
    pub source: String,
}

impl Event {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: kind.into(),
            data,
            timestamp: Utc::now(),
            priority: EventPriority::Medium,
            source: "system".to_string(),
        }
    }

    pub fn with_priority(mut self, priority: EventPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

/// Topics emitted by the built-in components.
pub mod topics {
    pub const SYSTEM_STARTUP: &str = "system.startup";
    pub const SYSTEM_SHUTDOWN: &str = "system.shutdown";
    pub const SYSTEM_ALERT: &str = "system.alert";
    pub const SYSTEM_ERROR_ALERT: &str = "system.error_alert";
    pub const SECURITY_VIOLATION: &str = "security.violation";
    pub const TASK_COMPLETED: &str = "task.completed";
    pub const TASK_FAILED: &str = "task.failed";
    pub const RULES_LEARNED: &str = "rules.learned";
}
