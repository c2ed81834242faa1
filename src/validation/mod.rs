mod manager;
mod types;

pub use manager::ValidationManager;
pub use types::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("task must be a JSON object")]
    NotAnObject,

    #[error("unknown task type '{0}'")]
    UnknownType(String),

    #[error("invalid {kind} task: {source}")]
    Malformed {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("updated_at must be after created_at")]
    UpdatedBeforeCreated,

    #[error("actions list cannot be empty")]
    EmptyActions,

    #[error("action {index} is missing required fields: {missing:?}")]
    MissingActionFields { index: usize, missing: Vec<&'static str> },

    #[error("command cannot be empty")]
    EmptyCommand,

    #[error("command rejected by safety policy: {0}")]
    UnsafeCommand(String),

    #[error("invalid interaction parameters: {0}")]
    InvalidParameters(String),

    #[error("invalid learning data: {0}")]
    InvalidLearningData(String),

    #[error("timeout must be positive and at most {max}s, got {value}")]
    InvalidTimeout { value: f64, max: f64 },
}
