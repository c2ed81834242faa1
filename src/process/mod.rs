//! Child process lifecycle, resource sampling and one-shot commands.

mod manager;
mod types;

pub use manager::{ProcessManager, GRACEFUL_STOP, MAX_STATS};
pub use types::*;

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("process '{0}' not found")]
    NotFound(String),

    #[error("command cannot be empty")]
    EmptyCommand,

    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid process timeout: {0}")]
    InvalidTimeout(f64),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}
