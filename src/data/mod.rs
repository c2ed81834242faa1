//! Record-oriented file I/O with validation, transformation and watching.

mod manager;
pub mod rules;
mod types;

pub use manager::{matches_pattern, DataManager};
pub use types::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("cannot determine data format of '{0}'")]
    UnknownFormat(String),

    #[error("expected a list of records or a single record")]
    NotRecords,

    #[error("schema violation: {0}")]
    Schema(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    HttpStatus(u16),
}
