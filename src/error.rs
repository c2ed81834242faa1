use thiserror::Error;

use crate::automation::BuilderError;
use crate::config::ConfigError;
use crate::data::DataError;
use crate::interaction::InteractionError;
use crate::kernel::bus::BusError;
use crate::process::ProcessError;
use crate::security::SecurityViolation;
use crate::services::llm::LlmError;
use crate::utility::UtilityError;
use crate::validation::ValidationError;

/// Crate-wide error. Subsystems keep their own enums; this one only exists so
/// orchestration code can use `?` across them.
#[derive(Debug, Error)]
pub enum AliceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Security(#[from] SecurityViolation),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Builder(#[from] BuilderError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Interaction(#[from] InteractionError),

    #[error(transparent)]
    Utility(#[from] UtilityError),

    #[error("task timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("unsupported task: {0}")]
    Unsupported(String),
}

impl AliceError {
    /// Short type name used by the error tracker to group similar failures.
    pub fn kind(&self) -> &'static str {
        match self {
            AliceError::Config(_) => "ConfigError",
            AliceError::Bus(_) => "BusError",
            AliceError::Security(_) => "SecurityViolation",
            AliceError::Validation(_) => "ValidationError",
            AliceError::Builder(_) => "BuilderError",
            AliceError::Process(_) => "ProcessError",
            AliceError::Data(_) => "DataError",
            AliceError::Llm(_) => "LlmError",
            AliceError::Interaction(_) => "InteractionError",
            AliceError::Utility(_) => "UtilityError",
            AliceError::Timeout(_) => "Timeout",
            AliceError::Execution(_) => "ExecutionError",
            AliceError::Unsupported(_) => "Unsupported",
        }
    }
}

pub type Result<T, E = AliceError> = std::result::Result<T, E>;
