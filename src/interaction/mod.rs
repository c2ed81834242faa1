//! Mouse, keyboard, shell, web and file actions behind safety checks and rate limits.

mod action;
mod driver;
mod gesture;
mod metrics;
mod system;

pub use action::{Action, FileOperation, InteractionType, MouseButton};
pub use driver::{DesktopDriver, DriverCall, HeadlessDriver};
#[cfg(feature = "desktop")]
pub use driver::NativeDriver;
pub use gesture::{gaussian, natural_curve, POINTS_PER_SEGMENT};
pub use metrics::{InteractionMetrics, MetricsSummary};
pub use system::{ComputerInteractionSystem, SHELL_TIMEOUT};

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InteractionError {
    #[error("desktop driver error: {0}")]
    Driver(String),

    #[error("coordinates ({x}, {y}) are outside the {width}x{height} screen")]
    OutOfBounds { x: i32, y: i32, width: u32, height: u32 },

    #[error("unsafe content rejected")]
    UnsafeContent,

    #[error("unsafe command rejected: {0}")]
    UnsafeCommand(String),

    #[error("unsafe URL rejected: {0}")]
    UnsafeUrl(String),

    #[error("unsafe path rejected: {0}")]
    UnsafePath(String),

    #[error("rate limit exceeded for {0:?}")]
    RateLimited(InteractionType),

    #[error("{0} action has nothing to do")]
    EmptyAction(&'static str),

    #[error("command exited with {code:?}: {stderr}")]
    CommandFailed { code: Option<i32>, stderr: String },

    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
