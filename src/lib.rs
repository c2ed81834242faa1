pub mod alice;
pub mod automation;
pub mod config;
pub mod data;
pub mod error;
pub mod genetics;
pub mod improvement;
pub mod interaction;
pub mod kernel;
pub mod monitor;
pub mod personality;
pub mod process;
pub mod security;
pub mod services;
pub mod utility;
pub mod validation;

pub use alice::{Alice, TaskOutcome};
pub use config::AliceConfig;
pub use error::{AliceError, Result};
