//! Layered configuration for Alice.
//!
//! Sources, highest priority first:
//! 1. Environment variables (`ALICE_*` prefix, `__` separates sections)
//! 2. `./alice.toml`
//! 3. `~/.config/alice/config.toml`
//! 4. Built-in defaults
//!
//! `OPENAI_API_KEY` and `ANTHROPIC_API_KEY` are read as a fallback for the
//! LLM keys so an existing `.env` keeps working.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::automation::MAX_TIMEOUT_SECS;
use crate::monitor::metrics::MAX_RETENTION_HOURS;
use crate::security::safety::SafetyPolicy;
use crate::services::llm::LlmProvider;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError::Figment(Box::new(e))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AliceConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub utility: UtilityConfig,
    #[serde(default)]
    pub limits: TimeLimits,
    #[serde(default)]
    pub emotions: EmotionDefaults,
    #[serde(default)]
    pub resources: ResourceDefaults,
    #[serde(default)]
    pub safety: SafetyPolicy,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub openai_base_url: String,
    pub anthropic_base_url: String,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            model: "gpt-4o-mini".to_string(),
            openai_base_url: "https://api.openai.com".to_string(),
            anthropic_base_url: "https://api.anthropic.com".to_string(),
            openai_api_key: None,
            anthropic_api_key: None,
            max_tokens: 1024,
            temperature: 0.4,
            timeout_secs: 30,
        }
    }
}

impl LlmConfig {
    /// Key from config first, then the conventional environment variable.
    pub fn api_key_for(&self, provider: LlmProvider) -> Option<String> {
        let (configured, var) = match provider {
            LlmProvider::OpenAi => (&self.openai_api_key, "OPENAI_API_KEY"),
            LlmProvider::Anthropic => (&self.anthropic_api_key, "ANTHROPIC_API_KEY"),
        };
        configured
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(var).ok().filter(|k| !k.is_empty()))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UtilityConfig {
    pub threshold: f64,
    pub weights: BTreeMap<String, f64>,
}

impl Default for UtilityConfig {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            weights: crate::utility::default_weights(),
        }
    }
}

/// Time budgets, in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeLimits {
    pub reasoning: f64,
    pub self_improvement: f64,
    pub task_execution: f64,
}

impl Default for TimeLimits {
    fn default() -> Self {
        Self {
            reasoning: 5.0,
            self_improvement: 10.0,
            task_execution: 30.0,
        }
    }
}

impl TimeLimits {
    pub fn self_improvement(&self) -> Duration {
        Duration::try_from_secs_f64(self.self_improvement.max(0.0)).unwrap_or(Duration::MAX)
    }

    pub fn task_execution(&self) -> Duration {
        Duration::try_from_secs_f64(self.task_execution.max(0.0)).unwrap_or(Duration::MAX)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct EmotionDefaults(pub BTreeMap<String, f64>);

impl Default for EmotionDefaults {
    fn default() -> Self {
        Self(BTreeMap::from([
            ("joy".to_string(), 0.5),
            ("trust".to_string(), 0.6),
            ("fear".to_string(), 0.2),
            ("surprise".to_string(), 0.3),
        ]))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResourceDefaults {
    pub cpu_usage: f64,
    pub memory_usage: f64,
}

impl Default for ResourceDefaults {
    fn default() -> Self {
        Self {
            cpu_usage: 0.5,
            memory_usage: 0.5,
        }
    }
}

/// Warning / critical percentages for one host metric.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct Threshold {
    pub warning: f64,
    pub critical: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    pub interval_secs: u64,
    pub retention_hours: u64,
    pub cpu: Threshold,
    pub memory: Threshold,
    pub disk: Threshold,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            retention_hours: 24,
            cpu: Threshold { warning: 70.0, critical: 90.0 },
            memory: Threshold { warning: 80.0, critical: 95.0 },
            disk: Threshold { warning: 85.0, critical: 95.0 },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl AliceConfig {
    /// Load from TOML files and environment. Does not read `.env`.
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load `.env` (if any) and then [`AliceConfig::load`].
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load()
    }

    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        let local_path = PathBuf::from("alice.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        figment.merge(Env::prefixed("ALICE_").split("__"))
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("alice").join("config.toml"))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.utility.threshold) {
            return Err(ConfigError::InvalidValue {
                field: "utility.threshold".to_string(),
                reason: format!("{} is outside [0, 1]", self.utility.threshold),
            });
        }
        for (field, value) in [
            ("limits.reasoning", self.limits.reasoning),
            ("limits.self_improvement", self.limits.self_improvement),
            ("limits.task_execution", self.limits.task_execution),
        ] {
            if !(value > 0.0 && value <= MAX_TIMEOUT_SECS) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("{value} is outside (0, {MAX_TIMEOUT_SECS}] seconds"),
                });
            }
        }
        if !(1..=MAX_RETENTION_HOURS).contains(&self.monitor.retention_hours) {
            return Err(ConfigError::InvalidValue {
                field: "monitor.retention_hours".to_string(),
                reason: format!(
                    "{} is outside [1, {}]",
                    self.monitor.retention_hours, MAX_RETENTION_HOURS
                ),
            });
        }
        let sum: f64 = self.utility.weights.values().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::InvalidValue {
                field: "utility.weights".to_string(),
                reason: format!("weights sum to {sum}, expected 1.0"),
            });
        }
        Ok(())
    }
}
