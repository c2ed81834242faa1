//! Access control for named operations.
//!
//! Each operation has a required [`SecurityLevel`] (Medium unless configured).
//! Callers present a [`SecurityContext`]; failures count against the source
//! and three of them block it.

pub mod safety;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::kernel::bus::EventManager;
use crate::kernel::event::{topics, EventPriority};

pub const BLOCK_AFTER_VIOLATIONS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl SecurityLevel {
    pub fn name(&self) -> &'static str {
        match self {
            SecurityLevel::Low => "LOW",
            SecurityLevel::Medium => "MEDIUM",
            SecurityLevel::High => "HIGH",
            SecurityLevel::Critical => "CRITICAL",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityContext {
    pub level: SecurityLevel,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: BTreeMap<String, Value>,
}

impl SecurityContext {
    pub fn new(level: SecurityLevel, source: impl Into<String>) -> Self {
        Self {
            level,
            source: source.into(),
            timestamp: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SecurityViolation {
    #[error("Source is blocked: {0}")]
    BlockedSource(String),

    #[error("Insufficient security level for operation {operation}: requires {required:?}, got {actual:?}")]
    InsufficientLevel {
        operation: String,
        required: SecurityLevel,
        actual: SecurityLevel,
    },

    #[error("System shutdown requires CRITICAL security level")]
    ShutdownRequiresCritical,

    #[error("Data deletion requires HIGH security level")]
    DeleteRequiresHigh,
}

#[derive(Debug, Default)]
struct Rules {
    operations: HashMap<String, SecurityLevel>,
    blocked: HashSet<String>,
    violations: HashMap<String, u32>,
}

#[derive(Debug)]
pub struct SecurityManager {
    events: EventManager,
    rules: Mutex<Rules>,
}

impl SecurityManager {
    pub fn new(events: EventManager) -> Self {
        Self {
            events,
            rules: Mutex::new(Rules::default()),
        }
    }

    fn rules(&self) -> std::sync::MutexGuard<'_, Rules> {
        self.rules.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn configure_operation(&self, operation: impl Into<String>, level: SecurityLevel) {
        let operation = operation.into();
        info!("Configured security level {} for operation: {}", level.name(), operation);
        self.rules().operations.insert(operation, level);
    }

    pub fn required_level(&self, operation: &str) -> SecurityLevel {
        self.rules()
            .operations
            .get(operation)
            .copied()
            .unwrap_or_default()
    }

    pub fn block_source(&self, source: impl Into<String>) {
        let source = source.into();
        warn!("Blocked source: {}", source);
        self.rules().blocked.insert(source);
    }

    pub fn unblock_source(&self, source: &str) {
        if self.rules().blocked.remove(source) {
            info!("Unblocked source: {}", source);
        }
    }

    pub fn is_blocked(&self, source: &str) -> bool {
        self.rules().blocked.contains(source)
    }

    pub fn violation_count(&self, source: &str) -> u32 {
        self.rules().violations.get(source).copied().unwrap_or(0)
    }

    pub fn validate_operation(&self, operation: &str, ctx: &SecurityContext) -> Result<(), SecurityViolation> {
        match self.check(operation, ctx) {
            Ok(()) => {
                self.audit_log(operation, ctx, "Operation validated successfully");
                Ok(())
            }
            Err(violation) => {
                self.handle_violation(operation, ctx, &violation);
                Err(violation)
            }
        }
    }

    fn check(&self, operation: &str, ctx: &SecurityContext) -> Result<(), SecurityViolation> {
        if self.is_blocked(&ctx.source) {
            return Err(SecurityViolation::BlockedSource(ctx.source.clone()));
        }

        let required = self.required_level(operation);
        if ctx.level < required {
            return Err(SecurityViolation::InsufficientLevel {
                operation: operation.to_string(),
                required,
                actual: ctx.level,
            });
        }

        if operation == "system.shutdown" && ctx.level != SecurityLevel::Critical {
            return Err(SecurityViolation::ShutdownRequiresCritical);
        }
        if operation.starts_with("data.delete") && ctx.level < SecurityLevel::High {
            return Err(SecurityViolation::DeleteRequiresHigh);
        }
        Ok(())
    }

    fn handle_violation(&self, operation: &str, ctx: &SecurityContext, violation: &SecurityViolation) {
        let count = {
            let mut rules = self.rules();
            let count = rules.violations.entry(ctx.source.clone()).or_insert(0);
            *count += 1;
            *count
        };
        if count >= BLOCK_AFTER_VIOLATIONS {
            self.block_source(ctx.source.clone());
        }

        let message = violation.to_string();
        self.events.emit_from(
            topics::SECURITY_VIOLATION,
            json!({
                "operation": operation,
                "source": ctx.source,
                "message": message,
                "timestamp": Utc::now().to_rfc3339(),
                "violation_count": count,
            }),
            EventPriority::High,
            "security",
        );

        self.audit_log(operation, ctx, &format!("Security violation: {message}"));
    }

    /// Write one audit entry and return its SHA-256 digest (hex).
    pub fn audit_log(&self, operation: &str, ctx: &SecurityContext, message: &str) -> String {
        let entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "operation": operation,
            "source": ctx.source,
            "security_level": ctx.level.name(),
            "message": message,
            "metadata": ctx.metadata,
        });
        let line = entry.to_string();
        let digest = hex::encode(Sha256::digest(line.as_bytes()));

        info!(target: "alice::audit", "Security audit: {}", line);
        debug!(target: "alice::audit", "Audit log entry hash: {}", digest);
        digest
    }
}
