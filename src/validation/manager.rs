use std::collections::BTreeMap;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, error};

use super::types::*;
use super::ValidationError;
use crate::automation::MAX_TIMEOUT_SECS;
use crate::interaction::Action;
use crate::security::safety::SafetyPolicy;

const REQUIRED_ACTION_FIELDS: [&str; 2] = ["type", "parameters"];

#[derive(Debug, Clone, Default)]
pub struct ValidationManager {
    safety: SafetyPolicy,
}

fn check_timeout(value: f64) -> Result<(), ValidationError> {
    if value > 0.0 && value <= MAX_TIMEOUT_SECS {
        Ok(())
    } else {
        Err(ValidationError::InvalidTimeout {
            value,
            max: MAX_TIMEOUT_SECS,
        })
    }
}

fn parse<T: DeserializeOwned>(kind: &'static str, data: &Value) -> Result<T, ValidationError> {
    serde_json::from_value(data.clone()).map_err(|source| ValidationError::Malformed { kind, source })
}

impl ValidationManager {
    pub fn new(safety: SafetyPolicy) -> Self {
        Self { safety }
    }

    /// Turn a raw task document into a typed [`Task`].
    pub fn validate_task(&self, data: &Value) -> Result<Task, ValidationError> {
        let result = self.build_task(data);
        if let Err(e) = &result {
            error!("Task validation failed: {}", e);
        }
        result
    }

    fn build_task(&self, data: &Value) -> Result<Task, ValidationError> {
        let object = data.as_object().ok_or(ValidationError::NotAnObject)?;
        let kind_name = match object.get("type") {
            None | Some(Value::Null) => "generic",
            Some(Value::String(s)) => s.as_str(),
            Some(other) => return Err(ValidationError::UnknownType(other.to_string())),
        };

        let header: TaskHeader = parse("task", data)?;
        if header.updated_at < header.created_at {
            return Err(ValidationError::UpdatedBeforeCreated);
        }

        let kind = match kind_name {
            "automation" => {
                let spec: AutomationSpec = parse("automation", data)?;
                if spec.actions.is_empty() {
                    return Err(ValidationError::EmptyActions);
                }
                if let Some(secs) = spec.timeout_seconds {
                    check_timeout(secs as f64)?;
                }
                for (index, action) in spec.actions.iter().enumerate() {
                    self.validate_automation_action(index, action)?;
                }
                TaskKind::Automation(spec)
            }
            "interaction" => TaskKind::Interaction(parse("interaction", data)?),
            "learning" => {
                let spec: LearningSpec = parse("learning", data)?;
                self.validate_learning_data(&spec)?;
                TaskKind::Learning(spec)
            }
            "system" => {
                let spec: SystemSpec = parse("system", data)?;
                self.validate_system_command(&spec.command, &spec.args, &spec.environment)?;
                TaskKind::System(spec)
            }
            "generic" => TaskKind::Generic(parse("generic", data)?),
            other => return Err(ValidationError::UnknownType(other.to_string())),
        };

        debug!("Validated {} task {}", kind.name(), header.id);
        Ok(Task { header, kind })
    }

    pub fn validate_automation_action(
        &self,
        index: usize,
        action: &Map<String, Value>,
    ) -> Result<(), ValidationError> {
        let missing: Vec<&'static str> = REQUIRED_ACTION_FIELDS
            .into_iter()
            .filter(|f| !action.contains_key(*f))
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingActionFields { index, missing });
        }
        match action.get("timeout") {
            None | Some(Value::Null) => Ok(()),
            Some(value) => value
                .as_f64()
                .ok_or_else(|| ValidationError::InvalidParameters(format!("action {index} timeout must be a number")))
                .and_then(check_timeout),
        }
    }

    /// Resolve an interaction task into a concrete [`Action`].
    pub fn validate_interaction_parameters(&self, spec: &InteractionSpec) -> Result<Action, ValidationError> {
        let mut object = spec.parameters.clone();
        object.insert("type".to_string(), Value::String(spec.interaction_type.clone()));
        serde_json::from_value(Value::Object(object))
            .map_err(|e| ValidationError::InvalidParameters(e.to_string()))
    }

    pub fn validate_learning_data(&self, spec: &LearningSpec) -> Result<(), ValidationError> {
        if spec.learning_type.trim().is_empty() {
            return Err(ValidationError::InvalidLearningData(
                "learning_type cannot be empty".to_string(),
            ));
        }
        if spec.validation_data.is_some() && spec.training_data.is_none() {
            return Err(ValidationError::InvalidLearningData(
                "validation_data given without training_data".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_system_command(
        &self,
        command: &str,
        args: &[String],
        _environment: &BTreeMap<String, String>,
    ) -> Result<(), ValidationError> {
        if command.trim().is_empty() {
            return Err(ValidationError::EmptyCommand);
        }
        let full = std::iter::once(command)
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        if !self.safety.is_safe_command(&full) {
            return Err(ValidationError::UnsafeCommand(full));
        }
        Ok(())
    }

    /// Non-failing variant of [`ValidationManager::validate_task`] for reporting.
    pub fn check(&self, data: &Value) -> ValidationResponse {
        let mut warnings = Vec::new();
        if data.get("type").is_none() {
            warnings.push("no task type given, treating as generic".to_string());
        }
        let errors = match self.validate_task(data) {
            Ok(_) => Vec::new(),
            Err(e) => vec![e.to_string()],
        };
        ValidationResponse {
            valid: errors.is_empty(),
            errors,
            warnings,
            timestamp: Utc::now(),
        }
    }
}
