//! Fluent construction of [`AutomationTask`]s.
//!
//! ```ignore
//! let task = AutomationBuilder::ui().type_text("hello").with_timeout(5.0).build()?;
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

use super::task::*;
use crate::data::DataConfig;
use crate::interaction::MouseButton;
use crate::process::ProcessConfig;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuilderError {
    #[error("{0} automation requires an action")]
    MissingAction(&'static str),

    #[error("timeout must be positive and at most a day, got {0}")]
    InvalidTimeout(f64),

    #[error("workflow has no steps")]
    EmptyWorkflow,

    #[error("command cannot be empty")]
    EmptyCommand,

    #[error("missing or empty field '{0}'")]
    MissingField(&'static str),
}

#[derive(Debug, Clone)]
struct Options {
    timeout_secs: f64,
    retries: u32,
    conditions: BTreeMap<String, Value>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retries: DEFAULT_RETRIES,
            conditions: BTreeMap::new(),
        }
    }
}

impl Options {
    fn finish(self, params: AutomationParams) -> Result<AutomationTask, BuilderError> {
        let task = AutomationTask {
            params,
            timeout_secs: self.timeout_secs,
            retries: self.retries,
            conditions: self.conditions,
        };
        match task.invalid_timeout() {
            Some(secs) => Err(BuilderError::InvalidTimeout(secs)),
            None => Ok(task),
        }
    }
}

/// Entry point; each constructor starts a builder for one automation kind.
pub struct AutomationBuilder;

impl AutomationBuilder {
    pub fn ui() -> UiBuilder {
        UiBuilder::default()
    }

    pub fn process() -> ProcessBuilder {
        ProcessBuilder::default()
    }

    pub fn data() -> DataBuilder {
        DataBuilder::default()
    }

    pub fn workflow() -> WorkflowBuilder {
        WorkflowBuilder::default()
    }

    pub fn learning() -> LearningBuilder {
        LearningBuilder::default()
    }
}

macro_rules! shared_options {
    ($($builder:ty),+ $(,)?) => {$(
        impl $builder {
            pub fn with_timeout(mut self, seconds: f64) -> Self {
                self.options.timeout_secs = seconds;
                self
            }

            pub fn with_retries(mut self, count: u32) -> Self {
                self.options.retries = count;
                self
            }

            pub fn with_condition(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
                self.options.conditions.insert(name.into(), value.into());
                self
            }
        }
    )+};
}

shared_options!(UiBuilder, ProcessBuilder, DataBuilder, WorkflowBuilder, LearningBuilder);

#[derive(Debug, Default)]
pub struct UiBuilder {
    action: Option<UiAction>,
    options: Options,
}

impl UiBuilder {
    pub fn click_image(mut self, template: impl Into<PathBuf>, confidence: f32) -> Self {
        self.action = Some(UiAction::ClickImage {
            template: template.into(),
            confidence,
        });
        self
    }

    pub fn click_text(mut self, text: impl Into<String>, partial_match: bool) -> Self {
        self.action = Some(UiAction::ClickText {
            text: text.into(),
            partial_match,
        });
        self
    }

    pub fn click_at(mut self, x: i32, y: i32, button: MouseButton) -> Self {
        self.action = Some(UiAction::Click { x, y, button });
        self
    }

    pub fn type_text(mut self, text: impl Into<String>) -> Self {
        self.action = Some(UiAction::TypeText { text: text.into() });
        self
    }

    pub fn press_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.action = Some(UiAction::PressKeys {
            keys: keys.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn move_mouse(mut self, x: i32, y: i32) -> Self {
        self.action = Some(UiAction::MoveMouse { x, y });
        self
    }

    pub fn scroll(mut self, amount: i32) -> Self {
        self.action = Some(UiAction::Scroll { amount });
        self
    }

    pub fn capture_screen(mut self, save_to: Option<PathBuf>) -> Self {
        self.action = Some(UiAction::CaptureScreen { save_to });
        self
    }

    pub fn wait_for_image(mut self, template: impl Into<PathBuf>, confidence: f32, timeout_secs: f64) -> Self {
        self.action = Some(UiAction::WaitForImage {
            template: template.into(),
            confidence,
            timeout_secs,
        });
        self
    }

    pub fn wait_for_color(mut self, x: u32, y: u32, color: [u8; 3], tolerance: u8, timeout_secs: f64) -> Self {
        self.action = Some(UiAction::WaitForColor {
            x,
            y,
            color,
            tolerance,
            timeout_secs,
        });
        self
    }

    pub fn build(self) -> Result<AutomationTask, BuilderError> {
        let action = self.action.ok_or(BuilderError::MissingAction("ui"))?;
        match &action {
            UiAction::ClickText { text, .. } | UiAction::TypeText { text } if text.is_empty() => {
                return Err(BuilderError::MissingField("text"));
            }
            UiAction::PressKeys { keys } if keys.is_empty() => {
                return Err(BuilderError::MissingField("keys"));
            }
            _ => {}
        }
        self.options.finish(AutomationParams::Ui(action))
    }
}

#[derive(Debug, Default)]
pub struct ProcessBuilder {
    action: Option<ProcessAction>,
    options: Options,
}

impl ProcessBuilder {
    pub fn run_command<I, S>(mut self, command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.action = Some(ProcessAction::Command {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn start_service(mut self, service_name: impl Into<String>) -> Self {
        self.action = Some(ProcessAction::Service {
            service_name: service_name.into(),
            action: ServiceAction::Start,
        });
        self
    }

    pub fn stop_service(mut self, service_name: impl Into<String>) -> Self {
        self.action = Some(ProcessAction::Service {
            service_name: service_name.into(),
            action: ServiceAction::Stop,
        });
        self
    }

    pub fn run_script<I, S>(mut self, script_path: impl Into<PathBuf>, interpreter: Option<&str>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.action = Some(ProcessAction::Script {
            script_path: script_path.into(),
            interpreter: interpreter.map(str::to_string),
            args: args.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn monitor_process(mut self, process_name: impl Into<String>) -> Self {
        self.action = Some(ProcessAction::Monitor {
            process_name: process_name.into(),
        });
        self
    }

    pub fn start(mut self, config: ProcessConfig) -> Self {
        self.action = Some(ProcessAction::Start { config });
        self
    }

    pub fn stop(mut self, name: impl Into<String>, force: bool) -> Self {
        self.action = Some(ProcessAction::Stop { name: name.into(), force });
        self
    }

    pub fn build(self) -> Result<AutomationTask, BuilderError> {
        let action = self.action.ok_or(BuilderError::MissingAction("process"))?;
        let empty = match &action {
            ProcessAction::Command { command, .. } => command.trim().is_empty(),
            ProcessAction::Start { config } => config.command.trim().is_empty(),
            ProcessAction::Script { script_path, .. } => script_path.as_os_str().is_empty(),
            _ => false,
        };
        if empty {
            return Err(BuilderError::EmptyCommand);
        }
        self.options.finish(AutomationParams::Process(action))
    }
}

#[derive(Debug, Default)]
pub struct DataBuilder {
    action: Option<DataAction>,
    options: Options,
}

impl DataBuilder {
    pub fn read(mut self, source: impl Into<String>, config: DataConfig) -> Self {
        self.action = Some(DataAction::Read {
            source: source.into(),
            config,
        });
        self
    }

    pub fn write(mut self, records: Vec<Value>, target: impl Into<PathBuf>, config: DataConfig) -> Self {
        self.action = Some(DataAction::Write {
            records,
            target: target.into(),
            config,
        });
        self
    }

    pub fn fetch(mut self, url: impl Into<String>, save_to: Option<PathBuf>) -> Self {
        self.action = Some(DataAction::Fetch { url: url.into(), save_to });
        self
    }

    pub fn transform(mut self, input: impl Into<String>, output: impl Into<PathBuf>, config: DataConfig) -> Self {
        self.action = Some(DataAction::Transform {
            input: input.into(),
            output: output.into(),
            config,
        });
        self
    }

    pub fn validate(mut self, source: impl Into<String>, config: DataConfig) -> Self {
        self.action = Some(DataAction::Validate {
            source: source.into(),
            config,
        });
        self
    }

    pub fn sync_folders(mut self, source: impl Into<PathBuf>, destination: impl Into<PathBuf>, patterns: Vec<String>) -> Self {
        self.action = Some(DataAction::Sync {
            source: source.into(),
            destination: destination.into(),
            patterns,
        });
        self
    }

    pub fn monitor_file(mut self, path: impl Into<PathBuf>, pattern: impl Into<String>, timeout_secs: f64) -> Self {
        self.action = Some(DataAction::Monitor {
            path: path.into(),
            pattern: pattern.into(),
            timeout_secs,
        });
        self
    }

    pub fn build(self) -> Result<AutomationTask, BuilderError> {
        let action = self.action.ok_or(BuilderError::MissingAction("data"))?;
        match &action {
            DataAction::Read { source, .. } | DataAction::Validate { source, .. } if source.is_empty() => {
                return Err(BuilderError::MissingField("source"));
            }
            DataAction::Fetch { url, .. } if url.is_empty() => return Err(BuilderError::MissingField("url")),
            DataAction::Monitor { pattern, .. } if pattern.is_empty() => {
                return Err(BuilderError::MissingField("pattern"));
            }
            _ => {}
        }
        self.options.finish(AutomationParams::Data(action))
    }
}

#[derive(Debug, Default)]
pub struct WorkflowBuilder {
    steps: Vec<AutomationTask>,
    mode: WorkflowMode,
    condition: WorkflowCondition,
    continue_on_error: bool,
    options: Options,
}

impl WorkflowBuilder {
    pub fn add_step(mut self, step: AutomationTask) -> Self {
        self.steps.push(step);
        self
    }

    pub fn run_sequential(mut self) -> Self {
        self.mode = WorkflowMode::Sequential;
        self
    }

    pub fn run_parallel(mut self) -> Self {
        self.mode = WorkflowMode::Parallel;
        self
    }

    /// Each step after the first runs only while `condition` holds on the
    /// result of the step before it.
    pub fn run_conditional(mut self, condition: WorkflowCondition) -> Self {
        self.mode = WorkflowMode::Conditional;
        self.condition = condition;
        self
    }

    pub fn continue_on_error(mut self, enabled: bool) -> Self {
        self.continue_on_error = enabled;
        self
    }

    pub fn build(self) -> Result<AutomationTask, BuilderError> {
        if self.steps.is_empty() {
            return Err(BuilderError::EmptyWorkflow);
        }
        self.options.finish(AutomationParams::Workflow(Workflow {
            mode: self.mode,
            steps: self.steps,
            continue_on_error: self.continue_on_error,
            condition: self.condition,
        }))
    }
}

#[derive(Debug, Default)]
pub struct LearningBuilder {
    action: Option<LearningAction>,
    options: Options,
}

impl LearningBuilder {
    pub fn learn_pattern(mut self, source_type: impl Into<String>, pattern_name: impl Into<String>) -> Self {
        self.action = Some(LearningAction::Pattern {
            source_type: source_type.into(),
            pattern_name: pattern_name.into(),
        });
        self
    }

    pub fn optimize_workflow(mut self, workflow_id: impl Into<String>) -> Self {
        self.action = Some(LearningAction::Optimization {
            workflow_id: workflow_id.into(),
        });
        self
    }

    pub fn analyze_behavior(mut self, behavior_type: impl Into<String>) -> Self {
        self.action = Some(LearningAction::Behavior {
            behavior_type: behavior_type.into(),
        });
        self
    }

    pub fn build(self) -> Result<AutomationTask, BuilderError> {
        let action = self.action.ok_or(BuilderError::MissingAction("learning"))?;
        self.options.finish(AutomationParams::Learning(action))
    }
}
