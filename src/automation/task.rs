use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::data::DataConfig;
use crate::interaction::MouseButton;
use crate::process::ProcessConfig;

pub const DEFAULT_TIMEOUT_SECS: f64 = 60.0;
pub const DEFAULT_RETRIES: u32 = 3;
/// Upper bound for any task or wait timeout: one day.
pub const MAX_TIMEOUT_SECS: f64 = 86_400.0;

/// `secs` as a [`Duration`], or `None` unless it lies in `[0, MAX_TIMEOUT_SECS]`.
pub fn timeout_duration(secs: f64) -> Option<Duration> {
    if !(0.0..=MAX_TIMEOUT_SECS).contains(&secs) {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}

fn default_timeout() -> f64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

fn default_confidence() -> f32 {
    0.9
}

fn default_wait() -> f64 {
    10.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationKind {
    Ui,
    Process,
    Data,
    Workflow,
    Learning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationTask {
    pub params: AutomationParams,
    #[serde(default = "default_timeout")]
    pub timeout_secs: f64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Fields the result must carry with exactly these values for an attempt
    /// to count as a success.
    #[serde(default)]
    pub conditions: BTreeMap<String, Value>,
}

impl AutomationTask {
    pub fn new(params: AutomationParams) -> Self {
        Self {
            params,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retries: DEFAULT_RETRIES,
            conditions: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> AutomationKind {
        self.params.kind()
    }

    /// First timeout in this task or its workflow steps that is not finite,
    /// not positive (waits may be zero) or above [`MAX_TIMEOUT_SECS`].
    pub fn invalid_timeout(&self) -> Option<f64> {
        if !(self.timeout_secs > 0.0 && timeout_duration(self.timeout_secs).is_some()) {
            return Some(self.timeout_secs);
        }
        match &self.params {
            AutomationParams::Ui(UiAction::WaitForImage { timeout_secs, .. })
            | AutomationParams::Ui(UiAction::WaitForColor { timeout_secs, .. })
            | AutomationParams::Data(DataAction::Monitor { timeout_secs, .. }) => {
                timeout_duration(*timeout_secs).is_none().then_some(*timeout_secs)
            }
            AutomationParams::Process(ProcessAction::Start { config }) => config
                .timeout
                .filter(|secs| timeout_duration(*secs).is_none()),
            AutomationParams::Workflow(workflow) => workflow.steps.iter().find_map(AutomationTask::invalid_timeout),
            _ => None,
        }
    }
}

/// Serialized as `{"type": <kind>, "parameters": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "parameters", rename_all = "snake_case")]
pub enum AutomationParams {
    Ui(UiAction),
    Process(ProcessAction),
    Data(DataAction),
    Workflow(Workflow),
    Learning(LearningAction),
}

impl AutomationParams {
    pub fn kind(&self) -> AutomationKind {
        match self {
            AutomationParams::Ui(_) => AutomationKind::Ui,
            AutomationParams::Process(_) => AutomationKind::Process,
            AutomationParams::Data(_) => AutomationKind::Data,
            AutomationParams::Workflow(_) => AutomationKind::Workflow,
            AutomationParams::Learning(_) => AutomationKind::Learning,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UiAction {
    ClickImage {
        template: PathBuf,
        #[serde(default = "default_confidence")]
        confidence: f32,
    },
    ClickText {
        text: String,
        #[serde(default)]
        partial_match: bool,
    },
    Click {
        x: i32,
        y: i32,
        #[serde(default)]
        button: MouseButton,
    },
    TypeText {
        text: String,
    },
    PressKeys {
        keys: Vec<String>,
    },
    MoveMouse {
        x: i32,
        y: i32,
    },
    Scroll {
        amount: i32,
    },
    CaptureScreen {
        #[serde(default)]
        save_to: Option<PathBuf>,
    },
    WaitForImage {
        template: PathBuf,
        #[serde(default = "default_confidence")]
        confidence: f32,
        #[serde(default = "default_wait")]
        timeout_secs: f64,
    },
    WaitForColor {
        x: u32,
        y: u32,
        color: [u8; 3],
        #[serde(default)]
        tolerance: u8,
        #[serde(default = "default_wait")]
        timeout_secs: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceAction {
    Start,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "process_type", rename_all = "snake_case")]
pub enum ProcessAction {
    Command {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
    Service {
        service_name: String,
        action: ServiceAction,
    },
    Script {
        script_path: PathBuf,
        /// Runs the script directly when absent.
        #[serde(default)]
        interpreter: Option<String>,
        #[serde(default)]
        args: Vec<String>,
    },
    /// Result carries `running`, `cpu_usage` and `memory_usage`.
    Monitor {
        process_name: String,
    },
    Start {
        config: ProcessConfig,
    },
    Stop {
        name: String,
        #[serde(default)]
        force: bool,
    },
}

fn default_watch_secs() -> f64 {
    60.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "data_type", rename_all = "snake_case")]
pub enum DataAction {
    Read {
        source: String,
        #[serde(default)]
        config: DataConfig,
    },
    Write {
        records: Vec<Value>,
        target: PathBuf,
        #[serde(default)]
        config: DataConfig,
    },
    Fetch {
        url: String,
        #[serde(default)]
        save_to: Option<PathBuf>,
    },
    /// Read `input` through `config` and write the result to `output`.
    Transform {
        input: String,
        output: PathBuf,
        #[serde(default)]
        config: DataConfig,
    },
    Validate {
        source: String,
        #[serde(default)]
        config: DataConfig,
    },
    Sync {
        source: PathBuf,
        destination: PathBuf,
        #[serde(default)]
        patterns: Vec<String>,
    },
    /// Result carries `pattern_matched`: whether the file changed to contain
    /// `pattern` before `timeout_secs` ran out.
    Monitor {
        path: PathBuf,
        pattern: String,
        #[serde(default = "default_watch_secs")]
        timeout_secs: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowMode {
    #[default]
    Sequential,
    Parallel,
    Conditional,
}

/// Gate for conditional workflows, evaluated on the previous step's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "when", rename_all = "snake_case")]
pub enum WorkflowCondition {
    #[default]
    Always,
    FieldGreaterThan {
        field: String,
        threshold: f64,
    },
    FieldTrue {
        field: String,
    },
}

impl WorkflowCondition {
    pub fn holds(&self, result: &Value) -> bool {
        match self {
            WorkflowCondition::Always => true,
            WorkflowCondition::FieldGreaterThan { field, threshold } => result
                .get(field)
                .and_then(Value::as_f64)
                .is_some_and(|v| v > *threshold),
            WorkflowCondition::FieldTrue { field } => result.get(field).and_then(Value::as_bool).unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default)]
    pub mode: WorkflowMode,
    pub steps: Vec<AutomationTask>,
    #[serde(default)]
    pub continue_on_error: bool,
    #[serde(default)]
    pub condition: WorkflowCondition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "learning_type", rename_all = "snake_case")]
pub enum LearningAction {
    Pattern { source_type: String, pattern_name: String },
    Optimization { workflow_id: String },
    Behavior { behavior_type: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationOutcome {
    pub success: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    pub attempts: u32,
}
