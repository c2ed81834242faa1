use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use futures::future::{join_all, BoxFuture};
use image::RgbaImage;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::task::*;
use super::vision::{color_matches, locate_template, TextLocator};
use crate::data::{DataConfig, DataManager};
use crate::interaction::{Action, ComputerInteractionSystem, MouseButton};
use crate::process::ProcessManager;

const RETRY_PAUSE: Duration = Duration::from_secs(1);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

async fn load_image(path: &Path) -> anyhow::Result<RgbaImage> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read template {}", path.display()))?;
    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}

fn check_conditions(conditions: &BTreeMap<String, Value>, result: &Value) -> anyhow::Result<()> {
    for (name, expected) in conditions {
        match result.get(name) {
            Some(actual) if actual == expected => {}
            actual => bail!("condition '{}' not met: expected {}, got {}", name, expected, actual.unwrap_or(&Value::Null)),
        }
    }
    Ok(())
}

/// Runs [`AutomationTask`]s against the interaction, process and data layers.
pub struct AutomationSystem {
    interaction: Arc<ComputerInteractionSystem>,
    processes: ProcessManager,
    data: Arc<DataManager>,
    text_locator: Option<Arc<dyn TextLocator>>,
    retry_pause: Duration,
    poll_interval: Duration,
}

impl AutomationSystem {
    pub fn new(interaction: Arc<ComputerInteractionSystem>, processes: ProcessManager, data: Arc<DataManager>) -> Self {
        Self {
            interaction,
            processes,
            data,
            text_locator: None,
            retry_pause: RETRY_PAUSE,
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_text_locator(mut self, locator: Arc<dyn TextLocator>) -> Self {
        self.text_locator = Some(locator);
        self
    }

    pub fn with_retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn processes(&self) -> &ProcessManager {
        &self.processes
    }

    pub fn data(&self) -> &Arc<DataManager> {
        &self.data
    }

    /// Up to `retries + 1` attempts, each bounded by the task timeout.
    pub fn execute_task<'a>(&'a self, task: &'a AutomationTask) -> BoxFuture<'a, AutomationOutcome> {
        Box::pin(async move {
            let allowed = task.retries.saturating_add(1);
            if let Some(secs) = task.invalid_timeout() {
                error!("Rejected {:?} task with invalid timeout {}", task.kind(), secs);
                return AutomationOutcome {
                    success: false,
                    result: None,
                    error: Some(format!("invalid timeout: {secs}")),
                    attempts: 0,
                };
            }
            let timeout = timeout_duration(task.timeout_secs).unwrap_or(Duration::ZERO);
            let mut last_error = String::new();

            for attempt in 1..=allowed {
                let outcome = match tokio::time::timeout(timeout, self.run(&task.params)).await {
                    Ok(Ok(result)) => check_conditions(&task.conditions, &result).map(|()| result),
                    Ok(Err(e)) => Err(e),
                    Err(_) => Err(anyhow!("task timed out after {:?}", timeout)),
                };

                match outcome {
                    Ok(result) => {
                        debug!("{:?} task succeeded on attempt {}", task.kind(), attempt);
                        return AutomationOutcome {
                            success: true,
                            result: Some(result),
                            error: None,
                            attempts: attempt,
                        };
                    }
                    Err(e) => {
                        last_error = format!("{e:#}");
                        error!("Task execution failed (attempt {}/{}): {}", attempt, allowed, last_error);
                    }
                }

                if attempt < allowed {
                    tokio::time::sleep(self.retry_pause).await;
                }
            }

            AutomationOutcome {
                success: false,
                result: None,
                error: Some(last_error),
                attempts: allowed,
            }
        })
    }

    async fn run(&self, params: &AutomationParams) -> anyhow::Result<Value> {
        match params {
            AutomationParams::Ui(action) => self.run_ui(action).await,
            AutomationParams::Process(action) => self.run_process(action).await,
            AutomationParams::Data(action) => self.run_data(action).await,
            AutomationParams::Workflow(workflow) => self.run_workflow(workflow).await,
            AutomationParams::Learning(action) => Ok(run_learning(action)),
        }
    }

    async fn perform(&self, action: Action) -> anyhow::Result<()> {
        self.interaction.try_execute(&action).await?;
        Ok(())
    }

    async fn click(&self, (x, y): (u32, u32)) -> anyhow::Result<Value> {
        let (x, y) = (i32::try_from(x)?, i32::try_from(y)?);
        self.perform(Action::Mouse {
            x,
            y,
            click: true,
            button: MouseButton::Left,
        })
        .await?;
        Ok(json!({ "status": "completed", "x": x, "y": y }))
    }

    fn capture(&self) -> anyhow::Result<RgbaImage> {
        Ok(self.interaction.driver().capture_screen()?)
    }

    async fn run_ui(&self, action: &UiAction) -> anyhow::Result<Value> {
        match action {
            UiAction::ClickImage { template, confidence } => {
                let template_image = load_image(template).await?;
                let screen = self.capture()?;
                let at = locate_template(&screen, &template_image, *confidence)
                    .ok_or_else(|| anyhow!("image {} not found", template.display()))?;
                self.click(at).await
            }
            UiAction::ClickText { text, partial_match } => {
                let locator = self
                    .text_locator
                    .as_ref()
                    .ok_or_else(|| anyhow!("no text locator configured"))?;
                let screen = self.capture()?;
                let at = locator
                    .locate(&screen, text, *partial_match)
                    .ok_or_else(|| anyhow!("text '{}' not found", text))?;
                self.click(at).await
            }
            UiAction::Click { x, y, button } => {
                self.perform(Action::Mouse {
                    x: *x,
                    y: *y,
                    click: true,
                    button: *button,
                })
                .await?;
                Ok(json!({ "status": "completed" }))
            }
            UiAction::TypeText { text } => {
                self.perform(Action::Keyboard { text: text.clone() }).await?;
                Ok(json!({ "status": "completed" }))
            }
            UiAction::PressKeys { keys } => {
                self.perform(Action::Hotkey { keys: keys.clone() }).await?;
                Ok(json!({ "status": "completed" }))
            }
            UiAction::MoveMouse { x, y } => {
                self.perform(Action::Mouse {
                    x: *x,
                    y: *y,
                    click: false,
                    button: MouseButton::Left,
                })
                .await?;
                Ok(json!({ "status": "completed" }))
            }
            UiAction::Scroll { amount } => {
                self.interaction.driver().scroll(*amount)?;
                Ok(json!({ "status": "completed" }))
            }
            UiAction::CaptureScreen { save_to } => {
                let screen = self.capture()?;
                let (width, height) = screen.dimensions();
                if let Some(path) = save_to {
                    let path = path.clone();
                    let target = path.clone();
                    tokio::task::spawn_blocking(move || screen.save(target)).await??;
                    info!("Screen saved to {}", path.display());
                    return Ok(json!({ "width": width, "height": height, "saved_to": path }));
                }
                Ok(json!({ "width": width, "height": height }))
            }
            UiAction::WaitForImage {
                template,
                confidence,
                timeout_secs,
            } => {
                let wait = timeout_duration(*timeout_secs).ok_or_else(|| anyhow!("invalid wait timeout: {}", timeout_secs))?;
                let template_image = load_image(template).await?;
                let deadline = Instant::now() + wait;
                loop {
                    let screen = self.capture()?;
                    if let Some((x, y)) = locate_template(&screen, &template_image, *confidence) {
                        return Ok(json!({ "found": true, "x": x, "y": y }));
                    }
                    if Instant::now() >= deadline {
                        bail!("image {} did not appear within {}s", template.display(), timeout_secs);
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
            UiAction::WaitForColor {
                x,
                y,
                color,
                tolerance,
                timeout_secs,
            } => {
                let wait = timeout_duration(*timeout_secs).ok_or_else(|| anyhow!("invalid wait timeout: {}", timeout_secs))?;
                let deadline = Instant::now() + wait;
                loop {
                    let screen = self.capture()?;
                    if color_matches(&screen, *x, *y, *color, *tolerance) {
                        return Ok(json!({ "found": true }));
                    }
                    if Instant::now() >= deadline {
                        bail!("color {:?} did not appear at ({}, {}) within {}s", color, x, y, timeout_secs);
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    async fn command(&self, program: &str, args: &[String]) -> anyhow::Result<Value> {
        let joined = std::iter::once(program)
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        if !self.interaction.safety().is_safe_command(&joined) {
            bail!("unsafe command rejected: {}", joined);
        }
        let output = self.processes.run_command(program, args, None).await?;
        if !output.success {
            bail!("{} exited with {:?}: {}", program, output.code, output.stderr.trim());
        }
        Ok(serde_json::to_value(output)?)
    }

    async fn run_process(&self, action: &ProcessAction) -> anyhow::Result<Value> {
        match action {
            ProcessAction::Command { command, args } => self.command(command, args).await,
            ProcessAction::Service { service_name, action } => {
                let verb = match action {
                    ServiceAction::Start => "start",
                    ServiceAction::Stop => "stop",
                };
                let program = if cfg!(windows) { "sc" } else { "systemctl" };
                self.command(program, &[verb.to_string(), service_name.clone()]).await
            }
            ProcessAction::Script {
                script_path,
                interpreter,
                args,
            } => {
                let script = script_path.to_string_lossy().into_owned();
                match interpreter {
                    Some(interpreter) => {
                        let mut full = vec![script];
                        full.extend(args.iter().cloned());
                        self.command(interpreter, &full).await
                    }
                    None => self.command(&script, args).await,
                }
            }
            ProcessAction::Monitor { process_name } => {
                let stats = self.processes.probe(process_name);
                Ok(json!({
                    "process_name": process_name,
                    "running": stats.is_some(),
                    "cpu_usage": stats.as_ref().map_or(0.0, |s| s.cpu_percent),
                    "memory_usage": stats.as_ref().map_or(0.0, |s| s.memory_percent),
                    "num_threads": stats.as_ref().and_then(|s| s.num_threads),
                }))
            }
            ProcessAction::Start { config } => {
                let joined = std::iter::once(config.command.as_str())
                    .chain(config.args.iter().map(String::as_str))
                    .collect::<Vec<_>>()
                    .join(" ");
                if !self.interaction.safety().is_safe_command(&joined) {
                    bail!("unsafe command rejected: {}", joined);
                }
                let name = config.name.clone();
                let started = self.processes.start_process(config.clone()).await?;
                Ok(json!({ "name": name, "started": started, "pid": self.processes.pid(&name) }))
            }
            ProcessAction::Stop { name, force } => {
                let stopped = self.processes.stop_process(name, *force).await;
                if !stopped {
                    bail!("process '{}' not found", name);
                }
                Ok(json!({ "name": name, "stopped": true }))
            }
        }
    }

    async fn run_data(&self, action: &DataAction) -> anyhow::Result<Value> {
        match action {
            DataAction::Read { source, config } => {
                let records = self.data.read_data(source, config).await?;
                Ok(json!({ "count": records.len(), "records": records }))
            }
            DataAction::Write { records, target, config } => {
                self.data.write_data(records, target, config).await?;
                Ok(json!({ "count": records.len(), "target": target }))
            }
            DataAction::Fetch { url, save_to } => {
                let text = self.data.fetch_text(url).await?;
                if let Some(path) = save_to {
                    tokio::fs::write(path, &text).await?;
                    return Ok(json!({ "bytes": text.len(), "saved_to": path }));
                }
                Ok(json!({ "bytes": text.len(), "content": text }))
            }
            DataAction::Transform { input, output, config } => {
                let records = self.data.read_data(input, config).await?;
                self.data.write_data(&records, output, &DataConfig::default()).await?;
                Ok(json!({ "count": records.len(), "output": output }))
            }
            DataAction::Validate { source, config } => {
                let records = self.data.read_data(source, config).await?;
                Ok(json!({ "valid": true, "count": records.len() }))
            }
            DataAction::Sync {
                source,
                destination,
                patterns,
            } => {
                let copied = self.data.sync_folders(source, destination, patterns).await?;
                Ok(json!({ "copied": copied }))
            }
            DataAction::Monitor {
                path,
                pattern,
                timeout_secs,
            } => {
                let wait = timeout_duration(*timeout_secs).ok_or_else(|| anyhow!("invalid watch timeout: {}", timeout_secs))?;
                let mut changes = self.data.watch_file(path.clone(), self.poll_interval);
                let deadline = tokio::time::sleep(wait);
                tokio::pin!(deadline);

                let matched = loop {
                    tokio::select! {
                        _ = &mut deadline => break false,
                        change = changes.recv() => {
                            let Some(change) = change else { break false };
                            let text = tokio::fs::read_to_string(&change.path).await.unwrap_or_default();
                            if text.contains(pattern.as_str()) {
                                break true;
                            }
                        }
                    }
                };
                self.data.stop_watching(path);
                if !matched {
                    warn!("Pattern '{}' not seen in {} before timeout", pattern, path.display());
                }
                Ok(json!({ "pattern_matched": matched, "path": path }))
            }
        }
    }

    async fn run_workflow(&self, workflow: &Workflow) -> anyhow::Result<Value> {
        let mut results: Vec<AutomationOutcome> = Vec::new();

        match workflow.mode {
            WorkflowMode::Sequential => {
                for step in &workflow.steps {
                    let outcome = self.execute_task(step).await;
                    let failed = !outcome.success;
                    results.push(outcome);
                    if failed && !workflow.continue_on_error {
                        break;
                    }
                }
            }
            WorkflowMode::Parallel => {
                results = join_all(workflow.steps.iter().map(|s| self.execute_task(s))).await;
            }
            WorkflowMode::Conditional => {
                for step in &workflow.steps {
                    if let Some(previous) = results.last() {
                        let previous = previous.result.clone().unwrap_or(Value::Null);
                        if !workflow.condition.holds(&previous) {
                            debug!("Workflow condition not met, stopping");
                            break;
                        }
                    }
                    let outcome = self.execute_task(step).await;
                    let failed = !outcome.success;
                    results.push(outcome);
                    if failed && !workflow.continue_on_error {
                        break;
                    }
                }
            }
        }

        let all_succeeded = results.len() == workflow.steps.len() && results.iter().all(|r| r.success);
        let failures = results.iter().filter(|r| !r.success).count();
        if failures > 0 && !workflow.continue_on_error {
            bail!("{} of {} workflow steps failed", failures, workflow.steps.len());
        }
        Ok(json!({
            "completed": all_succeeded,
            "steps_run": results.len(),
            "results": results,
        }))
    }

    pub async fn cleanup(&self) {
        self.processes.cleanup().await;
        self.data.cleanup().await;
        info!("Automation system cleaned up");
    }
}

fn run_learning(action: &LearningAction) -> Value {
    let mut result = serde_json::to_value(action).unwrap_or_else(|_| json!({}));
    if let Some(obj) = result.as_object_mut() {
        obj.insert("status".to_string(), json!("learning_completed"));
    }
    result
}

impl std::fmt::Debug for AutomationSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomationSystem")
            .field("retry_pause", &self.retry_pause)
            .field("text_locator", &self.text_locator.is_some())
            .finish_non_exhaustive()
    }
}
