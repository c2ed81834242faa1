use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::action::{Action, FileOperation, InteractionType};
use super::driver::DesktopDriver;
use super::gesture::{gaussian, natural_curve};
use super::metrics::{InteractionMetrics, MetricsSummary};
use super::InteractionError;
use crate::personality::PersonalitySystem;
use crate::security::safety::{RateLimiter, SafetyPolicy};

pub const SHELL_TIMEOUT: Duration = Duration::from_secs(30);
const CLICK_SETTLE: Duration = Duration::from_millis(100);
const MAX_HISTORY: usize = 1000;

/// Run `command` through the platform shell; success means exit code 0.
pub(crate) async fn run_shell(command: &str, timeout: Duration) -> Result<String, InteractionError> {
    let mut cmd = if cfg!(windows) {
        let mut c = tokio::process::Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = tokio::process::Command::new("sh");
        c.arg("-c").arg(command);
        c
    };
    cmd.kill_on_drop(true);

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| InteractionError::Timeout(timeout))??;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(InteractionError::CommandFailed {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

pub struct ComputerInteractionSystem {
    driver: Arc<dyn DesktopDriver>,
    safety: SafetyPolicy,
    limiter: Mutex<RateLimiter>,
    metrics: Mutex<BTreeMap<InteractionType, InteractionMetrics>>,
    history: Mutex<Vec<Value>>,
    personality: Option<Arc<Mutex<PersonalitySystem>>>,
    rng: Mutex<StdRng>,
    http: reqwest::Client,
    history_path: Option<PathBuf>,
}

impl ComputerInteractionSystem {
    pub fn new(driver: Arc<dyn DesktopDriver>, safety: SafetyPolicy) -> Self {
        let limiter = RateLimiter::new(safety.rate_limits);
        Self::with_limiter(driver, safety, limiter)
    }

    pub fn with_limiter(driver: Arc<dyn DesktopDriver>, safety: SafetyPolicy, limiter: RateLimiter) -> Self {
        let metrics = InteractionType::ALL
            .into_iter()
            .map(|t| (t, InteractionMetrics::default()))
            .collect();
        info!("ComputerInteractionSystem initialized");
        Self {
            driver,
            safety,
            limiter: Mutex::new(limiter),
            metrics: Mutex::new(metrics),
            history: Mutex::new(Vec::new()),
            personality: None,
            rng: Mutex::new(StdRng::from_entropy()),
            http: reqwest::Client::new(),
            history_path: None,
        }
    }

    /// Pace typing and multi-step actions by this personality.
    pub fn with_personality(mut self, personality: Arc<Mutex<PersonalitySystem>>) -> Self {
        self.personality = Some(personality);
        self
    }

    pub fn with_rng(self, rng: StdRng) -> Self {
        *self.rng.lock().unwrap_or_else(|e| e.into_inner()) = rng;
        self
    }

    pub fn with_history_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_path = Some(path.into());
        self
    }

    pub fn driver(&self) -> &Arc<dyn DesktopDriver> {
        &self.driver
    }

    pub fn safety(&self) -> &SafetyPolicy {
        &self.safety
    }

    /// Execute and report success. Failures are logged, never raised.
    pub async fn execute_action(&self, action: &Action) -> bool {
        match self.try_execute(action).await {
            Ok(()) => true,
            Err(e) => {
                error!("Action execution failed: {}", e);
                false
            }
        }
    }

    /// Like [`ComputerInteractionSystem::execute_action`] but keeps the error.
    pub async fn try_execute(&self, action: &Action) -> Result<(), InteractionError> {
        let kind = action.interaction_type();
        let allowed = self
            .limiter
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .try_acquire(kind);
        if !allowed {
            return Err(InteractionError::RateLimited(kind));
        }

        let started = Instant::now();
        let result = self.dispatch(action).await;
        let elapsed = started.elapsed().as_secs_f64();
        let now = Utc::now();

        self.metrics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(kind)
            .or_default()
            .record(result.is_ok(), elapsed, now);

        {
            let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
            if history.len() >= MAX_HISTORY {
                history.remove(0);
            }
            history.push(json!({
                "timestamp": now.to_rfc3339(),
                "action": action,
                "success": result.is_ok(),
                "duration": elapsed,
                "error": result.as_ref().err().map(|e| e.to_string()),
            }));
        }

        result
    }

    async fn dispatch(&self, action: &Action) -> Result<(), InteractionError> {
        match action {
            Action::Mouse { x, y, click, button } => {
                let (width, height) = self.driver.screen_size()?;
                let inside = (0..=width as i64).contains(&(*x as i64)) && (0..=height as i64).contains(&(*y as i64));
                if !inside {
                    return Err(InteractionError::OutOfBounds {
                        x: *x,
                        y: *y,
                        width,
                        height,
                    });
                }
                self.driver.move_mouse(*x, *y)?;
                if *click {
                    tokio::time::sleep(CLICK_SETTLE).await;
                    self.driver.click(*button)?;
                }
                Ok(())
            }
            Action::Keyboard { text } => {
                if !self.safety.is_safe_content(text) {
                    return Err(InteractionError::UnsafeContent);
                }
                self.driver.type_text(text)
            }
            Action::Hotkey { keys } => {
                if keys.is_empty() {
                    return Err(InteractionError::EmptyAction("hotkey"));
                }
                self.driver.press_keys(keys)
            }
            Action::System { command } => {
                self.check_command(command)?;
                let stdout = run_shell(command, SHELL_TIMEOUT).await?;
                debug!("Command output: {}", stdout.trim());
                Ok(())
            }
            Action::Web { url } => {
                if !self.safety.is_safe_url(url) {
                    return Err(InteractionError::UnsafeUrl(url.clone()));
                }
                let response = self.http.get(url).send().await?;
                let status = response.status();
                if status.is_success() {
                    Ok(())
                } else {
                    Err(InteractionError::HttpStatus(status.as_u16()))
                }
            }
            Action::File { path, operation, content } => {
                let shown = path.to_string_lossy();
                if !self.safety.is_safe_path(&shown) {
                    return Err(InteractionError::UnsafePath(shown.into_owned()));
                }
                match operation {
                    FileOperation::Read => {
                        let text = tokio::fs::read_to_string(path).await?;
                        debug!("Read {} bytes from {}", text.len(), shown);
                    }
                    FileOperation::Write => {
                        let content = content.as_deref().unwrap_or_default();
                        if !self.safety.is_safe_content(content) {
                            return Err(InteractionError::UnsafeContent);
                        }
                        tokio::fs::write(path, content).await?;
                    }
                }
                Ok(())
            }
            Action::Gesture { points } => {
                if points.is_empty() {
                    return Err(InteractionError::EmptyAction("gesture"));
                }
                let curve = {
                    let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
                    natural_curve(points, &mut *rng)
                };
                for (x, y) in curve {
                    self.driver.move_mouse(x.round() as i32, y.round() as i32)?;
                }
                Ok(())
            }
            Action::KeySequence { sequence } => {
                if sequence.is_empty() {
                    return Err(InteractionError::EmptyAction("key sequence"));
                }
                for key in sequence {
                    if !self.safety.is_safe_content(key) {
                        return Err(InteractionError::UnsafeContent);
                    }
                    self.driver.type_text(key)?;
                    self.pause_typing().await;
                }
                Ok(())
            }
            Action::SystemSequence { commands } => {
                if commands.is_empty() {
                    return Err(InteractionError::EmptyAction("system sequence"));
                }
                for command in commands {
                    self.pause_between_actions().await;
                    self.check_command(command)?;
                    run_shell(command, SHELL_TIMEOUT).await?;
                }
                Ok(())
            }
        }
    }

    fn check_command(&self, command: &str) -> Result<(), InteractionError> {
        if command.trim().is_empty() {
            return Err(InteractionError::EmptyAction("system"));
        }
        if !self.safety.is_safe_command(command) {
            return Err(InteractionError::UnsafeCommand(command.to_string()));
        }
        Ok(())
    }

    async fn pause_typing(&self) {
        let Some(personality) = &self.personality else { return };
        let base = personality.lock().unwrap_or_else(|e| e.into_inner()).typing_interval();
        let jitter = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            gaussian(&mut *rng, 0.1)
        };
        let secs = (base * (1.0 + jitter)).max(0.0);
        tokio::time::sleep(Duration::try_from_secs_f64(secs).unwrap_or_default()).await;
    }

    async fn pause_between_actions(&self) {
        let Some(personality) = &self.personality else { return };
        let secs = personality.lock().unwrap_or_else(|e| e.into_inner()).action_delay(1.0);
        tokio::time::sleep(Duration::try_from_secs_f64(secs).unwrap_or_default()).await;
    }

    pub fn metrics_summary(&self) -> BTreeMap<InteractionType, MetricsSummary> {
        self.metrics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(k, m)| (*k, m.summary()))
            .collect()
    }

    pub fn history(&self) -> Vec<Value> {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Persist the action history when a history path is configured.
    pub async fn cleanup(&self) -> Result<(), InteractionError> {
        if let Some(path) = &self.history_path {
            let history = self.history();
            let body = serde_json::to_vec_pretty(&history).map_err(std::io::Error::other)?;
            tokio::fs::write(path, body).await?;
            info!("Interaction history written to {}", path.display());
        } else {
            warn!("No history path configured, interaction history discarded");
        }
        info!("ComputerInteractionSystem cleaned up");
        Ok(())
    }
}
