//! The orchestrator: validates, authorizes, schedules and executes tasks,
//! then scores the outcome and learns from it.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::automation::{
    AutomationParams, AutomationSystem, AutomationTask, DataAction, Workflow, WorkflowMode, MAX_TIMEOUT_SECS,
};
use crate::config::AliceConfig;
use crate::data::DataManager;
use crate::error::{AliceError, Result};
use crate::genetics::{Gene, GeneticRuleSystem, Rule, DEFAULT_POPULATION};
use crate::improvement::SelfImprovement;
use crate::interaction::{ComputerInteractionSystem, DesktopDriver};
use crate::kernel::bus::EventManager;
use crate::kernel::event::{topics, EventPriority};
use crate::kernel::scheduler::{ScheduledTask, TaskScheduler};
use crate::kernel::state::{MetricsUpdate, OperationalStatus, StateManager, StateSummary, StateUpdate};
use crate::monitor::{MetricPoint, SysinfoProbe, SystemMonitor, SystemProbe};
use crate::personality::{Experience, PersonalitySummary, PersonalitySystem};
use crate::process::ProcessManager;
use crate::security::{SecurityContext, SecurityLevel, SecurityManager};
use crate::services::llm::{Completion, LlmService};
use crate::services::{HealthReport, Service};
use crate::utility::UtilityManager;
use crate::validation::{
    AutomationSpec, GenericSpec, InteractionSpec, LearningSpec, SystemSpec, Task, TaskKind, ValidationError,
    ValidationManager,
};

/// What [`Alice::process_task`] reports back for every task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: String,
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
    /// Utility after this task; the last known score when the task failed.
    pub utility: Option<f64>,
    pub execution_time: f64,
    pub timestamp: DateTime<Utc>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct Alice {
    config: AliceConfig,
    events: EventManager,
    state: Mutex<StateManager>,
    utility: Mutex<UtilityManager>,
    security: SecurityManager,
    monitor: SystemMonitor,
    validation: ValidationManager,
    scheduler: Mutex<TaskScheduler<Task>>,
    personality: Arc<Mutex<PersonalitySystem>>,
    genetics: Mutex<GeneticRuleSystem>,
    interaction: Arc<ComputerInteractionSystem>,
    automation: AutomationSystem,
    llm: Arc<LlmService>,
    improvement: Option<SelfImprovement>,
}

impl Alice {
    /// Wire every component with the host probe and the configured LLM.
    /// Self-improvement stays off when no API key is available.
    pub fn new(config: AliceConfig, driver: Arc<dyn DesktopDriver>) -> Self {
        let llm = Arc::new(LlmService::new(config.llm.clone()));
        let completion: Option<Arc<dyn Completion>> = if llm.has_key() {
            Some(llm.clone())
        } else {
            warn!("No API key for {:?}, self-improvement disabled", llm.provider());
            None
        };
        Self::assemble(config, driver, Arc::new(SysinfoProbe::new()), llm, completion)
    }

    /// Like [`Alice::new`] with an explicit probe and completion backend.
    pub fn with_components(
        config: AliceConfig,
        driver: Arc<dyn DesktopDriver>,
        probe: Arc<dyn SystemProbe>,
        completion: Option<Arc<dyn Completion>>,
    ) -> Self {
        let llm = Arc::new(LlmService::new(config.llm.clone()));
        Self::assemble(config, driver, probe, llm, completion)
    }

    fn assemble(
        config: AliceConfig,
        driver: Arc<dyn DesktopDriver>,
        probe: Arc<dyn SystemProbe>,
        llm: Arc<LlmService>,
        completion: Option<Arc<dyn Completion>>,
    ) -> Self {
        let events = EventManager::new();

        let mut state = StateManager::new(config.emotions.0.clone());
        state.update(StateUpdate::new().metrics(MetricsUpdate {
            cpu_usage: Some(config.resources.cpu_usage),
            memory_usage: Some(config.resources.memory_usage),
            ..MetricsUpdate::default()
        }));

        let mut utility = UtilityManager::new(config.utility.threshold);
        if let Err(e) = utility.adjust_weights(config.utility.weights.clone()) {
            warn!("Ignoring configured utility weights: {}", e);
        }

        let personality = Arc::new(Mutex::new(PersonalitySystem::new("Alice")));
        let interaction = Arc::new(
            ComputerInteractionSystem::new(driver, config.safety.clone()).with_personality(personality.clone()),
        );
        let automation = AutomationSystem::new(interaction.clone(), ProcessManager::new(), Arc::new(DataManager::new()));

        let improvement = completion
            .map(|llm| SelfImprovement::new(llm, config.limits.self_improvement(), events.clone()));

        info!("Alice system initialized");
        Self {
            security: SecurityManager::new(events.clone()),
            monitor: SystemMonitor::new(events.clone(), probe, config.monitor.clone()),
            validation: ValidationManager::new(config.safety.clone()),
            scheduler: Mutex::new(TaskScheduler::new()),
            genetics: Mutex::new(GeneticRuleSystem::new(DEFAULT_POPULATION)),
            llm,
            state: Mutex::new(state),
            utility: Mutex::new(utility),
            personality,
            interaction,
            automation,
            improvement,
            events,
            config,
        }
    }

    /// Start the bus and the monitor, install the security rules and
    /// announce startup.
    pub async fn initialize(&self) -> Result<()> {
        self.events.initialize()?;
        self.monitor.start();

        self.security.configure_operation("system.shutdown", SecurityLevel::Critical);
        self.security.configure_operation("automation.execute", SecurityLevel::High);
        self.security.configure_operation("data.modify", SecurityLevel::High);

        if let Err(e) = self.llm.initialize().await {
            warn!("LLM service failed to initialize: {}", e);
        }

        self.events.emit(
            topics::SYSTEM_STARTUP,
            json!({ "timestamp": Utc::now().to_rfc3339() }),
            EventPriority::High,
        );
        info!("Alice system startup completed");
        Ok(())
    }

    pub fn config(&self) -> &AliceConfig {
        &self.config
    }

    pub fn events(&self) -> &EventManager {
        &self.events
    }

    pub fn security(&self) -> &SecurityManager {
        &self.security
    }

    pub fn monitor(&self) -> &SystemMonitor {
        &self.monitor
    }

    pub fn interaction(&self) -> &Arc<ComputerInteractionSystem> {
        &self.interaction
    }

    pub fn automation(&self) -> &AutomationSystem {
        &self.automation
    }

    pub fn state_summary(&self) -> StateSummary {
        lock(&self.state).summary()
    }

    pub fn active_rules(&self) -> Vec<Rule> {
        lock(&self.state).active_rules().to_vec()
    }

    pub fn utility_history(&self, n: usize) -> Vec<f64> {
        lock(&self.utility).history(n)
    }

    pub fn personality_summary(&self) -> PersonalitySummary {
        lock(&self.personality).summary()
    }

    pub fn gene_count(&self) -> usize {
        lock(&self.genetics).len()
    }

    /// Collected host metrics, oldest first.
    pub fn system_metrics(&self) -> Vec<MetricPoint> {
        let collector = self.monitor.metrics();
        let collector = lock(&collector);
        collector.metrics(None, None, None)
    }

    pub async fn health(&self) -> Vec<HealthReport> {
        vec![self.llm.health_check().await]
    }

    /// Run one task document end to end. Never fails: problems are reported
    /// in the outcome and recorded in the state and the error tracker.
    pub async fn process_task(&self, data: &Value) -> TaskOutcome {
        let started = Instant::now();
        let fallback_id = data.get("id").and_then(Value::as_str).unwrap_or("unknown").to_string();

        match self.run_task(data, started).await {
            Ok((task_id, result, utility)) => TaskOutcome {
                task_id,
                success: true,
                result: Some(result),
                error: None,
                utility: Some(utility),
                execution_time: started.elapsed().as_secs_f64(),
                timestamp: Utc::now(),
            },
            Err(e) => {
                error!("Task processing failed: {}", e);
                self.record_failure(&fallback_id, &e);
                TaskOutcome {
                    task_id: fallback_id,
                    success: false,
                    result: None,
                    error: Some(e.to_string()),
                    utility: lock(&self.utility).latest(),
                    execution_time: started.elapsed().as_secs_f64(),
                    timestamp: Utc::now(),
                }
            }
        }
    }

    async fn run_task(&self, data: &Value, started: Instant) -> Result<(String, Value, f64)> {
        let task = self.validation.validate_task(data)?;
        let task_id = task.id().to_string();

        let source = data.get("source").and_then(Value::as_str).unwrap_or("system");
        let context = task
            .header
            .metadata
            .iter()
            .fold(SecurityContext::new(task.security_level(), source), |ctx, (k, v)| {
                ctx.with_metadata(k.clone(), v.clone())
            });
        self.security
            .validate_operation(&format!("{}.execute", task.kind.name()), &context)?;

        {
            let mut state = lock(&self.state);
            let total = state.metrics().total_tasks + 1;
            state.update(
                StateUpdate::new()
                    .status(OperationalStatus::Processing)
                    .current_task(Some(task_id.clone()))
                    .metrics(MetricsUpdate {
                        total_tasks: Some(total),
                        ..MetricsUpdate::default()
                    }),
            );
        }

        let next = {
            let mut scheduler = lock(&self.scheduler);
            let mut scheduled = ScheduledTask::new(task_id.clone(), task);
            if let Some(secs) = scheduled.payload.expected_duration() {
                scheduled = scheduled.with_expected_duration(secs);
            }
            scheduler.schedule(scheduled);
            scheduler.take(&task_id)
        };
        let task = next
            .map(|t| t.payload)
            .ok_or_else(|| AliceError::Unsupported("no task ready to run".to_string()))?;

        let limit = self.execution_limit(&task);
        let result = tokio::time::timeout(limit, self.execute(&task, &context))
            .await
            .map_err(|_| AliceError::Timeout(limit))??;

        let elapsed = started.elapsed().as_secs_f64();
        let utility = {
            let resources = self.latest_resources();
            let mut state = lock(&self.state);
            let completed = state.metrics().completed_tasks + 1;
            state.update(
                StateUpdate::new()
                    .status(OperationalStatus::Ready)
                    .current_task(None)
                    .emotion("joy", 0.05)
                    .metrics(MetricsUpdate {
                        completed_tasks: Some(completed),
                        cpu_usage: resources.map(|(cpu, _)| cpu),
                        memory_usage: resources.map(|(_, memory)| memory),
                        ..MetricsUpdate::default()
                    }),
            );
            state.record_task_duration(elapsed);
            state.add_interaction(
                "task",
                json!({ "task_id": task_id, "type": task.kind.name(), "success": true, "duration": elapsed }),
            );
            let score = lock(&self.utility).evaluate(&state);
            score
        };

        self.events.emit_from(
            topics::TASK_COMPLETED,
            json!({ "task_id": task_id, "type": task.kind.name(), "utility": utility }),
            EventPriority::Medium,
            "alice",
        );

        self.maybe_improve().await;
        Ok((task_id, result, utility))
    }

    /// Outer bound on a task's run. Automation tasks may ask for longer
    /// through `timeout_seconds`.
    fn execution_limit(&self, task: &Task) -> Duration {
        let limit = self.config.limits.task_execution();
        match &task.kind {
            TaskKind::Automation(spec) => spec
                .timeout_seconds
                .map(Duration::from_secs)
                .map_or(limit, |requested| limit.max(requested)),
            _ => limit,
        }
    }

    /// Host cpu and memory as fractions, from the monitor's latest samples.
    fn latest_resources(&self) -> Option<(f64, f64)> {
        let collector = self.monitor.metrics();
        let collector = lock(&collector);
        let cpu = collector.latest("cpu_usage")?.value / 100.0;
        let memory = collector.latest("memory_usage")?.value / 100.0;
        Some((cpu, memory))
    }

    async fn maybe_improve(&self) {
        let Some(improvement) = &self.improvement else {
            return;
        };
        if !lock(&self.utility).needs_improvement() {
            return;
        }
        debug!("Utility below threshold, starting self-improvement");
        if let Err(e) = improvement.improve(&self.state, &self.utility, &self.genetics).await {
            warn!("Self-improvement failed: {}", e);
            self.monitor.track_error(e.kind(), &e.to_string(), json!({ "stage": "self_improvement" }));
        }
    }

    fn record_failure(&self, task_id: &str, e: &AliceError) {
        self.monitor
            .track_error(e.kind(), &e.to_string(), json!({ "task_id": task_id }));
        {
            let mut state = lock(&self.state);
            let errors = state.metrics().error_count + 1;
            state.update(
                StateUpdate::new()
                    .status(OperationalStatus::Error)
                    .current_task(None)
                    .emotion("fear", 0.05)
                    .metrics(MetricsUpdate {
                        error_count: Some(errors),
                        ..MetricsUpdate::default()
                    }),
            );
        }
        self.events.emit_from(
            topics::TASK_FAILED,
            json!({ "task_id": task_id, "error": e.to_string(), "kind": e.kind() }),
            EventPriority::High,
            "alice",
        );
    }

    async fn execute(&self, task: &Task, context: &SecurityContext) -> Result<Value> {
        match &task.kind {
            TaskKind::Automation(spec) => self.execute_automation(spec, context).await,
            TaskKind::Interaction(spec) => self.execute_interaction(spec).await,
            TaskKind::Learning(spec) => self.execute_learning(spec),
            TaskKind::System(spec) => self.execute_system(spec).await,
            TaskKind::Generic(spec) => Ok(self.execute_generic(task.id(), spec)),
        }
    }

    async fn execute_automation(&self, spec: &AutomationSpec, context: &SecurityContext) -> Result<Value> {
        let mut steps = Vec::with_capacity(spec.actions.len());
        for action in &spec.actions {
            steps.push(automation_step(action)?);
        }

        let modifies_data = steps.iter().any(|s| {
            matches!(
                s.params,
                AutomationParams::Data(DataAction::Write { .. } | DataAction::Transform { .. } | DataAction::Sync { .. })
            )
        });
        if modifies_data {
            self.security.validate_operation("data.modify", context)?;
        }

        let mut task = AutomationTask::new(AutomationParams::Workflow(Workflow {
            mode: WorkflowMode::Sequential,
            steps,
            continue_on_error: false,
            condition: Default::default(),
        }));
        task.retries = 0;
        if let Some(secs) = spec.timeout_seconds {
            task.timeout_secs = secs as f64;
        }
        if let Some(value) = task.invalid_timeout() {
            return Err(ValidationError::InvalidTimeout {
                value,
                max: MAX_TIMEOUT_SECS,
            }
            .into());
        }

        info!("Running {} automation actions on {}", spec.actions.len(), spec.target_system);
        let outcome = self.automation.execute_task(&task).await;
        if !outcome.success {
            return Err(AliceError::Execution(outcome.error.unwrap_or_default()));
        }
        Ok(json!({ "target_system": spec.target_system, "outcome": outcome }))
    }

    async fn execute_interaction(&self, spec: &InteractionSpec) -> Result<Value> {
        let action = self.validation.validate_interaction_parameters(spec)?;
        let record = serde_json::to_value(&action).unwrap_or(Value::Null);

        if spec.require_confirmation {
            lock(&self.state).push_pending_action(record.clone());
            return Ok(json!({ "status": "pending_confirmation", "action": record }));
        }

        self.interaction.try_execute(&action).await?;
        lock(&self.state).add_interaction("interaction", record.clone());
        Ok(json!({ "status": "completed", "action": record }))
    }

    fn execute_learning(&self, spec: &LearningSpec) -> Result<Value> {
        let training = spec.training_data.clone().unwrap_or_default();
        let experience: Experience = training
            .iter()
            .filter_map(|(k, v)| v.as_f64().map(|n| (k.clone(), n)))
            .collect();

        let traits_updated = experience.len();
        if !experience.is_empty() {
            lock(&self.personality).update_from_experience(experience);
        }

        let rule = match training.get("rule") {
            Some(value) => Some(
                serde_json::from_value::<Rule>(value.clone())
                    .map_err(|e| ValidationError::InvalidLearningData(format!("invalid rule: {e}")))?,
            ),
            None => None,
        };
        let rule_added = rule.is_some();
        if let Some(rule) = rule {
            let mut state = lock(&self.state);
            state.add_rule(rule.clone());
            state.knowledge_mut().add_node(rule.action.clone(), json!({ "kind": "action" }));
            state
                .knowledge_mut()
                .add_edge(rule.condition.metric.clone(), rule.action.clone(), "triggers");
            lock(&self.genetics).add_gene(Gene::new(vec![rule], 1.0));
        }

        lock(&self.state).add_interaction(
            "learning",
            json!({ "learning_type": spec.learning_type, "traits_updated": traits_updated }),
        );
        Ok(json!({
            "learning_type": spec.learning_type,
            "traits_updated": traits_updated,
            "rule_added": rule_added,
            "personality": lock(&self.personality).summary(),
        }))
    }

    async fn execute_system(&self, spec: &SystemSpec) -> Result<Value> {
        let output = self
            .automation
            .processes()
            .run_command_with_env(
                &spec.command,
                &spec.args,
                &spec.environment,
                Some(self.config.limits.task_execution()),
            )
            .await?;
        if !output.success {
            return Err(AliceError::Execution(format!(
                "{} exited with {:?}: {}",
                spec.command,
                output.code,
                output.stderr.trim()
            )));
        }
        Ok(serde_json::to_value(output).unwrap_or(Value::Null))
    }

    fn execute_generic(&self, task_id: &str, spec: &GenericSpec) -> Value {
        let result = json!({
            "task_id": task_id,
            "status": "completed",
            "description": spec.description,
        });
        lock(&self.state).add_interaction("generic", result.clone());
        result
    }

    /// Stop background work and release resources.
    pub async fn cleanup(&self) -> Result<()> {
        self.events.emit(
            topics::SYSTEM_SHUTDOWN,
            json!({ "timestamp": Utc::now().to_rfc3339() }),
            EventPriority::High,
        );
        self.monitor.stop().await;
        self.automation.cleanup().await;
        if let Err(e) = self.interaction.cleanup().await {
            warn!("Interaction cleanup failed: {}", e);
        }
        if let Err(e) = self.llm.cleanup().await {
            warn!("LLM service cleanup failed: {}", e);
        }
        lock(&self.scheduler).clear();
        lock(&self.state).clear_pending_actions();
        // Give the shutdown event a chance to reach subscribers.
        self.events.bus().drain().await;
        self.events.cleanup().await;
        info!("Alice system cleanup completed");
        Ok(())
    }
}

/// An automation action document `{type, parameters, timeout?, retries?}`.
fn automation_step(action: &Map<String, Value>) -> Result<AutomationTask> {
    let document = json!({
        "type": action.get("type").cloned().unwrap_or(Value::Null),
        "parameters": action.get("parameters").cloned().unwrap_or(Value::Null),
    });
    let params: AutomationParams =
        serde_json::from_value(document).map_err(|e| ValidationError::InvalidParameters(e.to_string()))?;
    let mut task = AutomationTask::new(params);
    if let Some(timeout) = action.get("timeout").and_then(Value::as_f64) {
        task.timeout_secs = timeout;
    }
    if let Some(retries) = action.get("retries").and_then(Value::as_u64) {
        task.retries = u32::try_from(retries).unwrap_or(u32::MAX);
    }
    if let Some(value) = task.invalid_timeout() {
        return Err(ValidationError::InvalidTimeout {
            value,
            max: MAX_TIMEOUT_SECS,
        }
        .into());
    }
    Ok(task)
}

impl std::fmt::Debug for Alice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Alice")
            .field("improvement", &self.improvement.is_some())
            .finish_non_exhaustive()
    }
}
