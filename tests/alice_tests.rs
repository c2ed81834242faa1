use std::sync::Arc;

use alice::interaction::{DriverCall, HeadlessDriver, MouseButton};
use alice::kernel::state::OperationalStatus;
use alice::monitor::{ResourceSample, SystemProbe};
use alice::services::llm::{Completion, LlmError};
use alice::{Alice, AliceConfig};
use async_trait::async_trait;
use serde_json::json;

struct FixedProbe;

#[async_trait]
impl SystemProbe for FixedProbe {
    async fn sample(&self) -> anyhow::Result<ResourceSample> {
        Ok(ResourceSample { cpu: 20.0, memory: 30.0, disk: 40.0 })
    }
}

struct RuleCompletion;

#[async_trait]
impl Completion for RuleCompletion {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
        Ok(r#"{"rules": [{"condition": {"metric": "error_count", "comparator": ">", "threshold": 0}, "action": "retry_later"}]}"#.to_string())
    }
}

async fn alice_with(driver: Arc<HeadlessDriver>, completion: Option<Arc<dyn Completion>>) -> Alice {
    let mut config = AliceConfig::default();
    config.llm.openai_api_key = None;
    let alice = Alice::with_components(config, driver, Arc::new(FixedProbe), completion);
    alice.initialize().await.unwrap();
    alice
}

#[tokio::test]
async fn test_generic_task_completes() {
    let alice = alice_with(Arc::new(HeadlessDriver::default()), None).await;

    let outcome = alice.process_task(&json!({ "id": "g-1", "description": "say hello" })).await;
    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(outcome.task_id, "g-1");
    assert_eq!(outcome.result.unwrap()["status"], "completed");
    assert!(outcome.utility.is_some());

    let summary = alice.state_summary();
    assert_eq!(summary.metrics.total_tasks, 1);
    assert_eq!(summary.metrics.completed_tasks, 1);
    assert_eq!(summary.operational.status, OperationalStatus::Ready);
    assert_eq!(summary.current_task, None);
    assert_eq!(alice.utility_history(10).len(), 1);

    alice.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_invalid_task_is_reported_not_raised() {
    let alice = alice_with(Arc::new(HeadlessDriver::default()), None).await;

    let outcome = alice.process_task(&json!({ "id": "bad", "type": "teleport" })).await;
    assert!(!outcome.success);
    assert_eq!(outcome.task_id, "bad");
    assert!(outcome.error.unwrap().contains("teleport"));
    assert_eq!(outcome.utility, None);

    let summary = alice.state_summary();
    assert_eq!(summary.metrics.error_count, 1);
    assert_eq!(summary.operational.status, OperationalStatus::Error);
    assert_eq!(alice.monitor().error_count(), 1);

    alice.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_interaction_runs_or_waits_for_confirmation() {
    let driver = Arc::new(HeadlessDriver::new(800, 600));
    let alice = alice_with(driver.clone(), None).await;

    let pending = alice
        .process_task(&json!({
            "id": "i-1", "type": "interaction", "interaction_type": "mouse",
            "parameters": { "x": 10, "y": 10, "click": true },
            "require_confirmation": true
        }))
        .await;
    assert_eq!(pending.result.unwrap()["status"], "pending_confirmation");
    assert_eq!(alice.state_summary().pending_actions, 1);
    assert!(driver.calls().is_empty());

    let done = alice
        .process_task(&json!({
            "id": "i-2", "type": "interaction", "interaction_type": "mouse",
            "parameters": { "x": 10, "y": 10, "click": true }
        }))
        .await;
    assert!(done.success, "{:?}", done.error);
    assert_eq!(done.result.unwrap()["status"], "completed");
    assert!(driver.calls().contains(&DriverCall::Click(MouseButton::Left)));

    alice.cleanup().await.unwrap();
    assert_eq!(alice.state_summary().pending_actions, 0);
}

#[tokio::test]
async fn test_learning_task_adds_rule_and_gene() {
    let alice = alice_with(Arc::new(HeadlessDriver::default()), None).await;

    let outcome = alice
        .process_task(&json!({
            "id": "l-1", "type": "learning", "learning_type": "experience",
            "training_data": {
                "openness": 0.9,
                "rule": { "condition": { "metric": "cpu_usage", "comparator": ">", "threshold": 0.9 }, "action": "throttle" }
            }
        }))
        .await;
    assert!(outcome.success, "{:?}", outcome.error);
    let result = outcome.result.unwrap();
    assert_eq!(result["traits_updated"], 1);
    assert_eq!(result["rule_added"], true);

    assert_eq!(alice.active_rules()[0].action, "throttle");
    assert_eq!(alice.gene_count(), 1);
    assert_eq!(alice.state_summary().knowledge_nodes, 2);

    let broken = alice
        .process_task(&json!({
            "id": "l-2", "type": "learning", "learning_type": "experience",
            "training_data": { "rule": { "action": "no_condition" } }
        }))
        .await;
    assert!(!broken.success);

    alice.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_automation_requires_high_clearance() {
    let driver = Arc::new(HeadlessDriver::default());
    let alice = alice_with(driver.clone(), None).await;
    let task = |metadata: serde_json::Value| {
        json!({
            "id": "a-1", "type": "automation", "target_system": "desktop",
            "actions": [{ "type": "ui", "parameters": { "action": "press_keys", "keys": ["ctrl", "s"] } }],
            "metadata": metadata
        })
    };

    let refused = alice.process_task(&task(json!({}))).await;
    assert!(!refused.success);
    assert!(driver.calls().is_empty());
    assert_eq!(alice.security().violation_count("system"), 1);

    let allowed = alice.process_task(&task(json!({ "security_level": "high" }))).await;
    assert!(allowed.success, "{:?}", allowed.error);
    let result = allowed.result.unwrap();
    assert_eq!(result["target_system"], "desktop");
    assert_eq!(result["outcome"]["success"], true);
    assert_eq!(driver.calls(), vec![DriverCall::PressKeys(vec!["ctrl".into(), "s".into()])]);

    alice.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_automation_rejects_unbounded_timeouts() {
    let driver = Arc::new(HeadlessDriver::default());
    let alice = alice_with(driver.clone(), None).await;

    let huge_action = alice
        .process_task(&json!({
            "id": "a-2", "type": "automation", "target_system": "desktop",
            "metadata": { "security_level": "high" },
            "actions": [{
                "type": "ui", "timeout": 1e300,
                "parameters": { "action": "press_keys", "keys": ["ctrl", "s"] }
            }]
        }))
        .await;
    assert!(!huge_action.success);
    assert!(huge_action.error.unwrap().contains("timeout"));

    let huge_task = alice
        .process_task(&json!({
            "id": "a-3", "type": "automation", "target_system": "desktop",
            "metadata": { "security_level": "high" },
            "timeout_seconds": u64::MAX,
            "actions": [{ "type": "ui", "parameters": { "action": "press_keys", "keys": ["ctrl", "s"] } }]
        }))
        .await;
    assert!(!huge_task.success);
    assert!(huge_task.error.unwrap().contains("timeout"));

    let huge_wait = alice
        .process_task(&json!({
            "id": "a-4", "type": "automation", "target_system": "desktop",
            "metadata": { "security_level": "high" },
            "actions": [{
                "type": "ui",
                "parameters": { "action": "wait_for_color", "x": 0, "y": 0, "color": [1, 2, 3], "timeout_secs": 1e300 }
            }]
        }))
        .await;
    assert!(!huge_wait.success);
    assert!(huge_wait.error.unwrap().contains("timeout"));

    assert!(driver.calls().is_empty());
    assert_eq!(alice.state_summary().metrics.error_count, 3);

    alice.cleanup().await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn test_automation_timeout_extends_execution_limit() {
    let mut config = AliceConfig::default();
    config.limits.task_execution = 0.1;
    let alice = Alice::with_components(config, Arc::new(HeadlessDriver::default()), Arc::new(FixedProbe), None);
    alice.initialize().await.unwrap();

    let automation = alice
        .process_task(&json!({
            "id": "a-5", "type": "automation", "target_system": "shell",
            "metadata": { "security_level": "high" },
            "timeout_seconds": 5,
            "actions": [{
                "type": "process",
                "parameters": { "process_type": "command", "command": "sleep", "args": ["0.3"] }
            }]
        }))
        .await;
    assert!(automation.success, "{:?}", automation.error);

    let system = alice
        .process_task(&json!({ "id": "s-3", "type": "system", "command": "sleep", "args": ["0.3"] }))
        .await;
    assert!(!system.success);

    alice.cleanup().await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn test_system_task_runs_command() {
    let alice = alice_with(Arc::new(HeadlessDriver::default()), None).await;

    let outcome = alice
        .process_task(&json!({
            "id": "s-1", "type": "system", "command": "sh",
            "args": ["-c", "echo $GREETING"], "environment": { "GREETING": "hi there" }
        }))
        .await;
    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(outcome.result.unwrap()["stdout"].as_str().unwrap().trim(), "hi there");

    let failing = alice.process_task(&json!({ "id": "s-2", "type": "system", "command": "false" })).await;
    assert!(!failing.success);

    alice.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_low_utility_triggers_rule_learning() {
    let mut config = AliceConfig::default();
    config.utility.threshold = 1.0;
    let alice = Alice::with_components(
        config,
        Arc::new(HeadlessDriver::default()),
        Arc::new(FixedProbe),
        Some(Arc::new(RuleCompletion)),
    );
    alice.initialize().await.unwrap();

    let outcome = alice.process_task(&json!({ "id": "g-2" })).await;
    assert!(outcome.success);

    let rules = alice.active_rules();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].action, "retry_later");
    assert!(alice.gene_count() > 0);

    alice.cleanup().await.unwrap();
}
