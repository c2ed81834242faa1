use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use alice::automation::vision::{color_matches, locate_template};
use alice::automation::{
    AutomationBuilder, AutomationKind, AutomationParams, AutomationSystem, AutomationTask, BuilderError,
    TextLocator, UiAction, Workflow, WorkflowCondition, WorkflowMode, WorkflowTemplates,
};
use alice::data::{ColumnSchema, ColumnType, DataConfig, DataManager};
use alice::interaction::{ComputerInteractionSystem, DriverCall, HeadlessDriver, MouseButton};
use alice::process::{ProcessConfig, ProcessManager};
use alice::security::safety::SafetyPolicy;
use image::{Rgba, RgbaImage};
use serde_json::json;

fn patch() -> RgbaImage {
    RgbaImage::from_fn(10, 10, |x, y| {
        let v = (20 + x * 7 + y * 13 + (x * y) % 5 * 11) as u8;
        Rgba([v, v, v, 255])
    })
}

fn screen_with_patch(at: (u32, u32)) -> RgbaImage {
    let mut screen = RgbaImage::from_pixel(200, 150, Rgba([0, 0, 0, 255]));
    let patch = patch();
    for (x, y, p) in patch.enumerate_pixels() {
        screen.put_pixel(at.0 + x, at.1 + y, *p);
    }
    screen
}

fn automation(driver: Arc<HeadlessDriver>) -> AutomationSystem {
    let interaction = Arc::new(ComputerInteractionSystem::new(driver, SafetyPolicy::default()));
    AutomationSystem::new(interaction, ProcessManager::new(), Arc::new(DataManager::new()))
        .with_retry_pause(Duration::from_millis(1))
        .with_poll_interval(Duration::from_millis(10))
}

fn failing_step() -> AutomationTask {
    AutomationBuilder::ui().click_text("Nowhere", false).with_retries(0).build().unwrap()
}

struct FixedLocator((u32, u32));

impl TextLocator for FixedLocator {
    fn locate(&self, _screen: &RgbaImage, text: &str, _partial_match: bool) -> Option<(u32, u32)> {
        (text == "Login").then_some(self.0)
    }
}

#[test]
fn test_builder_rejects_incomplete_tasks() {
    assert_eq!(AutomationBuilder::ui().build().unwrap_err(), BuilderError::MissingAction("ui"));
    assert_eq!(
        AutomationBuilder::ui().type_text("").build().unwrap_err(),
        BuilderError::MissingField("text")
    );
    assert_eq!(
        AutomationBuilder::ui().press_keys(Vec::<String>::new()).build().unwrap_err(),
        BuilderError::MissingField("keys")
    );
    assert_eq!(
        AutomationBuilder::ui().scroll(3).with_timeout(0.0).build().unwrap_err(),
        BuilderError::InvalidTimeout(0.0)
    );
    assert_eq!(AutomationBuilder::workflow().build().unwrap_err(), BuilderError::EmptyWorkflow);
    assert_eq!(
        AutomationBuilder::process().run_command("  ", Vec::<String>::new()).build().unwrap_err(),
        BuilderError::EmptyCommand
    );
    assert_eq!(
        AutomationBuilder::data().fetch("", None).build().unwrap_err(),
        BuilderError::MissingField("url")
    );
    assert_eq!(AutomationBuilder::learning().build().unwrap_err(), BuilderError::MissingAction("learning"));
}

#[test]
fn test_builder_rejects_out_of_range_timeouts() {
    assert!(matches!(
        AutomationBuilder::ui().scroll(1).with_timeout(f64::NAN).build(),
        Err(BuilderError::InvalidTimeout(_))
    ));
    assert_eq!(
        AutomationBuilder::ui().scroll(1).with_timeout(1e300).build().unwrap_err(),
        BuilderError::InvalidTimeout(1e300)
    );
    assert_eq!(
        AutomationBuilder::ui()
            .wait_for_color(1, 1, [0, 0, 0], 0, 1e20)
            .build()
            .unwrap_err(),
        BuilderError::InvalidTimeout(1e20)
    );
    assert!(AutomationBuilder::ui().wait_for_color(1, 1, [0, 0, 0], 0, 0.0).build().is_ok());
}

#[tokio::test]
async fn test_executor_rejects_invalid_timeouts_without_running() {
    let driver = Arc::new(HeadlessDriver::default());
    let automation = automation(driver.clone());

    let huge: AutomationTask = serde_json::from_value(json!({
        "params": { "type": "ui", "parameters": { "action": "scroll", "amount": 2 } },
        "timeout_secs": 1e300,
        "retries": 0
    }))
    .unwrap();
    assert_eq!(huge.invalid_timeout(), Some(1e300));
    let outcome = automation.execute_task(&huge).await;
    assert!(!outcome.success);
    assert_eq!(outcome.attempts, 0);
    assert!(outcome.error.unwrap().contains("invalid timeout"));

    let nested = AutomationTask::new(AutomationParams::Workflow(Workflow {
        mode: WorkflowMode::Sequential,
        steps: vec![AutomationTask::new(AutomationParams::Ui(UiAction::WaitForColor {
            x: 0,
            y: 0,
            color: [0, 0, 0],
            tolerance: 0,
            timeout_secs: f64::INFINITY,
        }))],
        continue_on_error: false,
        condition: WorkflowCondition::Always,
    }));
    assert_eq!(nested.invalid_timeout(), Some(f64::INFINITY));
    assert!(!automation.execute_task(&nested).await.success);
    assert!(driver.calls().is_empty());
}

#[test]
fn test_task_document_shape() {
    let task = AutomationBuilder::ui()
        .type_text("hello")
        .with_timeout(5.0)
        .with_retries(1)
        .with_condition("status", "completed")
        .build()
        .unwrap();
    assert_eq!(task.kind(), AutomationKind::Ui);

    let doc = serde_json::to_value(&task).unwrap();
    assert_eq!(doc["params"]["type"], "ui");
    assert_eq!(doc["params"]["parameters"], json!({ "action": "type_text", "text": "hello" }));
    assert_eq!(doc["timeout_secs"], 5.0);
    assert_eq!(doc["retries"], 1);
    assert_eq!(doc["conditions"]["status"], "completed");

    let parsed: AutomationTask = serde_json::from_value(json!({
        "params": { "type": "ui", "parameters": { "action": "click", "x": 3, "y": 4 } }
    }))
    .unwrap();
    assert_eq!(parsed.retries, 3);
    assert_eq!(parsed.timeout_secs, 60.0);
    assert_eq!(
        parsed.params,
        AutomationParams::Ui(UiAction::Click { x: 3, y: 4, button: MouseButton::Left })
    );
}

#[test]
fn test_templates_shape() {
    let login = WorkflowTemplates::web_login("https://example.com", "ann", "hunter2").unwrap();
    assert_eq!(login.timeout_secs, 30.0);
    let AutomationParams::Workflow(workflow) = &login.params else {
        panic!("expected workflow");
    };
    assert_eq!(workflow.steps.len(), 5);
    assert_eq!(workflow.mode, WorkflowMode::Sequential);
    assert_eq!(workflow.steps[0].kind(), AutomationKind::Process);

    let alert = AutomationBuilder::ui().press_keys(["F1"]).build().unwrap();
    let monitor = WorkflowTemplates::system_monitor("nginx", 80.0, alert).unwrap();
    let AutomationParams::Workflow(workflow) = &monitor.params else {
        panic!("expected workflow");
    };
    assert_eq!(workflow.mode, WorkflowMode::Conditional);
    assert_eq!(
        workflow.condition,
        WorkflowCondition::FieldGreaterThan { field: "cpu_usage".into(), threshold: 80.0 }
    );

    let fields = vec![("Name".to_string(), "Ann".to_string()), ("City".to_string(), "Oslo".to_string())];
    let form = WorkflowTemplates::web_form_fill(&fields).unwrap();
    let AutomationParams::Workflow(workflow) = &form.params else {
        panic!("expected workflow");
    };
    assert_eq!(workflow.steps.len(), 6);

    let git = WorkflowTemplates::git_workflow(std::path::Path::new("/srv/repo"), "main", "update").unwrap();
    let AutomationParams::Workflow(workflow) = &git.params else {
        panic!("expected workflow");
    };
    assert_eq!(workflow.steps.len(), 5);
    assert_eq!(git.retries, 3);

    assert!(WorkflowTemplates::system_maintenance().is_ok());
    assert!(WorkflowTemplates::app_update("editor", "2.1").is_ok());

    let dir = std::path::Path::new("/srv/data");
    let backup = WorkflowTemplates::file_backup(dir, std::path::Path::new("/srv/backup")).unwrap();
    let AutomationParams::Workflow(workflow) = &backup.params else {
        panic!("expected workflow");
    };
    assert_eq!(workflow.steps[0].kind(), AutomationKind::Data);
    assert_eq!(backup.timeout_secs, 300.0);

    let scrape = WorkflowTemplates::web_scrape_table("https://example.com/rows.json", "rank", &dir.join("rows.json")).unwrap();
    assert_eq!(scrape.kind(), AutomationKind::Workflow);

    let validation = WorkflowTemplates::data_validation(&dir.join("in.json"), BTreeMap::new(), &dir.join("out.json")).unwrap();
    let AutomationParams::Workflow(workflow) = &validation.params else {
        panic!("expected workflow");
    };
    assert_eq!(workflow.steps.len(), 2);

    let handler = AutomationBuilder::process().start_service("nginx").build().unwrap();
    let watch = WorkflowTemplates::file_monitor(&dir.join("app.log"), "ERROR", handler).unwrap();
    let AutomationParams::Workflow(workflow) = &watch.params else {
        panic!("expected workflow");
    };
    assert_eq!(workflow.condition, WorkflowCondition::FieldTrue { field: "pattern_matched".into() });
}

#[test]
fn test_builder_variants_serialize_with_their_tags() {
    let stop = AutomationBuilder::process().stop_service("nginx").build().unwrap();
    let doc = serde_json::to_value(&stop.params).unwrap();
    assert_eq!(doc["parameters"], json!({ "process_type": "service", "service_name": "nginx", "action": "stop" }));

    let script = AutomationBuilder::process().run_script("job.py", Some("python3"), ["--fast"]).build().unwrap();
    let doc = serde_json::to_value(&script.params).unwrap();
    assert_eq!(doc["parameters"]["interpreter"], "python3");

    let optimize = AutomationBuilder::learning().optimize_workflow("wf-1").build().unwrap();
    assert_eq!(serde_json::to_value(&optimize.params).unwrap()["parameters"]["learning_type"], "optimization");

    let behavior = AutomationBuilder::learning().analyze_behavior("typing").build().unwrap();
    assert_eq!(serde_json::to_value(&behavior.params).unwrap()["parameters"]["behavior_type"], "typing");
}

#[test]
fn test_template_matching_finds_patch() {
    let screen = screen_with_patch((50, 40));
    assert_eq!(locate_template(&screen, &patch(), 0.95), Some((55, 45)));

    let blank = RgbaImage::from_pixel(200, 150, Rgba([0, 0, 0, 255]));
    assert_eq!(locate_template(&blank, &patch(), 0.9), None);

    let tiny = RgbaImage::from_pixel(5, 5, Rgba([0, 0, 0, 255]));
    assert_eq!(locate_template(&tiny, &patch(), 0.5), None);
}

#[test]
fn test_color_matching_with_tolerance() {
    let mut screen = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
    screen.put_pixel(5, 5, Rgba([200, 10, 10, 255]));

    assert!(color_matches(&screen, 5, 5, [203, 12, 8], 5));
    assert!(!color_matches(&screen, 5, 5, [220, 10, 10], 5));
    assert!(!color_matches(&screen, 50, 5, [0, 0, 0], 255));
}

#[tokio::test]
async fn test_ui_actions_reach_driver() {
    let driver = Arc::new(HeadlessDriver::new(800, 600));
    let automation = automation(driver.clone());

    let click = AutomationBuilder::ui().click_at(10, 20, MouseButton::Left).build().unwrap();
    let outcome = automation.execute_task(&click).await;
    assert!(outcome.success);
    assert_eq!(outcome.attempts, 1);

    let typing = AutomationBuilder::ui().type_text("hi").build().unwrap();
    assert!(automation.execute_task(&typing).await.success);

    let scroll = AutomationBuilder::ui().scroll(-3).build().unwrap();
    assert!(automation.execute_task(&scroll).await.success);

    assert_eq!(
        driver.calls(),
        vec![
            DriverCall::MoveMouse(10, 20),
            DriverCall::Click(MouseButton::Left),
            DriverCall::TypeText("hi".into()),
            DriverCall::Scroll(-3),
        ]
    );
}

#[tokio::test]
async fn test_click_image_clicks_match_center() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("button.png");
    patch().save(&template).unwrap();

    let driver = Arc::new(HeadlessDriver::new(200, 150).with_frame(screen_with_patch((50, 40))));
    let automation = automation(driver.clone());

    let task = AutomationBuilder::ui().click_image(&template, 0.95).build().unwrap();
    let outcome = automation.execute_task(&task).await;
    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(outcome.result.unwrap()["x"], 55);
    assert!(driver.calls().contains(&DriverCall::MoveMouse(55, 45)));

    driver.set_frame(RgbaImage::from_pixel(200, 150, Rgba([0, 0, 0, 255])));
    let gone = AutomationBuilder::ui().wait_for_image(&template, 0.95, 0.05).with_retries(0).build().unwrap();
    assert!(!automation.execute_task(&gone).await.success);

    driver.set_frame(screen_with_patch((100, 20)));
    let wait = AutomationBuilder::ui().wait_for_image(&template, 0.95, 1.0).build().unwrap();
    let found = automation.execute_task(&wait).await.result.unwrap();
    assert_eq!(found["found"], true);
    assert_eq!(found["x"], 105);
}

#[tokio::test]
async fn test_click_text_needs_locator_and_retries() {
    let driver = Arc::new(HeadlessDriver::new(200, 150));

    let without = automation(driver.clone());
    let task = AutomationBuilder::ui().click_text("Login", false).with_retries(2).build().unwrap();
    let outcome = without.execute_task(&task).await;
    assert!(!outcome.success);
    assert_eq!(outcome.attempts, 3);
    assert!(outcome.error.unwrap().contains("no text locator"));

    let with = automation(driver.clone()).with_text_locator(Arc::new(FixedLocator((7, 8))));
    let outcome = with.execute_task(&task).await;
    assert!(outcome.success);
    assert_eq!(outcome.attempts, 1);
    assert!(driver.calls().contains(&DriverCall::MoveMouse(7, 8)));
}

#[tokio::test]
async fn test_conditions_gate_success() {
    let automation = automation(Arc::new(HeadlessDriver::default()));

    let met = AutomationBuilder::ui()
        .type_text("ok")
        .with_condition("status", "completed")
        .build()
        .unwrap();
    assert!(automation.execute_task(&met).await.success);

    let unmet = AutomationBuilder::ui()
        .type_text("ok")
        .with_retries(1)
        .with_condition("status", "done")
        .build()
        .unwrap();
    let outcome = automation.execute_task(&unmet).await;
    assert!(!outcome.success);
    assert_eq!(outcome.attempts, 2);
    assert!(outcome.error.unwrap().contains("condition 'status' not met"));
}

#[tokio::test]
async fn test_wait_for_color_times_out() {
    let mut frame = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 255]));
    frame.put_pixel(3, 3, Rgba([0, 255, 0, 255]));
    let automation = automation(Arc::new(HeadlessDriver::new(20, 20).with_frame(frame)));

    let present = AutomationBuilder::ui().wait_for_color(3, 3, [0, 250, 0], 10, 1.0).build().unwrap();
    assert!(automation.execute_task(&present).await.success);

    let absent = AutomationBuilder::ui()
        .wait_for_color(4, 4, [0, 250, 0], 10, 0.05)
        .with_retries(0)
        .build()
        .unwrap();
    let outcome = automation.execute_task(&absent).await;
    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("did not appear"));
}

#[tokio::test]
async fn test_sequential_workflow_stops_on_failure() {
    let driver = Arc::new(HeadlessDriver::default());
    let automation = automation(driver.clone());

    let strict = AutomationBuilder::workflow()
        .add_step(AutomationBuilder::ui().type_text("one").build().unwrap())
        .add_step(failing_step())
        .add_step(AutomationBuilder::ui().type_text("three").build().unwrap())
        .with_retries(0)
        .build()
        .unwrap();
    let outcome = automation.execute_task(&strict).await;
    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("1 of 3 workflow steps failed"));
    assert_eq!(driver.calls(), vec![DriverCall::TypeText("one".into())]);

    driver.clear_calls();
    let lenient = AutomationBuilder::workflow()
        .add_step(AutomationBuilder::ui().type_text("one").build().unwrap())
        .add_step(failing_step())
        .add_step(AutomationBuilder::ui().type_text("three").build().unwrap())
        .continue_on_error(true)
        .build()
        .unwrap();
    let outcome = automation.execute_task(&lenient).await;
    assert!(outcome.success);
    let result = outcome.result.unwrap();
    assert_eq!(result["completed"], false);
    assert_eq!(result["steps_run"], 3);
    assert_eq!(driver.calls().len(), 2);
}

#[tokio::test]
async fn test_parallel_workflow_runs_every_step() {
    let driver = Arc::new(HeadlessDriver::default());
    let automation = automation(driver.clone());

    let task = AutomationBuilder::workflow()
        .add_step(AutomationBuilder::ui().type_text("a").build().unwrap())
        .add_step(AutomationBuilder::ui().type_text("b").build().unwrap())
        .run_parallel()
        .build()
        .unwrap();
    let outcome = automation.execute_task(&task).await;
    assert!(outcome.success);
    assert_eq!(outcome.result.unwrap()["completed"], true);
    assert_eq!(driver.calls().len(), 2);
}

#[tokio::test]
async fn test_conditional_workflow_follows_previous_result() {
    let dir = tempfile::tempdir().unwrap();
    let driver = Arc::new(HeadlessDriver::default());
    let automation = automation(driver.clone());
    let records = vec![json!({ "id": 1 }), json!({ "id": 2 })];

    let build = |threshold: f64| {
        AutomationBuilder::workflow()
            .add_step(
                AutomationBuilder::data()
                    .write(records.clone(), dir.path().join("ids.json"), DataConfig::default())
                    .build()
                    .unwrap(),
            )
            .add_step(AutomationBuilder::ui().type_text("next").build().unwrap())
            .run_conditional(WorkflowCondition::FieldGreaterThan { field: "count".into(), threshold })
            .build()
            .unwrap()
    };

    let skipped = automation.execute_task(&build(5.0)).await;
    assert!(skipped.success);
    assert_eq!(skipped.result.unwrap()["steps_run"], 1);
    assert!(driver.calls().is_empty());

    let taken = automation.execute_task(&build(1.0)).await;
    assert_eq!(taken.result.unwrap()["steps_run"], 2);
    assert_eq!(driver.calls(), vec![DriverCall::TypeText("next".into())]);
}

#[tokio::test]
async fn test_data_actions() {
    let dir = tempfile::tempdir().unwrap();
    let automation = automation(Arc::new(HeadlessDriver::default()));
    let input = dir.path().join("in.jsonl");
    let records = vec![json!({ "n": 3 }), json!({ "n": 1 }), json!({ "n": 3 })];

    let write = AutomationBuilder::data().write(records, &input, DataConfig::default()).build().unwrap();
    assert_eq!(automation.execute_task(&write).await.result.unwrap()["count"], 3);

    let clean: DataConfig =
        serde_json::from_value(json!({ "transformations": [{ "type": "dedupe" }, { "type": "sort", "by": "n" }] }))
            .unwrap();
    let output = dir.path().join("out/clean.json");
    let transform = AutomationBuilder::data()
        .transform(input.to_str().unwrap(), &output, clean)
        .build()
        .unwrap();
    assert!(automation.execute_task(&transform).await.success);

    let read = AutomationBuilder::data().read(output.to_str().unwrap(), DataConfig::default()).build().unwrap();
    let result = automation.execute_task(&read).await.result.unwrap();
    assert_eq!(result["records"], json!([{ "n": 1 }, { "n": 3 }]));

    let mut schema = BTreeMap::new();
    schema.insert(
        "n".to_string(),
        ColumnSchema { column_type: Some(ColumnType::Integer), unique: true, ..ColumnSchema::default() },
    );
    let strict = DataConfig { schema: Some(schema), ..DataConfig::default() };
    let validate = AutomationBuilder::data()
        .validate(input.to_str().unwrap(), strict)
        .with_retries(0)
        .build()
        .unwrap();
    let outcome = automation.execute_task(&validate).await;
    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("unique"));

    let mirror = dir.path().join("mirror");
    let sync = AutomationBuilder::data()
        .sync_folders(dir.path().join("out"), &mirror, vec!["*.json".into()])
        .build()
        .unwrap();
    assert_eq!(automation.execute_task(&sync).await.result.unwrap()["copied"], 1);
    assert!(mirror.join("clean.json").exists());
}

#[tokio::test]
async fn test_file_monitor_reports_pattern() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    std::fs::write(&path, "starting\n").unwrap();
    let automation = automation(Arc::new(HeadlessDriver::default()));

    let quiet = AutomationBuilder::data().monitor_file(&path, "READY", 0.1).build().unwrap();
    let outcome = automation.execute_task(&quiet).await;
    assert!(outcome.success);
    assert_eq!(outcome.result.unwrap()["pattern_matched"], false);

    let writer_path = path.clone();
    let writer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(&writer_path, "starting\nREADY\n").unwrap();
        let file = std::fs::File::options().write(true).open(&writer_path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(60)).unwrap();
    });

    let watch = AutomationBuilder::data().monitor_file(&path, "READY", 5.0).build().unwrap();
    let outcome = automation.execute_task(&watch).await;
    writer.await.unwrap();
    assert_eq!(outcome.result.unwrap()["pattern_matched"], true);
}

#[tokio::test]
async fn test_learning_returns_status() {
    let automation = automation(Arc::new(HeadlessDriver::default()));
    let task = AutomationBuilder::learning().learn_pattern("logs", "errors").build().unwrap();
    let result = automation.execute_task(&task).await.result.unwrap();
    assert_eq!(result["status"], "learning_completed");
    assert_eq!(result["learning_type"], "pattern");
    assert_eq!(result["pattern_name"], "errors");
}

#[cfg(unix)]
#[tokio::test]
async fn test_process_commands() {
    let automation = automation(Arc::new(HeadlessDriver::default()));

    let echo = AutomationBuilder::process().run_command("echo", ["hello"]).build().unwrap();
    let result = automation.execute_task(&echo).await.result.unwrap();
    assert_eq!(result["stdout"].as_str().unwrap().trim(), "hello");

    let failing = AutomationBuilder::process()
        .run_command("false", Vec::<String>::new())
        .with_retries(0)
        .build()
        .unwrap();
    assert!(!automation.execute_task(&failing).await.success);

    let unsafe_cmd = AutomationBuilder::process()
        .run_command("shutdown", ["now"])
        .with_retries(0)
        .build()
        .unwrap();
    let outcome = automation.execute_task(&unsafe_cmd).await;
    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("unsafe command"));

    let missing = AutomationBuilder::process().stop("ghost", false).with_retries(0).build().unwrap();
    assert!(!automation.execute_task(&missing).await.success);

    automation.cleanup().await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_process_start_checks_command_safety() {
    let dir = tempfile::tempdir().unwrap();
    let keep = dir.path().join("keep");
    std::fs::create_dir(&keep).unwrap();
    let automation = automation(Arc::new(HeadlessDriver::default()));

    let wipe = ProcessConfig::new("wipe", "sh").with_args(["-c".to_string(), format!("rm -rf {}", keep.display())]);
    let start = AutomationBuilder::process().start(wipe).with_retries(0).build().unwrap();
    let outcome = automation.execute_task(&start).await;
    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("unsafe command"));
    assert!(!automation.processes().is_running("wipe"));
    assert!(keep.exists());

    let sleeper = ProcessConfig::new("sleeper", "sleep").with_args(["5"]);
    let start = AutomationBuilder::process().start(sleeper).with_retries(0).build().unwrap();
    let outcome = automation.execute_task(&start).await;
    assert!(outcome.success, "{:?}", outcome.error);
    assert!(automation.processes().is_running("sleeper"));

    automation.cleanup().await;
}
