use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alice::kernel::bus::{EventBus, EventManager};
use alice::kernel::event::{Event, EventPriority};
use alice::kernel::scheduler::{ScheduledTask, TaskScheduler};
use alice::kernel::state::{MetricsUpdate, OperationalStatus, StateManager, StateUpdate};
use alice::kernel::time::ManualClock;
use chrono::{TimeZone, Utc};
use serde_json::json;

fn emotions() -> BTreeMap<String, f64> {
    BTreeMap::from([("joy".to_string(), 0.5), ("fear".to_string(), 0.2)])
}

fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
}

#[tokio::test]
async fn test_drain_delivers_by_priority_then_fifo() {
    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = seen.clone();
    bus.subscribe("*", move |event: Event| {
        let sink = sink.clone();
        async move {
            sink.lock().unwrap().push(event.data["n"].as_i64().unwrap());
            Ok::<(), anyhow::Error>(())
        }
    });

    bus.publish(Event::new("a", json!({ "n": 1 })).with_priority(EventPriority::Low));
    bus.publish(Event::new("b", json!({ "n": 2 })).with_priority(EventPriority::Critical));
    bus.publish(Event::new("c", json!({ "n": 3 })).with_priority(EventPriority::Low));
    bus.publish(Event::new("d", json!({ "n": 4 })).with_priority(EventPriority::High));

    assert_eq!(bus.pending(), 4);
    assert_eq!(bus.drain().await, 4);
    assert_eq!(*seen.lock().unwrap(), vec![2, 4, 1, 3]);
}

#[tokio::test]
async fn test_failing_handler_does_not_stop_others() {
    let bus = EventBus::new();
    let hits = Arc::new(Mutex::new(0));

    bus.subscribe("task.completed", |_event: Event| async { Err::<(), _>(anyhow::anyhow!("boom")) });
    let counter = hits.clone();
    bus.subscribe("task.completed", move |_event: Event| {
        let counter = counter.clone();
        async move {
            *counter.lock().unwrap() += 1;
            Ok::<(), anyhow::Error>(())
        }
    });

    bus.publish(Event::new("task.completed", json!({})));
    bus.publish(Event::new("task.failed", json!({})));
    bus.drain().await;

    assert_eq!(*hits.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_unsubscribe_removes_handler() {
    let bus = EventBus::new();
    let id = bus.subscribe("x", |_event: Event| async { Ok::<(), anyhow::Error>(()) });
    assert_eq!(bus.subscriber_count("x"), 1);
    assert!(bus.unsubscribe("x", id));
    assert!(!bus.unsubscribe("x", id));
    assert_eq!(bus.subscriber_count("x"), 0);
}

#[tokio::test]
async fn test_running_bus_delivers_emitted_events() {
    let events = EventManager::new();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    events.bus().subscribe("system.startup", move |event: Event| {
        let tx = tx.clone();
        async move {
            tx.send(event.source)?;
            Ok::<(), anyhow::Error>(())
        }
    });

    events.initialize().unwrap();
    assert!(events.initialize().is_err(), "second start must be refused");
    events.emit_from("system.startup", json!({}), EventPriority::High, "test");

    let source = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("event not delivered");
    assert_eq!(source.as_deref(), Some("test"));

    events.cleanup().await;
    assert!(!events.bus().is_running());
}

#[test]
fn test_gauges_decay_and_counters_do_not() {
    let clock = clock();
    let mut state = StateManager::with_clock(emotions(), Arc::new(clock.clone()));

    state.update(StateUpdate::new().metrics(MetricsUpdate {
        total_tasks: Some(5),
        ..MetricsUpdate::default()
    }));

    clock.advance(chrono::Duration::hours(10));
    state.update(StateUpdate::new().metrics(MetricsUpdate {
        cpu_usage: Some(0.8),
        ..MetricsUpdate::default()
    }));

    let expected = 0.8 * (-0.1f64 * 10.0).exp();
    assert!((state.metrics().cpu_usage - expected).abs() < 1e-9);
    assert_eq!(state.metrics().total_tasks, 5);
    assert!((state.emotions()["joy"] - 0.5 * (-1.0f64).exp()).abs() < 1e-9);
}

#[test]
fn test_emotions_are_clamped() {
    let mut state = StateManager::with_clock(emotions(), Arc::new(clock()));
    state.update(StateUpdate::new().emotion("joy", 5.0).emotion("fear", -5.0));
    assert_eq!(state.emotions()["joy"], 1.0);
    assert_eq!(state.emotions()["fear"], 0.0);
}

#[test]
fn test_status_task_and_summary() {
    let mut state = StateManager::with_clock(emotions(), Arc::new(clock()));
    state.update(
        StateUpdate::new()
            .status(OperationalStatus::Processing)
            .current_task(Some("t-1".to_string())),
    );
    assert_eq!(state.status(), OperationalStatus::Processing);
    assert_eq!(state.current_task(), Some("t-1"));

    state.push_pending_action(json!({ "type": "click" }));
    state.add_interaction("generic", json!({ "id": 1 }));
    state.knowledge_mut().add_node("cpu_usage", json!({}));

    let summary = state.summary();
    assert_eq!(summary.current_task.as_deref(), Some("t-1"));
    assert_eq!(summary.pending_actions, 1);
    assert_eq!(summary.interactions, 1);
    assert_eq!(summary.knowledge_nodes, 1);

    state.update(StateUpdate::new().current_task(None));
    assert_eq!(state.current_task(), None);
}

#[test]
fn test_task_duration_running_average() {
    let mut state = StateManager::with_clock(emotions(), Arc::new(clock()));
    state.record_task_duration(2.0);
    assert_eq!(state.metrics().average_task_time, 2.0);
    state.record_task_duration(4.0);
    assert_eq!(state.metrics().average_task_time, 3.0);
}

#[test]
fn test_interaction_history_is_bounded() {
    let mut state = StateManager::with_clock(emotions(), Arc::new(clock()));
    for i in 0..1005 {
        state.add_interaction("generic", json!({ "i": i }));
    }
    let recent = state.recent_interactions(2);
    assert_eq!(state.summary().interactions, 1000);
    assert_eq!(recent[1].data["i"], 1004);
    assert_eq!(recent[0].data["i"], 1003);
}

#[test]
fn test_scheduler_prefers_shortest_ready_task() {
    let clock = clock();
    let mut scheduler = TaskScheduler::with_clock(Arc::new(clock.clone()));

    scheduler.schedule(ScheduledTask::new("unknown", ()));
    scheduler.schedule(ScheduledTask::new("slow", ()).with_expected_duration(10.0));
    scheduler.schedule(ScheduledTask::new("fast", ()).with_expected_duration(1.0));
    scheduler.schedule(
        ScheduledTask::new("later", ())
            .with_expected_duration(0.1)
            .with_delay(chrono::Duration::seconds(30)),
    );

    assert_eq!(scheduler.next_ready_now().unwrap().id, "fast");
    assert_eq!(scheduler.next_ready_now().unwrap().id, "slow");
    assert_eq!(scheduler.next_ready_now().unwrap().id, "unknown");
    assert!(scheduler.next_ready_now().is_none());

    clock.advance(chrono::Duration::seconds(31));
    assert_eq!(scheduler.next_ready_now().unwrap().id, "later");
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn test_scheduler_take_by_id_ignores_clock() {
    let clock = clock();
    let mut scheduler = TaskScheduler::with_clock(Arc::new(clock.clone()));

    scheduler.schedule(ScheduledTask::new("older", 1).with_expected_duration(0.5));
    scheduler.schedule(ScheduledTask::new("mine", 2));
    clock.set(Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0).unwrap());
    assert!(scheduler.next_ready_now().is_none());

    let taken = scheduler.take("mine").unwrap();
    assert_eq!(taken.payload, 2);
    assert!(scheduler.take("mine").is_none());
    assert_eq!(scheduler.pending(), 1);
}

#[test]
fn test_knowledge_graph_edges_create_endpoints() {
    let mut state = StateManager::new(emotions());
    let graph = state.knowledge_mut();
    graph.add_node("throttle", json!({ "kind": "action" }));
    graph.add_edge("cpu_usage", "throttle", "triggers");

    assert_eq!(graph.len(), 2);
    assert_eq!(graph.edge_count(), 1);
    assert_eq!(graph.node("cpu_usage"), Some(&serde_json::Value::Null));
    assert_eq!(graph.node("throttle").unwrap()["kind"], "action");
    assert_eq!(graph.neighbors("cpu_usage"), vec![("throttle", "triggers")]);
    assert!(graph.neighbors("throttle").is_empty());
}

#[test]
fn test_manual_clock_can_be_set() {
    let clock = clock();
    let later = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    clock.set(later);
    assert_eq!(alice::kernel::time::Clock::now(&clock), later);
}
