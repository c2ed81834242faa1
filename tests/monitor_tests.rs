use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use alice::config::MonitorConfig;
use alice::kernel::bus::EventManager;
use alice::kernel::event::Event;
use alice::kernel::time::ManualClock;
use alice::monitor::{
    AlertLevel, ErrorTracker, MetricsCollector, PerformanceMonitor, ResourceSample, SystemMonitor, SystemProbe,
};
use async_trait::async_trait;
use serde_json::{json, Value};

struct FixedProbe(ResourceSample);

#[async_trait]
impl SystemProbe for FixedProbe {
    async fn sample(&self) -> anyhow::Result<ResourceSample> {
        Ok(self.0)
    }
}

fn collect(events: &EventManager, kind: &'static str) -> tokio::sync::mpsc::UnboundedReceiver<Value> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    events.bus().subscribe(kind, move |event: Event| {
        let tx = tx.clone();
        async move {
            tx.send(event.data)?;
            Ok::<(), anyhow::Error>(())
        }
    });
    rx
}

#[tokio::test]
async fn test_collect_once_stores_gauges_and_raises_alerts() {
    let events = EventManager::new();
    let mut alerts = collect(&events, "system.alert");
    let probe = Arc::new(FixedProbe(ResourceSample { cpu: 95.0, memory: 85.0, disk: 10.0 }));
    let monitor = PerformanceMonitor::new(events.clone(), probe, MonitorConfig::default());

    let sample = monitor.collect_once().await.unwrap();
    assert_eq!(sample.cpu, 95.0);

    let metrics = monitor.metrics();
    {
        let metrics = metrics.lock().unwrap();
        assert_eq!(metrics.len(), 3);
        assert_eq!(metrics.latest("memory_usage").unwrap().value, 85.0);
        assert_eq!(metrics.latest("disk_usage").unwrap().labels["type"], "system");
    }

    events.bus().drain().await;
    let mut levels = Vec::new();
    while let Ok(alert) = alerts.try_recv() {
        levels.push(alert["level"].as_str().unwrap().to_string());
    }
    assert_eq!(levels, vec!["CRITICAL", "WARNING"]);
}

#[test]
fn test_threshold_checks_one_alert_per_metric() {
    let probe = Arc::new(FixedProbe(ResourceSample::default()));
    let monitor = PerformanceMonitor::new(EventManager::new(), probe, MonitorConfig::default());

    let raised = monitor.check_thresholds(&ResourceSample { cpu: 75.0, memory: 10.0, disk: 99.0 });
    let levels: Vec<AlertLevel> = raised.iter().map(|(_, level)| *level).collect();
    assert_eq!(levels, vec![AlertLevel::Warning, AlertLevel::Critical]);
    assert!(raised[0].0.contains("cpu_usage"));

    assert!(monitor.check_thresholds(&ResourceSample::default()).is_empty());
}

#[test]
fn test_metrics_retention_and_filters() {
    let clock = ManualClock::default();
    let mut metrics = MetricsCollector::with_clock(1, Arc::new(clock.clone()));
    let web = BTreeMap::from([("type".to_string(), "web".to_string())]);

    metrics.add_metric("latency", 10.0, web.clone());
    clock.advance(chrono::Duration::minutes(30));
    metrics.add_metric("latency", 20.0, BTreeMap::new());
    metrics.add_metric("errors", 1.0, web.clone());

    assert_eq!(metrics.metrics(Some("latency"), None, None).len(), 2);
    assert_eq!(metrics.metrics(None, Some(&web), None).len(), 2);
    assert_eq!(metrics.metrics(None, None, Some(chrono::Duration::minutes(10))).len(), 2);

    clock.advance(chrono::Duration::minutes(45));
    metrics.add_metric("errors", 2.0, BTreeMap::new());
    assert_eq!(metrics.len(), 3, "the first point fell out of retention");
    assert_eq!(metrics.latest("errors").unwrap().value, 2.0);
}

#[test]
fn test_metrics_retention_is_capped() {
    let clock = ManualClock::default();
    let mut metrics = MetricsCollector::with_clock(u64::MAX, Arc::new(clock.clone()));

    metrics.add_metric("latency", 1.0, BTreeMap::new());
    clock.advance(chrono::Duration::days(365));
    metrics.add_metric("latency", 2.0, BTreeMap::new());

    assert_eq!(metrics.len(), 2);
    assert_eq!(metrics.metrics(None, None, Some(chrono::Duration::weeks(1_000_000_000))).len(), 2);
}

#[tokio::test]
async fn test_error_tracker_alerts_on_third_similar_error() {
    let events = EventManager::new();
    let mut alerts = collect(&events, "system.error_alert");
    let clock = ManualClock::default();
    let mut tracker = ErrorTracker::with_clock(events.clone(), Arc::new(clock.clone()));

    assert!(!tracker.track_error("Timeout", "first", json!({})));
    assert!(!tracker.track_error("Timeout", "second", json!({})));
    assert!(!tracker.track_error("ValidationError", "other", json!({})));
    assert!(tracker.track_error("Timeout", "third", json!({ "task_id": "t" })));

    clock.advance(chrono::Duration::minutes(6));
    assert!(!tracker.track_error("Timeout", "much later", json!({})));
    assert_eq!(tracker.len(), 5);

    events.bus().drain().await;
    let alert = alerts.try_recv().unwrap();
    assert_eq!(alert["error_data"]["kind"], "Timeout");
    assert_eq!(alert["error_data"]["context"]["task_id"], "t");
    assert!(alerts.try_recv().is_err());
}

#[tokio::test]
async fn test_system_monitor_start_stop() {
    let events = EventManager::new();
    let probe = Arc::new(FixedProbe(ResourceSample { cpu: 5.0, memory: 5.0, disk: 5.0 }));
    let monitor = SystemMonitor::new(events, probe, MonitorConfig::default());

    monitor.start();
    monitor.start();
    assert!(monitor.is_running());

    let metrics = monitor.metrics();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while metrics.lock().unwrap().is_empty() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(metrics.lock().unwrap().len(), 3);

    monitor.stop().await;
    assert!(!monitor.is_running());

    assert!(!monitor.track_error("X", "boom", json!({})));
    assert_eq!(monitor.error_count(), 1);
}
