use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::metrics::MetricsCollector;
use super::probe::SystemProbe;
use super::types::{AlertLevel, ResourceSample};
use crate::config::{MonitorConfig, Threshold};
use crate::kernel::bus::EventManager;
use crate::kernel::event::{topics, EventPriority};

/// Samples host load on an interval, stores it and raises threshold alerts.
pub struct PerformanceMonitor {
    events: EventManager,
    probe: Arc<dyn SystemProbe>,
    config: MonitorConfig,
    metrics: Arc<Mutex<MetricsCollector>>,
}

impl PerformanceMonitor {
    pub fn new(events: EventManager, probe: Arc<dyn SystemProbe>, config: MonitorConfig) -> Self {
        let metrics = MetricsCollector::new(config.retention_hours);
        Self::with_collector(events, probe, config, metrics)
    }

    pub fn with_collector(
        events: EventManager,
        probe: Arc<dyn SystemProbe>,
        config: MonitorConfig,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            events,
            probe,
            config,
            metrics: Arc::new(Mutex::new(metrics)),
        }
    }

    pub fn metrics(&self) -> Arc<Mutex<MetricsCollector>> {
        Arc::clone(&self.metrics)
    }

    /// One sample: store the three gauges and check thresholds. Returns the sample.
    pub async fn collect_once(&self) -> anyhow::Result<ResourceSample> {
        let sample = self.probe.sample().await?;
        {
            let labels = BTreeMap::from([("type".to_string(), "system".to_string())]);
            let mut metrics = self.metrics.lock().unwrap_or_else(|e| e.into_inner());
            metrics.add_metric("cpu_usage", sample.cpu, labels.clone());
            metrics.add_metric("memory_usage", sample.memory, labels.clone());
            metrics.add_metric("disk_usage", sample.disk, labels);
        }
        debug!(
            "Collected system metrics: cpu {:.1}%, memory {:.1}%, disk {:.1}%",
            sample.cpu, sample.memory, sample.disk
        );
        self.check_thresholds(&sample);
        Ok(sample)
    }

    /// Alert levels raised for `sample`, in cpu, memory, disk order.
    pub fn check_thresholds(&self, sample: &ResourceSample) -> Vec<(String, AlertLevel)> {
        let checks: [(&str, f64, Threshold); 3] = [
            ("cpu_usage", sample.cpu, self.config.cpu),
            ("memory_usage", sample.memory, self.config.memory),
            ("disk_usage", sample.disk, self.config.disk),
        ];

        let mut raised = Vec::new();
        for (metric, value, threshold) in checks {
            let (level, message) = if value >= threshold.critical {
                (AlertLevel::Critical, format!("{metric} is critical: {value:.1}%"))
            } else if value >= threshold.warning {
                (AlertLevel::Warning, format!("{metric} is high: {value:.1}%"))
            } else {
                continue;
            };
            self.emit_alert(&message, level);
            raised.push((message, level));
        }
        raised
    }

    fn emit_alert(&self, message: &str, level: AlertLevel) {
        self.events.emit_from(
            topics::SYSTEM_ALERT,
            json!({
                "message": message,
                "level": level,
                "timestamp": Utc::now().to_rfc3339(),
            }),
            EventPriority::High,
            "monitor",
        );
    }

    /// Sample every `interval` until `cancel` fires. Probe failures are logged and retried.
    pub async fn run(&self, interval: Duration, cancel: CancellationToken) {
        info!("Performance monitoring started ({:?} interval)", interval);
        loop {
            if let Err(e) = self.collect_once().await {
                error!("Error collecting metrics: {}", e);
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        info!("Performance monitoring stopped");
    }
}
