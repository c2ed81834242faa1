use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::errors::ErrorTracker;
use super::metrics::MetricsCollector;
use super::performance::PerformanceMonitor;
use super::probe::SystemProbe;
use crate::config::MonitorConfig;
use crate::kernel::bus::EventManager;

/// Owns the performance loop and the error tracker.
pub struct SystemMonitor {
    performance: Arc<PerformanceMonitor>,
    errors: Mutex<ErrorTracker>,
    interval: Duration,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl SystemMonitor {
    pub fn new(events: EventManager, probe: Arc<dyn SystemProbe>, config: MonitorConfig) -> Self {
        let interval = Duration::from_secs(config.interval_secs.max(1));
        Self {
            performance: Arc::new(PerformanceMonitor::new(events.clone(), probe, config)),
            errors: Mutex::new(ErrorTracker::new(events)),
            interval,
            task: Mutex::new(None),
        }
    }

    pub fn performance(&self) -> &PerformanceMonitor {
        &self.performance
    }

    pub fn metrics(&self) -> Arc<Mutex<MetricsCollector>> {
        self.performance.metrics()
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    /// Spawn the performance loop. A second call while running is a no-op.
    pub fn start(&self) {
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if task.is_some() {
            warn!("System monitor already running");
            return;
        }
        let cancel = CancellationToken::new();
        let performance = Arc::clone(&self.performance);
        let token = cancel.clone();
        let interval = self.interval;
        let handle = tokio::spawn(async move { performance.run(interval, token).await });
        *task = Some((cancel, handle));
        info!("System monitoring started");
    }

    pub async fn stop(&self) {
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some((cancel, handle)) = task {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!("Monitor task ended abnormally: {}", e);
            }
            info!("System monitoring stopped");
        }
    }

    pub fn track_error(&self, kind: &str, message: &str, context: Value) -> bool {
        self.errors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .track_error(kind, message, context)
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
