use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Duration, Utc};

use super::types::MetricPoint;
use crate::kernel::time::{system_clock, SharedClock};

/// Longest retention a collector keeps: ten years.
pub const MAX_RETENTION_HOURS: u64 = 24 * 365 * 10;

/// In-memory time series with a retention horizon. Old points are pruned on insert.
#[derive(Debug)]
pub struct MetricsCollector {
    points: VecDeque<MetricPoint>,
    retention: Duration,
    clock: SharedClock,
}

impl MetricsCollector {
    pub fn new(retention_hours: u64) -> Self {
        Self::with_clock(retention_hours, system_clock())
    }

    pub fn with_clock(retention_hours: u64, clock: SharedClock) -> Self {
        Self {
            points: VecDeque::new(),
            retention: Duration::hours(retention_hours.min(MAX_RETENTION_HOURS) as i64),
            clock,
        }
    }

    pub fn add_metric(&mut self, name: impl Into<String>, value: f64, labels: BTreeMap<String, String>) {
        self.points.push_back(MetricPoint {
            name: name.into(),
            value,
            timestamp: self.clock.now(),
            labels,
        });
        self.prune();
    }

    fn prune(&mut self) {
        let Some(cutoff) = self.clock.now().checked_sub_signed(self.retention) else {
            return;
        };
        while self.points.front().is_some_and(|p| p.timestamp < cutoff) {
            self.points.pop_front();
        }
    }

    /// Points matching every given filter. `window` defaults to the retention horizon.
    pub fn metrics(
        &self,
        name: Option<&str>,
        labels: Option<&BTreeMap<String, String>>,
        window: Option<Duration>,
    ) -> Vec<MetricPoint> {
        let cutoff = self
            .clock
            .now()
            .checked_sub_signed(window.unwrap_or(self.retention))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.points
            .iter()
            .filter(|p| p.timestamp >= cutoff)
            .filter(|p| name.map_or(true, |n| p.name == n))
            .filter(|p| labels.map_or(true, |want| want.iter().all(|(k, v)| p.labels.get(k) == Some(v))))
            .cloned()
            .collect()
    }

    pub fn latest(&self, name: &str) -> Option<&MetricPoint> {
        self.points.iter().rev().find(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
