use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const MAX_DURATIONS: usize = 1000;

#[derive(Debug, Clone, Default)]
pub struct InteractionMetrics {
    pub total_actions: u64,
    pub successful_actions: u64,
    pub failed_actions: u64,
    pub last_action_time: Option<DateTime<Utc>>,
    durations: VecDeque<f64>,
}

impl InteractionMetrics {
    pub fn record(&mut self, success: bool, duration_secs: f64, at: DateTime<Utc>) {
        self.total_actions += 1;
        if success {
            self.successful_actions += 1;
        } else {
            self.failed_actions += 1;
        }
        if self.durations.len() >= MAX_DURATIONS {
            self.durations.pop_front();
        }
        self.durations.push_back(duration_secs);
        self.last_action_time = Some(at);
    }

    pub fn average_duration(&self) -> f64 {
        if self.durations.is_empty() {
            0.0
        } else {
            self.durations.iter().sum::<f64>() / self.durations.len() as f64
        }
    }

    pub fn durations(&self) -> usize {
        self.durations.len()
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_actions: self.total_actions,
            successful_actions: self.successful_actions,
            failed_actions: self.failed_actions,
            average_duration: self.average_duration(),
            last_action_time: self.last_action_time,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub total_actions: u64,
    pub successful_actions: u64,
    pub failed_actions: u64,
    pub average_duration: f64,
    pub last_action_time: Option<DateTime<Utc>>,
}
