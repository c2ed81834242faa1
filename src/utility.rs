//! Weighted utility score over the system state.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::kernel::state::StateManager;
use crate::kernel::time::{elapsed_secs, system_clock, SharedClock};

pub const TASK_SUCCESS: &str = "task_success";
pub const RESOURCE_EFFICIENCY: &str = "resource_efficiency";
pub const LEARNING_EFFICIENCY: &str = "learning_efficiency";
pub const TIME_EFFICIENCY: &str = "time_efficiency";

const COMPONENTS: [&str; 4] = [TASK_SUCCESS, RESOURCE_EFFICIENCY, LEARNING_EFFICIENCY, TIME_EFFICIENCY];
const TARGET_TASK_SECS: f64 = 0.5;
const UTILITY_DECAY_PER_HOUR: f64 = 0.01;
const MAX_HISTORY: usize = 10_000;

pub fn default_weights() -> BTreeMap<String, f64> {
    BTreeMap::from([
        (TASK_SUCCESS.to_string(), 0.4),
        (RESOURCE_EFFICIENCY.to_string(), 0.3),
        (LEARNING_EFFICIENCY.to_string(), 0.2),
        (TIME_EFFICIENCY.to_string(), 0.1),
    ])
}

#[derive(Debug, Error, PartialEq)]
pub enum UtilityError {
    #[error("weights must sum to 1.0 (got {0})")]
    WeightsSum(f64),

    #[error("unknown utility component '{0}'")]
    UnknownComponent(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ComponentScores {
    pub task_success: f64,
    pub resource_efficiency: f64,
    pub learning_efficiency: f64,
    pub time_efficiency: f64,
}

impl ComponentScores {
    pub fn from_state(state: &StateManager) -> Self {
        let m = state.metrics();
        let task_success = if m.total_tasks > 0 {
            m.completed_tasks as f64 / m.total_tasks as f64
        } else {
            0.0
        };
        let resource_efficiency = 1.0 - (0.5 * m.cpu_usage + 0.5 * m.memory_usage);
        let rules = state.active_rules().len();
        let learning_efficiency = if rules > 0 {
            m.new_rules_generated as f64 / rules as f64
        } else {
            0.0
        };
        let time_efficiency = (-(m.average_task_time - TARGET_TASK_SECS).abs()).exp();
        Self {
            task_success,
            resource_efficiency,
            learning_efficiency,
            time_efficiency,
        }
    }

    fn get(&self, component: &str) -> f64 {
        match component {
            TASK_SUCCESS => self.task_success,
            RESOURCE_EFFICIENCY => self.resource_efficiency,
            LEARNING_EFFICIENCY => self.learning_efficiency,
            TIME_EFFICIENCY => self.time_efficiency,
            _ => 0.0,
        }
    }
}

#[derive(Debug)]
pub struct UtilityManager {
    threshold: f64,
    weights: BTreeMap<String, f64>,
    history: VecDeque<f64>,
    last_evaluation: DateTime<Utc>,
    clock: SharedClock,
}

impl UtilityManager {
    pub fn new(threshold: f64) -> Self {
        Self::with_clock(threshold, system_clock())
    }

    pub fn with_clock(threshold: f64, clock: SharedClock) -> Self {
        info!("UtilityManager initialized (threshold {})", threshold);
        Self {
            threshold,
            weights: default_weights(),
            history: VecDeque::new(),
            last_evaluation: clock.now(),
            clock,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn weights(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }

    /// Score the state, discounted by the time since the last evaluation.
    pub fn evaluate(&mut self, state: &StateManager) -> f64 {
        let now = self.clock.now();
        let scores = ComponentScores::from_state(state);
        let hours = elapsed_secs(self.last_evaluation, now) / 3600.0;
        let decay = (-UTILITY_DECAY_PER_HOUR * hours).exp();

        let weighted: f64 = self
            .weights
            .iter()
            .map(|(component, weight)| weight * scores.get(component))
            .sum();
        let utility = weighted * decay;

        if self.history.len() >= MAX_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(utility);
        self.last_evaluation = now;

        info!("Utility evaluated: {:.4} (decay_factor: {:.4})", utility, decay);
        debug!("Component scores: {:?}", scores);
        utility
    }

    /// Last `n` scores, oldest first.
    pub fn history(&self, n: usize) -> Vec<f64> {
        let skip = self.history.len().saturating_sub(n);
        self.history.iter().skip(skip).copied().collect()
    }

    pub fn latest(&self) -> Option<f64> {
        self.history.back().copied()
    }

    pub fn needs_improvement(&self) -> bool {
        self.latest().is_some_and(|u| u < self.threshold)
    }

    pub fn adjust_weights(&mut self, weights: BTreeMap<String, f64>) -> Result<(), UtilityError> {
        if let Some(unknown) = weights.keys().find(|k| !COMPONENTS.contains(&k.as_str())) {
            return Err(UtilityError::UnknownComponent(unknown.clone()));
        }
        let sum: f64 = weights.values().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(UtilityError::WeightsSum(sum));
        }
        info!("Utility weights adjusted: {:?}", weights);
        self.weights = weights;
        Ok(())
    }
}
