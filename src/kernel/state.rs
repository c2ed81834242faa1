//! Shared system state with exponential time decay.
//!
//! Gauges (load, confidence, complexity, novelty, average task time) are
//! scaled by `exp(-0.1 * dt_hours)` whenever they are written. Counters are
//! tallies and are stored as given.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::time::{elapsed_secs, system_clock, SharedClock};
use crate::genetics::Rule;

pub const MAX_INTERACTIONS: usize = 1000;
const STATE_DECAY_PER_HOUR: f64 = 0.1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemMetrics {
    pub complexity: f64,
    pub novelty: f64,
    pub confidence: f64,
    pub completed_tasks: u64,
    pub total_tasks: u64,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub new_rules_generated: u64,
    pub average_task_time: f64,
    pub error_count: u64,
}

impl Default for SystemMetrics {
    fn default() -> Self {
        Self {
            complexity: 0.0,
            novelty: 0.0,
            confidence: 1.0,
            completed_tasks: 0,
            total_tasks: 0,
            cpu_usage: 0.5,
            memory_usage: 0.5,
            new_rules_generated: 0,
            average_task_time: 1.0,
            error_count: 0,
        }
    }
}

impl SystemMetrics {
    /// Numeric lookup by field name, used by rule conditions.
    pub fn get(&self, name: &str) -> Option<f64> {
        let value = match name {
            "complexity" => self.complexity,
            "novelty" => self.novelty,
            "confidence" => self.confidence,
            "completed_tasks" => self.completed_tasks as f64,
            "total_tasks" => self.total_tasks as f64,
            "cpu_usage" => self.cpu_usage,
            "memory_usage" => self.memory_usage,
            "new_rules_generated" => self.new_rules_generated as f64,
            "average_task_time" => self.average_task_time,
            "error_count" => self.error_count as f64,
            _ => return None,
        };
        Some(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OperationalStatus {
    #[default]
    Ready,
    Processing,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationalState {
    pub status: OperationalStatus,
    pub last_update: DateTime<Utc>,
}

/// Partial write to [`SystemMetrics`]. `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct MetricsUpdate {
    pub complexity: Option<f64>,
    pub novelty: Option<f64>,
    pub confidence: Option<f64>,
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub average_task_time: Option<f64>,
    pub completed_tasks: Option<u64>,
    pub total_tasks: Option<u64>,
    pub new_rules_generated: Option<u64>,
    pub error_count: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub metrics: MetricsUpdate,
    /// Added to each emotion after decay.
    pub emotions: BTreeMap<String, f64>,
    pub status: Option<OperationalStatus>,
    pub current_task: Option<Option<String>>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: OperationalStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn current_task(mut self, task: Option<String>) -> Self {
        self.current_task = Some(task);
        self
    }

    pub fn emotion(mut self, name: impl Into<String>, delta: f64) -> Self {
        self.emotions.insert(name.into(), delta);
        self
    }

    pub fn metrics(mut self, metrics: MetricsUpdate) -> Self {
        self.metrics = metrics;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub label: String,
}

/// Small directed, labelled graph of things Alice has learned about.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    nodes: BTreeMap<String, Value>,
    edges: Vec<Edge>,
}

impl KnowledgeGraph {
    pub fn add_node(&mut self, id: impl Into<String>, data: Value) {
        self.nodes.insert(id.into(), data);
    }

    /// Missing endpoints are created with null data.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>, label: impl Into<String>) {
        let from = from.into();
        let to = to.into();
        self.nodes.entry(from.clone()).or_insert(Value::Null);
        self.nodes.entry(to.clone()).or_insert(Value::Null);
        self.edges.push(Edge {
            from,
            to,
            label: label.into(),
        });
    }

    pub fn node(&self, id: &str) -> Option<&Value> {
        self.nodes.get(id)
    }

    pub fn neighbors(&self, id: &str) -> Vec<(&str, &str)> {
        self.edges
            .iter()
            .filter(|e| e.from == id)
            .map(|e| (e.to.as_str(), e.label.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSummary {
    pub metrics: SystemMetrics,
    pub emotions: BTreeMap<String, f64>,
    pub operational: OperationalState,
    pub current_task: Option<String>,
    pub pending_actions: usize,
    pub active_rules: usize,
    pub knowledge_nodes: usize,
    pub interactions: usize,
}

#[derive(Debug)]
pub struct StateManager {
    metrics: SystemMetrics,
    emotions: BTreeMap<String, f64>,
    operational: OperationalState,
    current_task: Option<String>,
    interactions: VecDeque<InteractionRecord>,
    pending_actions: Vec<Value>,
    active_rules: Vec<Rule>,
    knowledge: KnowledgeGraph,
    last_update: DateTime<Utc>,
    finished_tasks: u64,
    clock: SharedClock,
}

impl StateManager {
    pub fn new(emotions: BTreeMap<String, f64>) -> Self {
        Self::with_clock(emotions, system_clock())
    }

    pub fn with_clock(emotions: BTreeMap<String, f64>, clock: SharedClock) -> Self {
        let now = clock.now();
        let emotions = emotions
            .into_iter()
            .map(|(k, v)| (k, v.clamp(0.0, 1.0)))
            .collect();
        Self {
            metrics: SystemMetrics::default(),
            emotions,
            operational: OperationalState {
                status: OperationalStatus::Ready,
                last_update: now,
            },
            current_task: None,
            interactions: VecDeque::with_capacity(MAX_INTERACTIONS),
            pending_actions: Vec::new(),
            active_rules: Vec::new(),
            knowledge: KnowledgeGraph::default(),
            last_update: now,
            finished_tasks: 0,
            clock,
        }
    }

    pub fn update(&mut self, update: StateUpdate) {
        let now = self.clock.now();
        self.update_at(now, update);
    }

    pub fn update_at(&mut self, now: DateTime<Utc>, update: StateUpdate) {
        let dt = elapsed_secs(self.last_update, now);
        let decay = (-STATE_DECAY_PER_HOUR * dt / 3600.0).exp();

        let m = update.metrics;
        let gauges = [
            (&mut self.metrics.complexity, m.complexity),
            (&mut self.metrics.novelty, m.novelty),
            (&mut self.metrics.confidence, m.confidence),
            (&mut self.metrics.cpu_usage, m.cpu_usage),
            (&mut self.metrics.memory_usage, m.memory_usage),
            (&mut self.metrics.average_task_time, m.average_task_time),
        ];
        for (slot, value) in gauges {
            if let Some(v) = value {
                *slot = v * decay;
            }
        }

        let counters = [
            (&mut self.metrics.completed_tasks, m.completed_tasks),
            (&mut self.metrics.total_tasks, m.total_tasks),
            (&mut self.metrics.new_rules_generated, m.new_rules_generated),
            (&mut self.metrics.error_count, m.error_count),
        ];
        for (slot, value) in counters {
            if let Some(v) = value {
                *slot = v;
            }
        }

        for (name, value) in self.emotions.iter_mut() {
            let delta = update.emotions.get(name).copied().unwrap_or(0.0);
            *value = (*value * decay + delta).clamp(0.0, 1.0);
        }
        for (name, delta) in update.emotions {
            self.emotions.entry(name).or_insert_with(|| delta.clamp(0.0, 1.0));
        }

        if let Some(status) = update.status {
            self.operational.status = status;
        }
        if let Some(task) = update.current_task {
            self.current_task = task;
        }

        self.operational.last_update = now;
        self.last_update = now;
        debug!("State updated (decay {:.4})", decay);
    }

    pub fn metrics(&self) -> &SystemMetrics {
        &self.metrics
    }

    pub fn emotions(&self) -> &BTreeMap<String, f64> {
        &self.emotions
    }

    pub fn status(&self) -> OperationalStatus {
        self.operational.status
    }

    pub fn current_task(&self) -> Option<&str> {
        self.current_task.as_deref()
    }

    pub fn summary(&self) -> StateSummary {
        StateSummary {
            metrics: self.metrics.clone(),
            emotions: self.emotions.clone(),
            operational: self.operational.clone(),
            current_task: self.current_task.clone(),
            pending_actions: self.pending_actions.len(),
            active_rules: self.active_rules.len(),
            knowledge_nodes: self.knowledge.len(),
            interactions: self.interactions.len(),
        }
    }

    pub fn add_interaction(&mut self, kind: impl Into<String>, data: Value) {
        if self.interactions.len() >= MAX_INTERACTIONS {
            self.interactions.pop_front();
        }
        self.interactions.push_back(InteractionRecord {
            timestamp: self.clock.now(),
            kind: kind.into(),
            data,
        });
    }

    /// Most recent `n` interactions, oldest first.
    pub fn recent_interactions(&self, n: usize) -> Vec<InteractionRecord> {
        let skip = self.interactions.len().saturating_sub(n);
        self.interactions.iter().skip(skip).cloned().collect()
    }

    pub fn push_pending_action(&mut self, action: Value) {
        self.pending_actions.push(action);
    }

    pub fn clear_pending_actions(&mut self) {
        self.pending_actions.clear();
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.active_rules.push(rule);
        self.metrics.new_rules_generated += 1;
    }

    pub fn active_rules(&self) -> &[Rule] {
        &self.active_rules
    }

    pub fn knowledge(&self) -> &KnowledgeGraph {
        &self.knowledge
    }

    pub fn knowledge_mut(&mut self) -> &mut KnowledgeGraph {
        &mut self.knowledge
    }

    /// Fold one task duration into the running average.
    pub fn record_task_duration(&mut self, secs: f64) {
        self.finished_tasks += 1;
        let n = self.finished_tasks as f64;
        let avg = self.metrics.average_task_time;
        self.metrics.average_task_time = if self.finished_tasks == 1 {
            secs
        } else {
            avg + (secs - avg) / n
        };
    }
}
