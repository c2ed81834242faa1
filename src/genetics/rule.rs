use serde::{Deserialize, Serialize};

use crate::kernel::state::SystemMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
}

impl Comparator {
    pub fn apply(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparator::Gt => lhs > rhs,
            Comparator::Ge => lhs >= rhs,
            Comparator::Lt => lhs < rhs,
            Comparator::Le => lhs <= rhs,
            Comparator::Eq => (lhs - rhs).abs() < f64::EPSILON,
        }
    }
}

/// `metric <comparator> threshold` over [`SystemMetrics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCondition {
    pub metric: String,
    pub comparator: Comparator,
    pub threshold: f64,
}

impl RuleCondition {
    pub fn new(metric: impl Into<String>, comparator: Comparator, threshold: f64) -> Self {
        Self {
            metric: metric.into(),
            comparator,
            threshold,
        }
    }
}

fn new_rule_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn one() -> f64 {
    1.0
}

/// A condition/action pair. Rules are data; the action is a name that the
/// orchestrator may act on, never code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default = "new_rule_id")]
    pub id: String,
    pub condition: RuleCondition,
    pub action: String,
    #[serde(default = "one")]
    pub strength: f64,
    #[serde(default = "one")]
    pub confidence: f64,
}

impl Rule {
    pub fn new(condition: RuleCondition, action: impl Into<String>) -> Self {
        Self {
            id: new_rule_id(),
            condition,
            action: action.into(),
            strength: 1.0,
            confidence: 1.0,
        }
    }

    pub fn with_strength(mut self, strength: f64) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Unknown metrics never match.
    pub fn matches(&self, metrics: &SystemMetrics) -> bool {
        metrics
            .get(&self.condition.metric)
            .is_some_and(|v| self.condition.comparator.apply(v, self.condition.threshold))
    }
}
