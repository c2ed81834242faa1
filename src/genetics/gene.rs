use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::rule::Rule;
use crate::kernel::time::elapsed_secs;

pub type GeneId = Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gene {
    pub id: GeneId,
    pub rules: Vec<Rule>,
    pub priority: f64,
    pub metadata: BTreeMap<String, Value>,
    pub fitness: f64,
    pub expression_level: f64,
    pub regulatory_factors: BTreeMap<String, f64>,
    pub mutation_rate: f64,
    pub created_at: DateTime<Utc>,
}

impl Default for Gene {
    fn default() -> Self {
        Self::new(Vec::new(), 1.0)
    }
}

impl Gene {
    pub fn new(rules: Vec<Rule>, priority: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            rules,
            priority,
            metadata: BTreeMap::new(),
            fitness: 1.0,
            expression_level: 1.0,
            regulatory_factors: BTreeMap::new(),
            mutation_rate: 0.1,
            created_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn remove_rule(&mut self, rule_id: &str) -> Option<Rule> {
        let index = self.rules.iter().position(|r| r.id == rule_id)?;
        Some(self.rules.remove(index))
    }

    /// Mean rule quality scaled by priority and expression. Zero for an empty gene.
    pub fn calculate_fitness(&mut self) -> f64 {
        self.fitness = if self.rules.is_empty() {
            0.0
        } else {
            let total: f64 = self.rules.iter().map(|r| r.strength * r.confidence).sum();
            total / self.rules.len() as f64 * self.priority * self.expression_level
        };
        self.fitness
    }

    pub fn mutate<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if rng.gen::<f64>() >= self.mutation_rate {
            return;
        }
        self.priority *= rng.gen_range(0.8..=1.2);
        for rule in &mut self.rules {
            if rng.gen::<f64>() < self.mutation_rate {
                rule.strength *= rng.gen_range(0.9..=1.1);
            }
        }
    }

    /// Sigmoid of the summed regulatory factors.
    pub fn update_expression(&mut self) {
        let influence: f64 = self.regulatory_factors.values().sum();
        self.expression_level = 1.0 / (1.0 + (-influence).exp());
    }

    pub fn decay(&mut self, now: DateTime<Utc>, rate: f64) {
        let age = elapsed_secs(self.created_at, now);
        self.priority *= (-rate * age).exp();
    }
}
