//! LLM-driven rule discovery.
//!
//! When utility drops below its threshold the orchestrator asks a language
//! model for new condition/action rules. Suggestions are parsed as data and
//! merged into the state and the genetic population; nothing the model
//! returns is ever executed.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tracing::{info, warn};

use crate::error::{AliceError, Result};
use crate::genetics::{Gene, GeneticRuleSystem, Rule};
use crate::kernel::bus::EventManager;
use crate::kernel::event::{topics, EventPriority};
use crate::kernel::state::{StateManager, StateSummary};
use crate::services::llm::{parse_rule_suggestions, Completion};
use crate::utility::UtilityManager;

const SYSTEM_PROMPT: &str = "You tune a desktop automation assistant. \
Reply with a JSON array of rules only. Each rule is an object \
{\"condition\": {\"metric\": <metric name>, \"comparator\": one of \">\", \">=\", \"<\", \"<=\", \"==\", \"threshold\": <number>}, \
\"action\": <short snake_case action name>, \"strength\": <0..1>, \"confidence\": <0..1>}. \
Metric names are the keys of the metrics object you are given.";

const HISTORY_WINDOW: usize = 10;

pub fn build_prompt(summary: &StateSummary, utility_history: &[f64], threshold: f64) -> String {
    let state = serde_json::to_string_pretty(summary).unwrap_or_default();
    format!(
        "Current state:\n{state}\n\nRecent utility scores (oldest first): {utility_history:?}\n\
         The target utility is {threshold}. Suggest up to five rules that would raise it."
    )
}

pub struct SelfImprovement {
    llm: Arc<dyn Completion>,
    time_limit: Duration,
    events: EventManager,
}

impl SelfImprovement {
    pub fn new(llm: Arc<dyn Completion>, time_limit: Duration, events: EventManager) -> Self {
        Self {
            llm,
            time_limit,
            events,
        }
    }

    /// Ask the model for rules within the time limit.
    pub async fn suggest(&self, prompt: &str) -> Result<Vec<Rule>> {
        let completion = tokio::time::timeout(self.time_limit, self.llm.complete(SYSTEM_PROMPT, prompt))
            .await
            .map_err(|_| AliceError::Timeout(self.time_limit))??;
        Ok(parse_rule_suggestions(&completion))
    }

    /// Record `rules` as active, seed a gene with them and evolve one generation.
    pub fn apply(&self, rules: Vec<Rule>, state: &mut StateManager, genetics: &mut GeneticRuleSystem) -> usize {
        if rules.is_empty() {
            return 0;
        }
        let count = rules.len();
        for rule in &rules {
            state.add_rule(rule.clone());
        }
        let gene = Gene::new(rules, 1.0).with_metadata([("origin".to_string(), json!("self_improvement"))].into());
        genetics.add_gene(gene);
        genetics.evolve(state.metrics());
        count
    }

    /// Full round: prompt from current state, ask, apply. Returns the number
    /// of rules learned.
    pub async fn improve(
        &self,
        state: &Mutex<StateManager>,
        utility: &Mutex<UtilityManager>,
        genetics: &Mutex<GeneticRuleSystem>,
    ) -> Result<usize> {
        let prompt = {
            let summary = state.lock().unwrap_or_else(|e| e.into_inner()).summary();
            let utility = utility.lock().unwrap_or_else(|e| e.into_inner());
            build_prompt(&summary, &utility.history(HISTORY_WINDOW), utility.threshold())
        };

        let rules = self.suggest(&prompt).await?;
        if rules.is_empty() {
            warn!("Self-improvement produced no usable rules");
            return Ok(0);
        }

        let learned = {
            let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
            let mut genetics = genetics.lock().unwrap_or_else(|e| e.into_inner());
            self.apply(rules, &mut state, &mut genetics)
        };

        info!("Self-improvement learned {} rules", learned);
        self.events.emit_from(
            topics::RULES_LEARNED,
            json!({ "count": learned }),
            EventPriority::Medium,
            "improvement",
        );
        Ok(learned)
    }
}
