//! Weighted condition/action rules grouped into genes and evolved as a population.

mod gene;
mod population;
mod rule;

pub use gene::{Gene, GeneId};
pub use population::{interaction_strength, GeneticRuleSystem, DEFAULT_CROSSOVER_RATE, DEFAULT_POPULATION};
pub use rule::{Comparator, Rule, RuleCondition};
