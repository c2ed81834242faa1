use std::collections::{BTreeMap, HashMap, HashSet};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use super::gene::{Gene, GeneId};
use crate::kernel::state::SystemMetrics;

pub const DEFAULT_POPULATION: usize = 100;
pub const DEFAULT_CROSSOVER_RATE: f64 = 0.7;
const TOURNAMENT_SIZE: usize = 5;

/// Population of rule genes evolved by tournament selection and crossover.
#[derive(Debug)]
pub struct GeneticRuleSystem {
    genes: Vec<Gene>,
    population_size: usize,
    crossover_rate: f64,
    elite_size: usize,
    generation: u64,
    /// Outgoing edges, weighted by rule overlap.
    network: HashMap<GeneId, Vec<(GeneId, f64)>>,
    rng: StdRng,
}

impl Default for GeneticRuleSystem {
    fn default() -> Self {
        Self::new(DEFAULT_POPULATION)
    }
}

fn tournament(genes: &[Gene], rng: &mut StdRng) -> Option<usize> {
    if genes.is_empty() {
        return None;
    }
    let size = TOURNAMENT_SIZE.min(genes.len());
    rand::seq::index::sample(rng, genes.len(), size)
        .into_iter()
        .max_by(|a, b| genes[*a].fitness.total_cmp(&genes[*b].fitness))
}

fn cross(rng: &mut StdRng, rate: f64, a: &Gene, b: &Gene) -> Gene {
    if rng.gen::<f64>() < rate {
        let mut rules: Vec<_> = a.rules.choose_multiple(rng, a.rules.len() / 2).cloned().collect();
        rules.extend(b.rules.choose_multiple(rng, b.rules.len() / 2).cloned());

        let mut metadata: BTreeMap<_, _> = a.metadata.clone();
        metadata.extend(b.metadata.clone());
        Gene::new(rules, (a.priority + b.priority) / 2.0).with_metadata(metadata)
    } else {
        let parent = if rng.gen_bool(0.5) { a } else { b };
        let mut child = Gene::new(parent.rules.clone(), parent.priority).with_metadata(parent.metadata.clone());
        child.fitness = parent.fitness;
        child
    }
}

/// |A ∩ B| / max(|A|, |B|) over rule ids.
pub fn interaction_strength(a: &Gene, b: &Gene) -> f64 {
    let largest = a.rules.len().max(b.rules.len());
    if largest == 0 {
        return 0.0;
    }
    let ids: HashSet<&str> = a.rules.iter().map(|r| r.id.as_str()).collect();
    let overlap = b
        .rules
        .iter()
        .map(|r| r.id.as_str())
        .collect::<HashSet<_>>()
        .intersection(&ids)
        .count();
    overlap as f64 / largest as f64
}

impl GeneticRuleSystem {
    pub fn new(population_size: usize) -> Self {
        Self::with_rng(population_size, StdRng::from_entropy())
    }

    pub fn with_rng(population_size: usize, rng: StdRng) -> Self {
        Self {
            genes: Vec::new(),
            population_size,
            crossover_rate: DEFAULT_CROSSOVER_RATE,
            elite_size: population_size / 10,
            generation: 0,
            network: HashMap::new(),
            rng,
        }
    }

    pub fn genes(&self) -> &[Gene] {
        &self.genes
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn elite_size(&self) -> usize {
        self.elite_size
    }

    pub fn add_gene(&mut self, gene: Gene) -> GeneId {
        let id = gene.id;
        self.network.entry(id).or_default();
        self.genes.push(gene);
        id
    }

    pub fn remove_gene(&mut self, id: GeneId) -> Option<Gene> {
        let index = self.genes.iter().position(|g| g.id == id)?;
        self.network.remove(&id);
        for edges in self.network.values_mut() {
            edges.retain(|(to, _)| *to != id);
        }
        Some(self.genes.remove(index))
    }

    pub fn crossover(&mut self, a: &Gene, b: &Gene) -> Gene {
        cross(&mut self.rng, self.crossover_rate, a, b)
    }

    /// Fittest gene out of a random tournament.
    pub fn select_parent(&mut self) -> Option<&Gene> {
        let index = tournament(&self.genes, &mut self.rng)?;
        self.genes.get(index)
    }

    /// One generation: score, keep the elite, refill with mutated children.
    pub fn evolve(&mut self, metrics: &SystemMetrics) {
        if self.genes.is_empty() {
            debug!("Skipping evolution of an empty population");
            return;
        }

        for gene in &mut self.genes {
            gene.calculate_fitness();
        }
        self.genes.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));

        let elite = self.elite_size.min(self.genes.len()).max(1);
        let mut next: Vec<Gene> = self.genes[..elite].to_vec();
        while next.len() < self.population_size {
            let (Some(i), Some(j)) = (
                tournament(&self.genes, &mut self.rng),
                tournament(&self.genes, &mut self.rng),
            ) else {
                break;
            };
            let mut child = cross(&mut self.rng, self.crossover_rate, &self.genes[i], &self.genes[j]);
            child.mutate(&mut self.rng);
            next.push(child);
        }

        self.genes = next;
        self.generation += 1;
        self.rebuild_network();

        let matching = self.matching_actions(metrics).len();
        info!(
            "Generation {} evolved: {} genes, best fitness {:.3}, {} matching actions",
            self.generation,
            self.genes.len(),
            self.best_gene().map_or(0.0, |g| g.fitness),
            matching
        );
    }

    fn rebuild_network(&mut self) {
        self.network.clear();
        for a in &self.genes {
            let edges = self
                .genes
                .iter()
                .filter(|b| b.id != a.id)
                .filter_map(|b| {
                    let weight = interaction_strength(a, b);
                    (weight > 0.0).then_some((b.id, weight))
                })
                .collect();
            self.network.insert(a.id, edges);
        }
    }

    pub fn edge_weight(&self, from: GeneId, to: GeneId) -> Option<f64> {
        self.network
            .get(&from)?
            .iter()
            .find(|(id, _)| *id == to)
            .map(|(_, w)| *w)
    }

    /// Feed incoming edge weight into each gene's "network" factor and re-express.
    pub fn update_regulatory_factors(&mut self) {
        let mut incoming: HashMap<GeneId, f64> = HashMap::new();
        for edges in self.network.values() {
            for (to, weight) in edges {
                *incoming.entry(*to).or_default() += weight;
            }
        }
        for gene in &mut self.genes {
            let sum = incoming.get(&gene.id).copied().unwrap_or(0.0);
            gene.regulatory_factors.insert("network".to_string(), sum);
            gene.update_expression();
        }
    }

    pub fn best_gene(&self) -> Option<&Gene> {
        self.genes.iter().max_by(|a, b| a.fitness.total_cmp(&b.fitness))
    }

    /// Actions of all rules that fire on `metrics`, fittest genes first, without repeats.
    pub fn matching_actions(&self, metrics: &SystemMetrics) -> Vec<String> {
        let mut ranked: Vec<&Gene> = self.genes.iter().collect();
        ranked.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));

        let mut seen = HashSet::new();
        ranked
            .into_iter()
            .flat_map(|g| g.rules.iter())
            .filter(|r| r.matches(metrics))
            .filter(|r| seen.insert(r.action.clone()))
            .map(|r| r.action.clone())
            .collect()
    }
}
