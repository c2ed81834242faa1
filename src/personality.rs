//! Trait-based personality that shapes interaction pacing.

use std::collections::{BTreeMap, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const MAX_MEMORIES: usize = 1000;
const TRAIT_LEARNING_RATE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitKind {
    Openness,
    Conscientiousness,
    Extraversion,
    Agreeableness,
    Neuroticism,
    Curiosity,
    Creativity,
    Empathy,
}

impl TraitKind {
    pub const ALL: [TraitKind; 8] = [
        TraitKind::Openness,
        TraitKind::Conscientiousness,
        TraitKind::Extraversion,
        TraitKind::Agreeableness,
        TraitKind::Neuroticism,
        TraitKind::Curiosity,
        TraitKind::Creativity,
        TraitKind::Empathy,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TraitKind::Openness => "openness",
            TraitKind::Conscientiousness => "conscientiousness",
            TraitKind::Extraversion => "extraversion",
            TraitKind::Agreeableness => "agreeableness",
            TraitKind::Neuroticism => "neuroticism",
            TraitKind::Curiosity => "curiosity",
            TraitKind::Creativity => "creativity",
            TraitKind::Empathy => "empathy",
        }
    }

    fn default_value(&self) -> f64 {
        match self {
            TraitKind::Openness => 0.7,
            TraitKind::Conscientiousness => 0.8,
            TraitKind::Extraversion => 0.6,
            TraitKind::Agreeableness => 0.7,
            TraitKind::Neuroticism => 0.4,
            TraitKind::Curiosity => 0.8,
            TraitKind::Creativity => 0.7,
            TraitKind::Empathy => 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PersonalityTrait {
    pub kind: TraitKind,
    pub value: f64,
    pub learning_rate: f64,
}

impl PersonalityTrait {
    pub fn new(kind: TraitKind, value: f64) -> Self {
        Self {
            kind,
            value: value.clamp(0.0, 1.0),
            learning_rate: TRAIT_LEARNING_RATE,
        }
    }

    pub fn adapt(&mut self, experience: f64) {
        self.value = (self.value + self.learning_rate * experience).clamp(0.0, 1.0);
    }
}

/// Pleasure / arousal / dominance, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mood {
    pub pleasure: f64,
    pub arousal: f64,
    pub dominance: f64,
}

impl Default for Mood {
    fn default() -> Self {
        Self {
            pleasure: 0.5,
            arousal: 0.5,
            dominance: 0.5,
        }
    }
}

/// Named deltas: trait names adapt traits, `pleasure`/`arousal`/`dominance` shift mood.
pub type Experience = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseAspect {
    Content,
    Style,
    Emotion,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonalitySummary {
    pub name: String,
    pub traits: BTreeMap<TraitKind, f64>,
    pub mood: Mood,
    pub trait_relationships: Vec<(TraitKind, TraitKind, f64)>,
    pub memories: usize,
}

#[derive(Debug)]
pub struct PersonalitySystem {
    name: String,
    traits: BTreeMap<TraitKind, PersonalityTrait>,
    mood: Mood,
    memories: VecDeque<Experience>,
    network: BTreeMap<(TraitKind, TraitKind), f64>,
}

impl Default for PersonalitySystem {
    fn default() -> Self {
        Self::new("Alice")
    }
}

impl PersonalitySystem {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_rng(name, &mut StdRng::from_entropy())
    }

    pub fn with_rng<R: Rng + ?Sized>(name: impl Into<String>, rng: &mut R) -> Self {
        let traits = TraitKind::ALL
            .into_iter()
            .map(|k| (k, PersonalityTrait::new(k, k.default_value())))
            .collect();

        let mut network = BTreeMap::new();
        for a in TraitKind::ALL {
            for b in TraitKind::ALL {
                if a != b {
                    network.insert((a, b), rng.gen_range(-0.5..=0.5));
                }
            }
        }

        Self {
            name: name.into(),
            traits,
            mood: Mood::default(),
            memories: VecDeque::with_capacity(MAX_MEMORIES),
            network,
        }
    }

    pub fn trait_value(&self, kind: TraitKind) -> f64 {
        self.traits.get(&kind).map_or(0.5, |t| t.value)
    }

    pub fn mood(&self) -> Mood {
        self.mood
    }

    pub fn memories(&self) -> usize {
        self.memories.len()
    }

    pub fn relationship(&self, from: TraitKind, to: TraitKind) -> Option<f64> {
        self.network.get(&(from, to)).copied()
    }

    pub fn update_from_experience(&mut self, experience: Experience) {
        for t in self.traits.values_mut() {
            let delta = experience.get(t.kind.name()).copied().unwrap_or(0.0);
            t.adapt(delta);
        }

        let delta = |key: &str| experience.get(key).copied().unwrap_or(0.0);
        self.mood.pleasure = (self.mood.pleasure + delta("pleasure")).clamp(0.0, 1.0);
        self.mood.arousal = (self.mood.arousal + delta("arousal")).clamp(0.0, 1.0);
        self.mood.dominance = (self.mood.dominance + delta("dominance")).clamp(0.0, 1.0);

        if self.memories.len() >= MAX_MEMORIES {
            self.memories.pop_front();
        }
        self.memories.push_back(experience);

        self.update_trait_network();
        debug!("Personality updated from experience ({} memories)", self.memories.len());
    }

    fn update_trait_network(&mut self) {
        let values: BTreeMap<TraitKind, f64> = self.traits.iter().map(|(k, t)| (*k, t.value)).collect();
        for ((a, b), weight) in self.network.iter_mut() {
            let v1 = values.get(a).copied().unwrap_or(0.5);
            let v2 = values.get(b).copied().unwrap_or(0.5);
            let correlation = (v1 - 0.5) * (v2 - 0.5) * 4.0;
            *weight = 0.9 * *weight + 0.1 * correlation;
        }
    }

    pub fn response_modulation(&self, aspect: ResponseAspect) -> f64 {
        let (a, b) = match aspect {
            ResponseAspect::Content => (TraitKind::Openness, TraitKind::Conscientiousness),
            ResponseAspect::Style => (TraitKind::Extraversion, TraitKind::Agreeableness),
            ResponseAspect::Emotion => (TraitKind::Neuroticism, TraitKind::Empathy),
        };
        (0.5 + self.trait_value(a)) * (0.5 + self.trait_value(b))
    }

    /// Seconds between keystrokes.
    pub fn typing_interval(&self) -> f64 {
        let creativity = self.trait_value(TraitKind::Creativity);
        (0.1 * (1.0 + (creativity - 0.5) * 0.4)).clamp(0.05, 0.3)
    }

    /// Seconds to pause between actions; `speed_factor` > 1 slows down.
    pub fn action_delay(&self, speed_factor: f64) -> f64 {
        let conscientiousness = self.trait_value(TraitKind::Conscientiousness);
        (0.1 * (1.0 + (conscientiousness - 0.5) * 0.4) * speed_factor).clamp(0.05, 0.5)
    }

    pub fn summary(&self) -> PersonalitySummary {
        PersonalitySummary {
            name: self.name.clone(),
            traits: self.traits.iter().map(|(k, t)| (*k, t.value)).collect(),
            mood: self.mood,
            trait_relationships: self.network.iter().map(|((a, b), w)| (*a, *b, *w)).collect(),
            memories: self.memories.len(),
        }
    }
}
