use alice::personality::{Experience, PersonalitySystem, ResponseAspect, TraitKind, MAX_MEMORIES};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn personality() -> PersonalitySystem {
    PersonalitySystem::with_rng("Alice", &mut StdRng::seed_from_u64(1))
}

fn experience(pairs: &[(&str, f64)]) -> Experience {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[test]
fn test_defaults() {
    let p = personality();
    assert_eq!(p.trait_value(TraitKind::Conscientiousness), 0.8);
    assert_eq!(p.trait_value(TraitKind::Neuroticism), 0.4);
    assert_eq!(p.mood().pleasure, 0.5);

    let w = p.relationship(TraitKind::Openness, TraitKind::Empathy).unwrap();
    assert!((-0.5..=0.5).contains(&w));
    assert!(p.relationship(TraitKind::Openness, TraitKind::Openness).is_none());
}

#[test]
fn test_experience_adapts_traits_and_mood() {
    let mut p = personality();
    p.update_from_experience(experience(&[("openness", 1.0), ("pleasure", 0.3), ("arousal", -1.0)]));

    assert!((p.trait_value(TraitKind::Openness) - 0.8).abs() < 1e-9);
    assert!((p.mood().pleasure - 0.8).abs() < 1e-9);
    assert_eq!(p.mood().arousal, 0.0);
    assert_eq!(p.memories(), 1);

    p.update_from_experience(experience(&[("curiosity", 10.0)]));
    assert_eq!(p.trait_value(TraitKind::Curiosity), 1.0);
}

#[test]
fn test_memories_are_bounded() {
    let mut p = personality();
    for _ in 0..MAX_MEMORIES + 10 {
        p.update_from_experience(Experience::new());
    }
    assert_eq!(p.memories(), MAX_MEMORIES);
}

#[test]
fn test_network_moves_toward_trait_correlation() {
    let mut p = personality();
    let before = p.relationship(TraitKind::Conscientiousness, TraitKind::Curiosity).unwrap();
    p.update_from_experience(Experience::new());
    let after = p.relationship(TraitKind::Conscientiousness, TraitKind::Curiosity).unwrap();
    let correlation = (0.8 - 0.5) * (0.8 - 0.5) * 4.0;
    assert!((after - (0.9 * before + 0.1 * correlation)).abs() < 1e-9);
}

#[test]
fn test_pacing_and_modulation() {
    let p = personality();
    assert!((p.typing_interval() - 0.1 * (1.0 + 0.2 * 0.4)).abs() < 1e-9);
    assert!((p.action_delay(1.0) - 0.1 * (1.0 + 0.3 * 0.4)).abs() < 1e-9);
    assert_eq!(p.action_delay(100.0), 0.5);
    assert!((p.response_modulation(ResponseAspect::Content) - 1.2 * 1.3).abs() < 1e-9);
}

#[test]
fn test_summary_serializes_trait_names() {
    let p = personality();
    let json = serde_json::to_value(p.summary()).unwrap();
    assert_eq!(json["name"], "Alice");
    assert_eq!(json["traits"]["empathy"], 0.6);
    assert_eq!(json["trait_relationships"].as_array().unwrap().len(), 56);
}
