use std::collections::BTreeMap;
use std::sync::Arc;

use alice::genetics::{Comparator, Rule, RuleCondition};
use alice::kernel::state::{MetricsUpdate, StateManager, StateUpdate};
use alice::kernel::time::ManualClock;
use alice::utility::{default_weights, ComponentScores, UtilityError, UtilityManager};

fn state(clock: &ManualClock) -> StateManager {
    StateManager::with_clock(BTreeMap::new(), Arc::new(clock.clone()))
}

#[test]
fn test_fresh_state_score() {
    let clock = ManualClock::default();
    let mut utility = UtilityManager::with_clock(0.8, Arc::new(clock.clone()));

    let score = utility.evaluate(&state(&clock));
    let expected = 0.3 * 0.5 + 0.1 * (-0.5f64).exp();
    assert!((score - expected).abs() < 1e-9, "got {score}");
    assert!(utility.needs_improvement());
    assert_eq!(utility.latest(), Some(score));
}

#[test]
fn test_components_follow_metrics() {
    let clock = ManualClock::default();
    let mut s = state(&clock);
    s.update(StateUpdate::new().metrics(MetricsUpdate {
        total_tasks: Some(4),
        completed_tasks: Some(3),
        cpu_usage: Some(0.2),
        memory_usage: Some(0.4),
        average_task_time: Some(0.5),
        ..MetricsUpdate::default()
    }));
    s.add_rule(Rule::new(RuleCondition::new("cpu_usage", Comparator::Gt, 0.9), "throttle"));

    let scores = ComponentScores::from_state(&s);
    assert_eq!(scores.task_success, 0.75);
    assert!((scores.resource_efficiency - 0.7).abs() < 1e-9);
    assert_eq!(scores.learning_efficiency, 1.0);
    assert_eq!(scores.time_efficiency, 1.0);
}

#[test]
fn test_time_since_last_evaluation_discounts() {
    let clock = ManualClock::default();
    let mut utility = UtilityManager::with_clock(0.1, Arc::new(clock.clone()));
    let s = state(&clock);

    let first = utility.evaluate(&s);
    clock.advance(chrono::Duration::hours(100));
    let second = utility.evaluate(&s);

    assert!((second - first * (-1.0f64).exp()).abs() < 1e-9);
    assert_eq!(utility.history(10), vec![first, second]);
    assert_eq!(utility.history(1), vec![second]);
}

#[test]
fn test_weight_adjustment_is_validated() {
    let mut utility = UtilityManager::new(0.8);

    let mut bad_sum = default_weights();
    bad_sum.insert("task_success".to_string(), 0.9);
    assert!(matches!(utility.adjust_weights(bad_sum), Err(UtilityError::WeightsSum(_))));

    let unknown = BTreeMap::from([("luck".to_string(), 1.0)]);
    assert_eq!(
        utility.adjust_weights(unknown),
        Err(UtilityError::UnknownComponent("luck".to_string()))
    );

    let only_success = BTreeMap::from([("task_success".to_string(), 1.0)]);
    utility.adjust_weights(only_success.clone()).unwrap();
    assert_eq!(utility.weights(), &only_success);
}

#[test]
fn test_no_history_means_no_improvement_needed() {
    let utility = UtilityManager::new(0.8);
    assert!(!utility.needs_improvement());
    assert!(utility.history(5).is_empty());
}
