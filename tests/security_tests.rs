use std::sync::Arc;

use alice::interaction::InteractionType;
use alice::kernel::bus::EventManager;
use alice::kernel::event::Event;
use alice::kernel::time::ManualClock;
use alice::security::safety::{RateLimiter, RateLimits, SafetyPolicy};
use alice::security::{SecurityContext, SecurityLevel, SecurityManager, SecurityViolation};
use serde_json::json;

#[test]
fn test_default_level_is_medium() {
    let security = SecurityManager::new(EventManager::new());
    assert_eq!(security.required_level("anything"), SecurityLevel::Medium);

    let low = SecurityContext::new(SecurityLevel::Low, "user");
    let medium = SecurityContext::new(SecurityLevel::Medium, "user");
    assert!(matches!(
        security.validate_operation("anything", &low),
        Err(SecurityViolation::InsufficientLevel { .. })
    ));
    assert!(security.validate_operation("anything", &medium).is_ok());
}

#[test]
fn test_configured_and_builtin_rules() {
    let security = SecurityManager::new(EventManager::new());
    security.configure_operation("automation.execute", SecurityLevel::High);

    let medium = SecurityContext::new(SecurityLevel::Medium, "a");
    let high = SecurityContext::new(SecurityLevel::High, "b");
    let critical = SecurityContext::new(SecurityLevel::Critical, "c");

    assert!(security.validate_operation("automation.execute", &medium).is_err());
    assert!(security.validate_operation("automation.execute", &high).is_ok());

    assert_eq!(
        security.validate_operation("system.shutdown", &high),
        Err(SecurityViolation::ShutdownRequiresCritical)
    );
    assert!(security.validate_operation("system.shutdown", &critical).is_ok());

    assert_eq!(
        security.validate_operation("data.delete.records", &SecurityContext::new(SecurityLevel::Medium, "d")),
        Err(SecurityViolation::DeleteRequiresHigh)
    );
    assert!(security
        .validate_operation("data.delete.records", &SecurityContext::new(SecurityLevel::High, "d"))
        .is_ok());
}

#[tokio::test]
async fn test_three_violations_block_the_source() {
    let events = EventManager::new();
    let security = SecurityManager::new(events.clone());
    let low = SecurityContext::new(SecurityLevel::Low, "intruder");

    for _ in 0..3 {
        assert!(security.validate_operation("op", &low).is_err());
    }
    assert_eq!(security.violation_count("intruder"), 3);
    assert!(security.is_blocked("intruder"));

    let high = SecurityContext::new(SecurityLevel::High, "intruder");
    assert_eq!(
        security.validate_operation("op", &high),
        Err(SecurityViolation::BlockedSource("intruder".to_string()))
    );

    security.unblock_source("intruder");
    assert!(security.validate_operation("op", &high).is_ok());

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    events.bus().subscribe("security.violation", move |event: Event| {
        let tx = tx.clone();
        async move {
            tx.send(event.data)?;
            Ok::<(), anyhow::Error>(())
        }
    });
    events.bus().drain().await;

    let mut counts = Vec::new();
    while let Ok(data) = rx.try_recv() {
        counts.push(data["violation_count"].as_u64().unwrap());
    }
    assert_eq!(counts, vec![1, 2, 3, 4]);
}

#[test]
fn test_audit_log_returns_sha256_hex() {
    let security = SecurityManager::new(EventManager::new());
    let ctx = SecurityContext::new(SecurityLevel::High, "user").with_metadata("task", json!("t-1"));
    let digest = security.audit_log("automation.execute", &ctx, "ok");
    assert_eq!(digest.len(), 64);
    assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_safety_deny_lists() {
    let policy = SafetyPolicy::default();

    assert!(policy.is_safe_command("echo hello"));
    assert!(policy.is_safe_command("ls -la /tmp"));
    assert!(!policy.is_safe_command("rm -rf /"));
    assert!(!policy.is_safe_command("sudo SHUTDOWN now"));
    assert!(policy.is_safe_command("git add README.md"), "'add' must not match 'dd'");

    assert!(policy.is_safe_url("https://example.com"));
    assert!(!policy.is_safe_url("http://free-warez.net"));

    assert!(policy.is_safe_path("/home/user/notes.txt"));
    assert!(!policy.is_safe_path("/etc/passwd"));

    assert!(policy.is_safe_content("hello world"));
    assert!(!policy.is_safe_content("my Password is hunter2"));
}

#[test]
fn test_rate_limiter_sliding_window() {
    let clock = ManualClock::default();
    let limits = RateLimits {
        mouse: 2,
        ..RateLimits::default()
    };
    let mut limiter = RateLimiter::with_clock(limits, Arc::new(clock.clone()));

    assert!(limiter.try_acquire(InteractionType::Mouse));
    clock.advance(chrono::Duration::seconds(30));
    assert!(limiter.try_acquire(InteractionType::Mouse));
    assert!(!limiter.try_acquire(InteractionType::Mouse));
    assert!(limiter.try_acquire(InteractionType::Keyboard));

    clock.advance(chrono::Duration::seconds(31));
    assert!(limiter.try_acquire(InteractionType::Mouse), "oldest entry left the window");
    assert_eq!(limiter.in_window(InteractionType::Mouse), 2);
}
