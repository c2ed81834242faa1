use alice::config::{AliceConfig, ConfigError};
use alice::services::llm::LlmProvider;
use figment::Jail;

fn isolate(jail: &mut Jail) {
    let home = jail.directory().display().to_string();
    jail.set_env("XDG_CONFIG_HOME", &home);
    jail.set_env("HOME", &home);
}

fn load() -> Result<AliceConfig, figment::Error> {
    AliceConfig::load().map_err(|e| figment::Error::from(e.to_string()))
}

#[test]
fn test_defaults_without_sources() {
    Jail::expect_with(|jail| {
        isolate(jail);
        let config = load()?;
        assert_eq!(config.llm.provider, LlmProvider::OpenAi);
        assert_eq!(config.utility.threshold, 0.8);
        assert_eq!(config.utility.weights.len(), 4);
        assert_eq!(config.limits.task_execution, 30.0);
        assert_eq!(config.emotions.0["trust"], 0.6);
        assert_eq!(config.resources.cpu_usage, 0.5);
        assert_eq!(config.monitor.cpu.critical, 90.0);
        assert_eq!(config.logging.level, "info");
        Ok(())
    });
}

#[test]
fn test_local_file_and_env_layers() {
    Jail::expect_with(|jail| {
        isolate(jail);
        jail.create_file(
            "alice.toml",
            r#"
            [llm]
            provider = "anthropic"
            model = "claude-test"

            [utility]
            threshold = 0.6

            [monitor]
            interval_secs = 5
            "#,
        )?;
        jail.set_env("ALICE_UTILITY__THRESHOLD", "0.7");
        jail.set_env("ALICE_LOGGING__LEVEL", "debug");

        let config = load()?;
        assert_eq!(config.llm.provider, LlmProvider::Anthropic);
        assert_eq!(config.llm.model, "claude-test");
        assert_eq!(config.llm.max_tokens, 1024);
        assert_eq!(config.utility.threshold, 0.7);
        assert_eq!(config.monitor.interval_secs, 5);
        assert_eq!(config.monitor.retention_hours, 24);
        assert_eq!(config.logging.level, "debug");
        Ok(())
    });
}

#[test]
fn test_invalid_values_are_rejected() {
    Jail::expect_with(|jail| {
        isolate(jail);
        jail.set_env("ALICE_UTILITY__THRESHOLD", "1.5");
        assert!(matches!(
            AliceConfig::load(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "utility.threshold"
        ));
        Ok(())
    });

    Jail::expect_with(|jail| {
        isolate(jail);
        jail.create_file("alice.toml", "[utility.weights]\nextra = 0.5\n")?;
        assert!(matches!(
            AliceConfig::load(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "utility.weights"
        ));
        Ok(())
    });

    Jail::expect_with(|jail| {
        isolate(jail);
        jail.set_env("ALICE_MONITOR__RETENTION_HOURS", "1000000");
        assert!(matches!(
            AliceConfig::load(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "monitor.retention_hours"
        ));
        Ok(())
    });

    Jail::expect_with(|jail| {
        isolate(jail);
        jail.set_env("ALICE_LIMITS__TASK_EXECUTION", "1000000");
        assert!(matches!(
            AliceConfig::load(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "limits.task_execution"
        ));
        Ok(())
    });
}

#[test]
fn test_api_key_falls_back_to_environment() {
    Jail::expect_with(|jail| {
        isolate(jail);
        jail.set_env("OPENAI_API_KEY", "sk-env");
        let mut config = load()?;
        assert_eq!(config.llm.api_key_for(LlmProvider::OpenAi).as_deref(), Some("sk-env"));

        config.llm.openai_api_key = Some("sk-file".to_string());
        assert_eq!(config.llm.api_key_for(LlmProvider::OpenAi).as_deref(), Some("sk-file"));

        config.llm.anthropic_api_key = Some(String::new());
        jail.set_env("ANTHROPIC_API_KEY", "");
        assert_eq!(config.llm.api_key_for(LlmProvider::Anthropic), None);
        Ok(())
    });
}
