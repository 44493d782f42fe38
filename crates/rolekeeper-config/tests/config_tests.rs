// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for configuration loading and diagnostics.

use rolekeeper_config::diagnostic::ConfigError;
use rolekeeper_config::{load_and_validate_str, load_config_from_str};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[bot]
name = "keeper"
log_level = "debug"

[platform]
bot_token = "abc.def"
guild_id = 42
call_timeout_secs = 3

[storage]
database_path = "/tmp/rk.db"
wal_mode = false

[reaction_queue]
idle_step_ms = 100
idle_max_ms = 800
max_attempts = 3

[mass_role]
member_yield_ms = 20

[cache]
ttl_secs = 5

[collections]
maintain_on_activity = false
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.bot.name, "keeper");
    assert_eq!(config.bot.log_level, "debug");
    assert_eq!(config.platform.bot_token.as_deref(), Some("abc.def"));
    assert_eq!(config.platform.guild_id, Some(42));
    assert_eq!(config.platform.call_timeout_secs, 3);
    assert_eq!(config.storage.database_path, "/tmp/rk.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.reaction_queue.idle_step_ms, 100);
    assert_eq!(config.reaction_queue.idle_max_ms, 800);
    assert_eq!(config.mass_role.member_yield_ms, 20);
    assert_eq!(config.cache.ttl_secs, 5);
    assert!(!config.collections.maintain_on_activity);
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");
    assert_eq!(config.bot.name, "rolekeeper");
    assert_eq!(config.bot.log_level, "info");
    assert!(config.platform.bot_token.is_none());
    assert!(config.storage.wal_mode);
    assert_eq!(config.reaction_queue.max_attempts, 3);
}

#[test]
fn unknown_top_level_section_is_rejected() {
    let err = load_config_from_str("[logging]\nlevel = \"debug\"\n")
        .expect_err("unknown section should be rejected");
    let text = err.to_string();
    assert!(
        text.contains("unknown field") || text.contains("logging"),
        "got: {text}"
    );
}

#[test]
fn unknown_key_gets_suggestion_and_span() {
    let toml = "[reaction_queue]\nidle_max_sm = 10\n";
    let errors = load_and_validate_str(toml).expect_err("should produce errors");

    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, span, .. } if {
            key == "idle_max_sm"
                && suggestion.as_deref() == Some("idle_max_ms")
                && valid_keys.contains("idle_step_ms")
                && span.is_some()
        })
    });
    assert!(found, "expected UnknownKey with suggestion, got: {errors:?}");
}

#[test]
fn invalid_type_is_reported() {
    let toml = "[cache]\nttl_secs = \"soon\"\n";
    let errors = load_and_validate_str(toml).expect_err("should reject invalid type");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("ttl_secs"))),
        "got: {errors:?}"
    );
}

#[test]
fn validation_runs_after_parse() {
    let toml = "[reaction_queue]\nmax_attempts = 11\n";
    let errors = load_and_validate_str(toml).expect_err("out of range attempts");
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::Validation { message } if message.contains("max_attempts"))
    ));
}

#[test]
fn unknown_key_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        key: "ttl".to_string(),
        suggestion: Some("ttl_secs".to_string()),
        valid_keys: "ttl_secs".to_string(),
        span: None,
        src: None,
    };
    assert!(error.code().is_some());
    let help = error.help().map(|h| h.to_string()).unwrap_or_default();
    assert!(help.contains("did you mean `ttl_secs`"));

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .expect("should render");
    assert!(buf.contains("ttl"));
}

#[test]
#[serial_test::serial]
fn env_overrides_nested_keys() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("rolekeeper.toml", "[reaction_queue]\nidle_max_ms = 900\n")?;
        jail.set_env("ROLEKEEPER_REACTION_QUEUE_IDLE_MAX_MS", "1200");
        jail.set_env("ROLEKEEPER_PLATFORM_BOT_TOKEN", "from-env");

        let config = rolekeeper_config::load_config_from_path(std::path::Path::new(
            "rolekeeper.toml",
        ))
        .map_err(|e| e.to_string())?;
        assert_eq!(config.reaction_queue.idle_max_ms, 1200);
        assert_eq!(config.platform.bot_token.as_deref(), Some("from-env"));
        Ok(())
    });
}
