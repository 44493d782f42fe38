// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.

use crate::diagnostic::ConfigError;
use crate::model::RolekeeperConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validates a deserialized configuration, collecting every failure.
pub fn validate_config(config: &RolekeeperConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.bot.log_level.as_str()) {
        fail(format!(
            "bot.log_level `{}` is not one of {}",
            config.bot.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.platform.call_timeout_secs == 0 {
        fail("platform.call_timeout_secs must be greater than 0".to_string());
    }

    if let Some(token) = &config.platform.bot_token
        && token.trim().is_empty()
    {
        fail("platform.bot_token must not be blank when set".to_string());
    }

    let queue = &config.reaction_queue;
    if queue.idle_step_ms == 0 {
        fail("reaction_queue.idle_step_ms must be greater than 0".to_string());
    }
    if queue.idle_max_ms < queue.idle_step_ms {
        fail(format!(
            "reaction_queue.idle_max_ms ({}) must be at least idle_step_ms ({})",
            queue.idle_max_ms, queue.idle_step_ms
        ));
    }
    if !(1..=10).contains(&queue.max_attempts) {
        fail(format!(
            "reaction_queue.max_attempts must be between 1 and 10, got {}",
            queue.max_attempts
        ));
    }

    if config.cache.ttl_secs == 0 {
        tracing::debug!("cache.ttl_secs is 0, lookups will always hit the store");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &RolekeeperConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&RolekeeperConfig::default()).is_ok());
    }

    #[test]
    fn idle_max_below_step_fails() {
        let mut config = RolekeeperConfig::default();
        config.reaction_queue.idle_step_ms = 500;
        config.reaction_queue.idle_max_ms = 100;
        assert!(messages(&config).iter().any(|m| m.contains("idle_max_ms")));
    }

    #[test]
    fn errors_are_collected_not_fail_fast() {
        let mut config = RolekeeperConfig::default();
        config.storage.database_path = " ".to_string();
        config.platform.call_timeout_secs = 0;
        config.reaction_queue.max_attempts = 0;
        config.bot.log_level = "loud".to_string();
        assert_eq!(messages(&config).len(), 4);
    }

    #[test]
    fn blank_token_fails() {
        let mut config = RolekeeperConfig::default();
        config.platform.bot_token = Some(String::new());
        assert!(messages(&config).iter().any(|m| m.contains("bot_token")));
    }
}
