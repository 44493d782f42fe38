// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a typo in a config
//! file is reported instead of silently ignored.

use serde::{Deserialize, Serialize};

/// Top-level configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RolekeeperConfig {
    #[serde(default)]
    pub bot: BotConfig,

    #[serde(default)]
    pub platform: PlatformConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub reaction_queue: ReactionQueueConfig,

    #[serde(default)]
    pub mass_role: MassRoleConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub collections: CollectionsConfig,
}

/// Process identity and logging.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    #[serde(default = "default_bot_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_bot_name() -> String {
    "rolekeeper".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Chat platform connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformConfig {
    /// Bot token. `None` means `serve` refuses to start.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Restricts event handling to a single guild when set.
    #[serde(default)]
    pub guild_id: Option<u64>,

    /// Upper bound on any single remote call.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            guild_id: None,
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

fn default_call_timeout_secs() -> u64 {
    10
}

/// SQLite storage.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,

    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("rolekeeper").join("rolekeeper.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("rolekeeper.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Per-rule reaction convergence workers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReactionQueueConfig {
    /// Idle backoff growth per empty poll.
    #[serde(default = "default_idle_step_ms")]
    pub idle_step_ms: u64,

    /// Idle backoff ceiling.
    #[serde(default = "default_idle_max_ms")]
    pub idle_max_ms: u64,

    /// Attempts before an item is parked as failed-abort.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ReactionQueueConfig {
    fn default() -> Self {
        Self {
            idle_step_ms: default_idle_step_ms(),
            idle_max_ms: default_idle_max_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_idle_step_ms() -> u64 {
    250
}

fn default_idle_max_ms() -> u64 {
    5000
}

fn default_max_attempts() -> u32 {
    3
}

/// Bulk role operations.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MassRoleConfig {
    /// Pause between members so bulk work yields to interactive traffic.
    #[serde(default)]
    pub member_yield_ms: u64,
}

/// Lookup cache in front of the store.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    60
}

/// Maintained message collections.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionsConfig {
    /// Run sticky maintenance and a drift audit on channel activity.
    #[serde(default = "default_maintain_on_activity")]
    pub maintain_on_activity: bool,
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            maintain_on_activity: default_maintain_on_activity(),
        }
    }
}

fn default_maintain_on_activity() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = RolekeeperConfig::default();
        assert_eq!(config.platform.call_timeout_secs, 10);
        assert_eq!(config.reaction_queue.idle_step_ms, 250);
        assert_eq!(config.reaction_queue.idle_max_ms, 5000);
        assert_eq!(config.reaction_queue.max_attempts, 3);
        assert_eq!(config.mass_role.member_yield_ms, 0);
        assert_eq!(config.cache.ttl_secs, 60);
        assert!(config.collections.maintain_on_activity);
        assert!(config.storage.database_path.ends_with("rolekeeper.db"));
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: RolekeeperConfig = toml::from_str(
            r#"
[reaction_queue]
idle_max_ms = 1000
"#,
        )
        .unwrap();
        assert_eq!(config.reaction_queue.idle_max_ms, 1000);
        assert_eq!(config.reaction_queue.idle_step_ms, 250);
    }

    #[test]
    fn unknown_key_in_section_is_rejected() {
        let result = toml::from_str::<RolekeeperConfig>(
            r#"
[cache]
ttl = 5
"#,
        );
        assert!(result.is_err());
    }
}
