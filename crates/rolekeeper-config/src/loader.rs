// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Later sources override earlier ones:
//! 1. compiled defaults
//! 2. `/etc/rolekeeper/rolekeeper.toml`
//! 3. `~/.config/rolekeeper/rolekeeper.toml`
//! 4. `./rolekeeper.toml`
//! 5. `ROLEKEEPER_*` environment variables

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::RolekeeperConfig;

const SECTIONS: &[&str] = &[
    "bot",
    "platform",
    "storage",
    "reaction_queue",
    "mass_role",
    "cache",
    "collections",
];

/// Config file locations in merge order.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/rolekeeper/rolekeeper.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("rolekeeper/rolekeeper.toml"));
    }
    paths.push(PathBuf::from("rolekeeper.toml"));
    paths
}

/// Load from the standard hierarchy with env overrides.
pub fn load_config() -> Result<RolekeeperConfig, figment::Error> {
    build_figment().extract()
}

/// Load from a TOML string over the defaults only.
pub fn load_config_from_str(toml_content: &str) -> Result<RolekeeperConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RolekeeperConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load from one explicit file, still honoring env overrides.
pub fn load_config_from_path(path: &Path) -> Result<RolekeeperConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RolekeeperConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment behind [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    search_paths()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(RolekeeperConfig::default())),
            |figment, path| figment.merge(Toml::file(path)),
        )
        .merge(env_provider())
}

/// `ROLEKEEPER_REACTION_QUEUE_IDLE_MAX_MS` must become
/// `reaction_queue.idle_max_ms`, so only the section prefix is split off.
pub(crate) fn env_provider() -> Env {
    Env::prefixed("ROLEKEEPER_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    SECTIONS
        .iter()
        .find_map(|section| {
            key.strip_prefix(section)
                .and_then(|rest| rest.strip_prefix('_'))
                .map(|field| format!("{section}.{field}"))
        })
        .unwrap_or_else(|| key.to_string())
}
