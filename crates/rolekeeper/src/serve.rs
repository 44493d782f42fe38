// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `rolekeeper serve` command implementation.
//!
//! Opens the SQLite store, connects the Discord REST client, resumes every
//! persisted worker, then runs the gateway until a shutdown signal arrives.

use std::sync::Arc;

use serenity::all::Http;
use tracing::{error, info};

use rolekeeper_config::RolekeeperConfig;
use rolekeeper_core::ids::GuildId;
use rolekeeper_core::{RolekeeperError, SystemClock};
use rolekeeper_discord::{DiscordPlatform, RolekeeperHandler, intents};
use rolekeeper_engine::{EngineSettings, ReconcileService};
use rolekeeper_storage::SqliteStore;

use crate::shutdown;

pub async fn run_serve(config: RolekeeperConfig) -> Result<(), RolekeeperError> {
    init_tracing(&config.bot.log_level);
    info!(name = %config.bot.name, "starting rolekeeper serve");

    let token = config
        .platform
        .bot_token
        .clone()
        .ok_or_else(|| RolekeeperError::Config("platform.bot_token is required to serve".into()))?;

    let store = Arc::new(SqliteStore::open(&config.storage).await?);
    info!(path = %config.storage.database_path, "storage opened");

    let platform = Arc::new(DiscordPlatform::connect(Arc::new(Http::new(&token))).await?);
    let service = Arc::new(ReconcileService::new(
        store,
        platform,
        Arc::new(SystemClock),
        EngineSettings::from_config(&config),
    ));
    service.start().await?;

    let handler = RolekeeperHandler::new(service.clone(), config.platform.guild_id.map(GuildId));
    let mut client = serenity::Client::builder(&token, intents())
        .event_handler(handler)
        .await
        .map_err(|e| RolekeeperError::Platform {
            message: format!("gateway client: {e}"),
            source: Some(Box::new(e)),
        })?;

    let cancel = shutdown::install_signal_handler();
    let shards = client.shard_manager.clone();
    tokio::select! {
        result = client.start() => {
            if let Err(e) = result {
                error!(error = %e, "gateway client exited");
            }
        }
        _ = cancel.cancelled() => {
            shards.shutdown_all().await;
        }
    }

    service.shutdown().await;
    info!("rolekeeper stopped");
    Ok(())
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rolekeeper={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
