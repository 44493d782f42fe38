// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared fixture: a temp SQLite store, a mock platform, and a manual clock.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rolekeeper_config::model::StorageConfig;
use rolekeeper_core::RolekeeperError;
use rolekeeper_core::ids::UserId;
use rolekeeper_storage::SqliteStore;

use crate::clock::ManualClock;
use crate::mock_platform::MockPlatform;

/// The bot's own user id in every [`TestEnv`].
pub const BOT_USER: UserId = UserId(1);

/// Everything an engine test needs, torn down when dropped.
pub struct TestEnv {
    pub store: Arc<SqliteStore>,
    pub platform: Arc<MockPlatform>,
    pub clock: Arc<ManualClock>,
    _dir: tempfile::TempDir,
}

impl TestEnv {
    pub async fn new() -> Result<Self, RolekeeperError> {
        let dir = tempfile::tempdir().map_err(|e| RolekeeperError::Storage {
            source: Box::new(e),
        })?;
        let config = StorageConfig {
            database_path: dir.path().join("rolekeeper.db").display().to_string(),
            wal_mode: true,
        };
        let store = SqliteStore::open(&config).await?;
        Ok(Self {
            store: Arc::new(store),
            platform: Arc::new(MockPlatform::new(BOT_USER)),
            clock: Arc::new(ManualClock::default()),
            _dir: dir,
        })
    }
}

/// Polls `check` every 10ms until it returns true or `timeout` elapses.
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
