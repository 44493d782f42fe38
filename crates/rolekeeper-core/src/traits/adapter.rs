// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait shared by the platform client and the store.

use async_trait::async_trait;

use crate::error::RolekeeperError;
use crate::types::{AdapterKind, HealthStatus};

/// Identity and health reporting for an adapter instance.
#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Returns which seam this adapter sits behind.
    fn kind(&self) -> AdapterKind;

    /// Performs a health check and returns the adapter's current status.
    async fn health_check(&self) -> Result<HealthStatus, RolekeeperError>;
}
