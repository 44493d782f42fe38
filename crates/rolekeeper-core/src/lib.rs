// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for rolekeeper.
//!
//! Holds the domain model shared by every crate in the workspace (permission
//! scopes, reaction rules and their desired-state queue, mass role
//! operations, auto-role rules, message collections), the error type, and
//! the adapter traits behind which the chat platform and the persistent
//! store live.

pub mod error;
pub mod ids;
pub mod traits;
pub mod types;

pub use error::RolekeeperError;
pub use ids::{ChannelId, GuildId, MessageId, RoleId, UserId};
pub use traits::{
    Adapter, AutoRoleStore, Clock, CollectionStore, MassRoleStore, PlatformAdapter,
    ReactionStore, ReconcileStore, ScopeStore, SystemClock,
};
pub use types::{AdapterKind, HealthStatus};

/// Number of convergence attempts a reaction queue item gets before it is
/// parked as failed-abort.
pub const MAX_CONVERGE_ATTEMPTS: u32 = 3;
