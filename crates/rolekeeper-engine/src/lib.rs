// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconciliation engine for rolekeeper.
//!
//! Converges declared role and message state with what the chat platform
//! actually shows:
//! - [`permission`] evaluates actors against whitelist/blacklist scopes.
//! - [`cascade`] applies auto-role rules and gates direct assignments.
//! - [`reaction_queue`] runs one worker per reaction rule over the
//!   persistent desired-state queue.
//! - [`mass_role`] drains bulk role operations member by member.
//! - [`collection`] audits, publishes, and keeps sticky message sets.
//!
//! [`ReconcileService`] ties them together behind a single entry point.

pub mod cache;
pub mod cascade;
pub mod collection;
pub mod mass_role;
pub mod permission;
pub mod reaction_queue;
pub mod registry;
pub mod remote;
pub mod service;

pub use collection::{AuditReport, PublishOutcome};
pub use permission::{Actor, ChannelContext, PermissionResult};
pub use reaction_queue::ReactionQueueSettings;
pub use service::{
    EngineSettings, OperationStatus, ReactionOutcome, ReconcileService, StartupReport,
};
