// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the reconciliation engine and the outside world.
//!
//! The platform client and the persistent store are adapters extending the
//! [`Adapter`] base trait and use `#[async_trait]` so they can be held as
//! trait objects.

pub mod adapter;
pub mod clock;
pub mod platform;
pub mod store;

pub use adapter::Adapter;
pub use clock::{Clock, SystemClock};
pub use platform::PlatformAdapter;
pub use store::{
    AutoRoleStore, CollectionStore, MassRoleStore, ReactionStore, ReconcileStore, ScopeStore,
};
