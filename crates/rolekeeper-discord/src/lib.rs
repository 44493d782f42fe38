// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discord integration for rolekeeper.
//!
//! [`DiscordPlatform`] implements the platform adapter over serenity's REST
//! client; [`RolekeeperHandler`] turns gateway events into service calls.

pub mod handler;
pub mod platform;

pub use handler::{RolekeeperHandler, intents};
pub use platform::DiscordPlatform;
