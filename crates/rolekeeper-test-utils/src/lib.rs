// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for rolekeeper.
//!
//! - [`MockPlatform`]: in-memory guild with members, roles, channels and
//!   ordered messages, plus failure injection and a call log.
//! - [`ManualClock`]: a clock that only moves when told to.
//! - [`TestEnv`]: a temp SQLite store wired up with both of the above.

pub mod clock;
pub mod harness;
pub mod mock_platform;

pub use clock::ManualClock;
pub use harness::{BOT_USER, TestEnv, wait_until};
pub use mock_platform::{MockPlatform, PlatformCall};
