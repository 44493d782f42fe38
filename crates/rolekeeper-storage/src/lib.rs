// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for rolekeeper.
//!
//! WAL-mode SQLite with embedded migrations. Every statement runs on the
//! single background thread owned by `tokio-rusqlite`, so each query
//! function is one serialized read-modify-write.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStore;
pub use database::Database;
