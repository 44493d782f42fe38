// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules, one per entity family.

pub mod auto_role;
pub mod collections;
pub mod mass_role;
pub mod reaction;
pub mod scopes;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::database::Database;

    pub async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }
}
