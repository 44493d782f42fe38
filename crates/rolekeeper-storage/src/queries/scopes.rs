// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Permission scope persistence.

use rusqlite::{OptionalExtension, params};

use rolekeeper_core::RolekeeperError;
use rolekeeper_core::ids::ScopeId;
use rolekeeper_core::types::{PermissionScope, ScopeEntry};

use crate::database::{Database, get_enum, map_tr_err};

/// Creates an empty scope.
pub async fn create_scope(db: &Database, name: &str) -> Result<PermissionScope, RolekeeperError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO permission_scopes (name) VALUES (?1)",
                params![name],
            )?;
            Ok(PermissionScope::new(conn.last_insert_rowid(), name))
        })
        .await
        .map_err(map_tr_err)
}

/// Loads a scope with its entries in insertion order.
pub async fn get_scope(
    db: &Database,
    id: ScopeId,
) -> Result<Option<PermissionScope>, RolekeeperError> {
    db.connection()
        .call(move |conn| {
            let scope = conn
                .query_row(
                    "SELECT id, name, role_whitelist, channel_whitelist
                     FROM permission_scopes WHERE id = ?1",
                    params![id],
                    |row| {
                        Ok(PermissionScope {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            role_whitelist: row.get(2)?,
                            channel_whitelist: row.get(3)?,
                            entries: Vec::new(),
                        })
                    },
                )
                .optional()?;

            let Some(mut scope) = scope else {
                return Ok(None);
            };

            let mut stmt = conn.prepare(
                "SELECT subject_type, subject_id, mode FROM scope_entries
                 WHERE scope_id = ?1 ORDER BY position ASC",
            )?;
            scope.entries = stmt
                .query_map(params![id], |row| {
                    Ok(ScopeEntry {
                        subject_type: get_enum(row, 0)?,
                        subject_id: row.get::<_, i64>(1)? as u64,
                        mode: get_enum(row, 2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(scope))
        })
        .await
        .map_err(map_tr_err)
}

/// Replaces the flags and entries of an existing scope.
pub async fn save_scope(db: &Database, scope: &PermissionScope) -> Result<(), RolekeeperError> {
    let id = scope.id;
    let scope = scope.clone();
    let updated = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let updated = tx.execute(
                "UPDATE permission_scopes
                 SET name = ?1, role_whitelist = ?2, channel_whitelist = ?3
                 WHERE id = ?4",
                params![
                    scope.name,
                    scope.role_whitelist,
                    scope.channel_whitelist,
                    scope.id
                ],
            )?;
            tx.execute(
                "DELETE FROM scope_entries WHERE scope_id = ?1",
                params![scope.id],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO scope_entries (scope_id, position, subject_type, subject_id, mode)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for (position, entry) in scope.entries.iter().enumerate() {
                    stmt.execute(params![
                        scope.id,
                        position as i64,
                        entry.subject_type.to_string(),
                        entry.subject_id as i64,
                        entry.mode.to_string(),
                    ])?;
                }
            }
            tx.commit()?;
            Ok(updated)
        })
        .await
        .map_err(map_tr_err)?;

    if updated == 0 {
        return Err(RolekeeperError::not_found("scope", id));
    }
    Ok(())
}

/// Deletes a scope. Rules that referenced it fall back to no scope.
pub async fn delete_scope(db: &Database, id: ScopeId) -> Result<(), RolekeeperError> {
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM permission_scopes WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_db;
    use rolekeeper_core::types::{EntryMode, SubjectType};

    #[tokio::test]
    async fn save_and_reload_preserves_entry_order() {
        let (db, _dir) = setup_db().await;

        let mut scope = create_scope(&db, "staff").await.unwrap();
        scope.add_entry(ScopeEntry::allow(SubjectType::Role, 30));
        scope.add_entry(ScopeEntry::deny(SubjectType::User, 10));
        scope.add_entry(ScopeEntry::allow(SubjectType::Channel, 20));
        scope.set_whitelist(SubjectType::Role, true).unwrap();
        save_scope(&db, &scope).await.unwrap();

        let loaded = get_scope(&db, scope.id).await.unwrap().unwrap();
        assert_eq!(loaded, scope);
        assert_eq!(loaded.entries[1].mode, EntryMode::Deny);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn saving_unknown_scope_is_not_found() {
        let (db, _dir) = setup_db().await;
        let scope = PermissionScope::new(999, "ghost");
        let err = save_scope(&db, &scope).await.unwrap_err();
        assert!(matches!(err, RolekeeperError::NotFound { .. }));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn delete_removes_entries() {
        let (db, _dir) = setup_db().await;
        let mut scope = create_scope(&db, "temp").await.unwrap();
        scope.add_entry(ScopeEntry::allow(SubjectType::Role, 1));
        save_scope(&db, &scope).await.unwrap();

        delete_scope(&db, scope.id).await.unwrap();
        assert!(get_scope(&db, scope.id).await.unwrap().is_none());
        db.close().await.unwrap();
    }
}
