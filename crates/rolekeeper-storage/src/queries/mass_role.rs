// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mass role operations and their member queues.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, params};

use rolekeeper_core::RolekeeperError;
use rolekeeper_core::ids::{GuildId, OperationId, UserId};
use rolekeeper_core::types::{MassRoleOperation, MemberFilter, NewMassRoleOperation};

use crate::database::{Database, format_ts, get_ts, map_tr_err};

const OP_COLUMNS: &str =
    "id, guild_id, initiator, include_bots, include_humans, role_filter, actions, created_at";

fn to_json<T: serde::Serialize>(value: &T) -> rusqlite::Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn from_json<T: serde::de::DeserializeOwned>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn op_from_row(row: &Row<'_>) -> rusqlite::Result<MassRoleOperation> {
    let role_filter: Option<String> = row.get(5)?;
    let actions: String = row.get(6)?;
    Ok(MassRoleOperation {
        id: row.get(0)?,
        guild_id: GuildId::from_db(row.get(1)?),
        initiator: UserId::from_db(row.get(2)?),
        filter: MemberFilter {
            include_bots: row.get(3)?,
            include_humans: row.get(4)?,
            role: role_filter.map(|raw| from_json(5, &raw)).transpose()?,
        },
        actions: from_json(6, &actions)?,
        created_at: get_ts(row, 7)?,
    })
}

/// Inserts the operation and its materialized member queue atomically.
pub async fn create_operation(
    db: &Database,
    op: NewMassRoleOperation,
    members: &[UserId],
    now: DateTime<Utc>,
) -> Result<MassRoleOperation, RolekeeperError> {
    let members: Vec<i64> = members.iter().map(|m| m.to_db()).collect();
    let created_at = format_ts(now);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO mass_role_operations
                 (guild_id, initiator, include_bots, include_humans, role_filter, actions, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    op.guild_id.to_db(),
                    op.initiator.to_db(),
                    op.filter.include_bots,
                    op.filter.include_humans,
                    op.filter.role.as_ref().map(to_json).transpose()?,
                    to_json(&op.actions)?,
                    created_at,
                ],
            )?;
            let id = tx.last_insert_rowid();
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO mass_role_members (operation_id, user_id) VALUES (?1, ?2)",
                )?;
                for user in &members {
                    stmt.execute(params![id, user])?;
                }
            }
            let created = tx.query_row(
                &format!("SELECT {OP_COLUMNS} FROM mass_role_operations WHERE id = ?1"),
                params![id],
                op_from_row,
            )?;
            tx.commit()?;
            Ok(created)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_operation(
    db: &Database,
    id: OperationId,
) -> Result<Option<MassRoleOperation>, RolekeeperError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {OP_COLUMNS} FROM mass_role_operations WHERE id = ?1"),
                params![id],
                op_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_operations(db: &Database) -> Result<Vec<MassRoleOperation>, RolekeeperError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {OP_COLUMNS} FROM mass_role_operations ORDER BY id"
            ))?;
            let rows = stmt.query_map([], op_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Pops the oldest queued member. Select and delete happen in one statement.
pub async fn dequeue_member(
    db: &Database,
    id: OperationId,
) -> Result<Option<UserId>, RolekeeperError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "DELETE FROM mass_role_members
                 WHERE id = (SELECT id FROM mass_role_members
                             WHERE operation_id = ?1 ORDER BY id ASC LIMIT 1)
                 RETURNING user_id",
                params![id],
                |row| row.get::<_, i64>(0),
            )
            .optional()
        })
        .await
        .map(|user| user.map(UserId::from_db))
        .map_err(map_tr_err)
}

pub async fn remaining_members(db: &Database, id: OperationId) -> Result<u64, RolekeeperError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM mass_role_members WHERE operation_id = ?1",
                params![id],
                |row| row.get::<_, i64>(0),
            )
        })
        .await
        .map(|n| n as u64)
        .map_err(map_tr_err)
}

/// Deletes the operation and discards its remaining members.
pub async fn delete_operation(db: &Database, id: OperationId) -> Result<(), RolekeeperError> {
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM mass_role_operations WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
