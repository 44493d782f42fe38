// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reaction rules and the per-rule desired-state queue.
//!
//! One row per (rule, user) holds the latest requested state. Workers claim
//! rows by flipping them to `processing`; `complete` and `fail` only apply if
//! the change counter observed at claim time is still current, so an intent
//! that changed mid-flight is never lost.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};

use rolekeeper_core::ids::{ChannelId, GuildId, MessageId, RoleId, RuleId, UserId};
use rolekeeper_core::types::{NewReactionRule, QueueItemState, ReactionDesiredState, ReactionRule};
use rolekeeper_core::RolekeeperError;

use crate::database::{Database, format_ts, get_enum, get_ts, map_tr_err, parse_ts};

const RULE_COLUMNS: &str =
    "id, guild_id, channel_id, message_id, emoji, role_id, scope_id, created_at";

fn rule_from_row(row: &Row<'_>) -> rusqlite::Result<ReactionRule> {
    Ok(ReactionRule {
        id: row.get(0)?,
        guild_id: GuildId::from_db(row.get(1)?),
        channel_id: ChannelId::from_db(row.get(2)?),
        message_id: MessageId::from_db(row.get(3)?),
        emoji: row.get(4)?,
        role_id: RoleId::from_db(row.get(5)?),
        scope_id: row.get(6)?,
        created_at: get_ts(row, 7)?,
    })
}

fn queue_item_from_row(row: &Row<'_>) -> rusqlite::Result<ReactionDesiredState> {
    Ok(ReactionDesiredState {
        rule_id: row.get(0)?,
        user_id: UserId::from_db(row.get(1)?),
        requested: row.get(2)?,
        change_counter: row.get(3)?,
        changed_at: get_ts(row, 4)?,
        state: get_enum(row, 5)?,
        attempts: row.get(6)?,
    })
}

pub async fn insert_rule(
    db: &Database,
    rule: NewReactionRule,
    now: DateTime<Utc>,
) -> Result<ReactionRule, RolekeeperError> {
    let created_at = format_ts(now);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO reaction_rules
                 (guild_id, channel_id, message_id, emoji, role_id, scope_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    rule.guild_id.to_db(),
                    rule.channel_id.to_db(),
                    rule.message_id.to_db(),
                    rule.emoji,
                    rule.role_id.to_db(),
                    rule.scope_id,
                    created_at,
                ],
            )?;
            Ok(ReactionRule {
                id: conn.last_insert_rowid(),
                guild_id: rule.guild_id,
                channel_id: rule.channel_id,
                message_id: rule.message_id,
                emoji: rule.emoji,
                role_id: rule.role_id,
                scope_id: rule.scope_id,
                created_at: parse_ts(7, &created_at)?,
            })
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_rule(db: &Database, id: RuleId) -> Result<Option<ReactionRule>, RolekeeperError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {RULE_COLUMNS} FROM reaction_rules WHERE id = ?1"),
                params![id],
                rule_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_rules(db: &Database) -> Result<Vec<ReactionRule>, RolekeeperError> {
    db.connection()
        .call(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {RULE_COLUMNS} FROM reaction_rules ORDER BY id"))?;
            let rows = stmt.query_map([], rule_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn find_rule(
    db: &Database,
    message: MessageId,
    emoji: &str,
) -> Result<Option<ReactionRule>, RolekeeperError> {
    let emoji = emoji.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {RULE_COLUMNS} FROM reaction_rules WHERE message_id = ?1 AND emoji = ?2"
                ),
                params![message.to_db(), emoji],
                rule_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Deletes the rule; its queue and watermarks go with it.
pub async fn delete_rule(db: &Database, id: RuleId) -> Result<(), RolekeeperError> {
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM reaction_rules WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Upserts the desired state of `user` for `rule`.
///
/// Returns `false` when the event is older than the stored intent or older
/// than the last converged intent.
pub async fn enqueue(
    db: &Database,
    rule: RuleId,
    user: UserId,
    requested: bool,
    at: DateTime<Utc>,
) -> Result<bool, RolekeeperError> {
    let at = format_ts(at);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let watermark: Option<String> = tx
                .query_row(
                    "SELECT applied_at FROM reaction_watermarks WHERE rule_id = ?1 AND user_id = ?2",
                    params![rule, user.to_db()],
                    |row| row.get(0),
                )
                .optional()?;
            if watermark.is_some_and(|applied| applied > at) {
                return Ok(false);
            }

            let changed = tx.execute(
                "INSERT INTO reaction_queue (rule_id, user_id, requested, changed_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (rule_id, user_id) DO UPDATE SET
                     requested = excluded.requested,
                     change_counter = reaction_queue.change_counter + 1,
                     changed_at = excluded.changed_at,
                     state = 'unworked',
                     attempts = 0
                 WHERE excluded.changed_at >= reaction_queue.changed_at",
                params![rule, user.to_db(), requested, at],
            )?;
            tx.commit()?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Claims the oldest drainable item of `rule`.
pub async fn dequeue(
    db: &Database,
    rule: RuleId,
) -> Result<Option<ReactionDesiredState>, RolekeeperError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let item = tx
                .query_row(
                    "SELECT rule_id, user_id, requested, change_counter, changed_at, state, attempts
                     FROM reaction_queue
                     WHERE rule_id = ?1 AND state IN ('unworked', 'failed_retry')
                     ORDER BY changed_at ASC, user_id ASC
                     LIMIT 1",
                    params![rule],
                    queue_item_from_row,
                )
                .optional()?;

            let Some(item) = item else {
                return Ok(None);
            };
            tx.execute(
                "UPDATE reaction_queue SET state = 'processing'
                 WHERE rule_id = ?1 AND user_id = ?2",
                params![rule, item.user_id.to_db()],
            )?;
            tx.commit()?;
            Ok(Some(ReactionDesiredState {
                state: QueueItemState::Processing,
                ..item
            }))
        })
        .await
        .map_err(map_tr_err)
}

/// Removes a converged item and advances the user's watermark.
pub async fn complete(
    db: &Database,
    rule: RuleId,
    user: UserId,
    change_counter: i64,
) -> Result<bool, RolekeeperError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let changed_at: Option<String> = tx
                .query_row(
                    "DELETE FROM reaction_queue
                     WHERE rule_id = ?1 AND user_id = ?2 AND change_counter = ?3
                     RETURNING changed_at",
                    params![rule, user.to_db(), change_counter],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(changed_at) = changed_at else {
                return Ok(false);
            };
            tx.execute(
                "INSERT INTO reaction_watermarks (rule_id, user_id, applied_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (rule_id, user_id) DO UPDATE SET
                     applied_at = max(applied_at, excluded.applied_at)",
                params![rule, user.to_db(), changed_at],
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)
}

/// Records a failed attempt; parks the item once `max_attempts` is reached.
pub async fn fail(
    db: &Database,
    rule: RuleId,
    user: UserId,
    change_counter: i64,
    max_attempts: u32,
) -> Result<Option<QueueItemState>, RolekeeperError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "UPDATE reaction_queue SET
                     attempts = attempts + 1,
                     state = CASE WHEN attempts + 1 >= ?4 THEN 'failed_abort' ELSE 'failed_retry' END
                 WHERE rule_id = ?1 AND user_id = ?2 AND change_counter = ?3
                 RETURNING state",
                params![rule, user.to_db(), change_counter, max_attempts],
                |row| get_enum(row, 0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

async fn count_where(db: &Database, rule: RuleId, states: &'static str) -> Result<u64, RolekeeperError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT COUNT(*) FROM reaction_queue WHERE rule_id = ?1 AND state IN ({states})"
                ),
                params![rule],
                |row| row.get::<_, i64>(0),
            )
        })
        .await
        .map(|n| n as u64)
        .map_err(map_tr_err)
}

/// Items not yet converged and not parked.
pub async fn unworked_count(db: &Database, rule: RuleId) -> Result<u64, RolekeeperError> {
    count_where(db, rule, "'unworked', 'processing', 'failed_retry'").await
}

/// Items parked as failed-abort.
pub async fn failed_count(db: &Database, rule: RuleId) -> Result<u64, RolekeeperError> {
    count_where(db, rule, "'failed_abort'").await
}

pub async fn purge(db: &Database, rule: RuleId) -> Result<u64, RolekeeperError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute("DELETE FROM reaction_queue WHERE rule_id = ?1", params![rule])?;
            tx.execute(
                "DELETE FROM reaction_watermarks WHERE rule_id = ?1",
                params![rule],
            )?;
            tx.commit()?;
            Ok(removed as u64)
        })
        .await
        .map_err(map_tr_err)
}

/// Returns items a crashed run left in `processing` to `unworked`.
pub async fn requeue_stale(db: &Database) -> Result<u64, RolekeeperError> {
    db.connection()
        .call(|conn| {
            let n = conn.execute(
                "UPDATE reaction_queue SET state = 'unworked' WHERE state = 'processing'",
                [],
            )?;
            Ok(n as u64)
        })
        .await
        .map_err(map_tr_err)
}
