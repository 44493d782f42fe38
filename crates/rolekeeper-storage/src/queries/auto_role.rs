// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Auto-role cascade rules.

use rusqlite::{Row, params};

use rolekeeper_core::RolekeeperError;
use rolekeeper_core::ids::{AutoRoleId, GuildId, RoleId};
use rolekeeper_core::types::{AutoRoleRule, NewAutoRoleRule, RoleDirection, RoleTrigger};

use crate::database::{Database, get_enum, map_tr_err};

fn rule_from_row(row: &Row<'_>) -> rusqlite::Result<AutoRoleRule> {
    let trigger_role: Option<i64> = row.get(4)?;
    let trigger_direction: Option<String> = row.get(5)?;
    let trigger = match (trigger_role, trigger_direction) {
        (Some(role), Some(_)) => Some(RoleTrigger {
            role_id: RoleId::from_db(role),
            direction: get_enum::<RoleDirection>(row, 5)?,
        }),
        _ => None,
    };
    Ok(AutoRoleRule {
        id: row.get(0)?,
        guild_id: GuildId::from_db(row.get(1)?),
        role_id: RoleId::from_db(row.get(2)?),
        direction: get_enum(row, 3)?,
        trigger,
        reverse: row.get(6)?,
        prevent_direct_assign: row.get(7)?,
    })
}

pub async fn insert_auto_role(
    db: &Database,
    rule: NewAutoRoleRule,
) -> Result<AutoRoleRule, RolekeeperError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO auto_role_rules
                 (guild_id, role_id, direction, trigger_role_id, trigger_direction,
                  reverse, prevent_direct_assign)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    rule.guild_id.to_db(),
                    rule.role_id.to_db(),
                    rule.direction.to_string(),
                    rule.trigger.map(|t| t.role_id.to_db()),
                    rule.trigger.map(|t| t.direction.to_string()),
                    rule.reverse,
                    rule.prevent_direct_assign,
                ],
            )?;
            Ok(AutoRoleRule {
                id: conn.last_insert_rowid(),
                guild_id: rule.guild_id,
                role_id: rule.role_id,
                direction: rule.direction,
                trigger: rule.trigger,
                reverse: rule.reverse,
                prevent_direct_assign: rule.prevent_direct_assign,
            })
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_auto_roles(
    db: &Database,
    guild: GuildId,
) -> Result<Vec<AutoRoleRule>, RolekeeperError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, guild_id, role_id, direction, trigger_role_id, trigger_direction,
                        reverse, prevent_direct_assign
                 FROM auto_role_rules WHERE guild_id = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![guild.to_db()], rule_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_auto_role(db: &Database, id: AutoRoleId) -> Result<(), RolekeeperError> {
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM auto_role_rules WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_db;

    #[tokio::test]
    async fn join_and_triggered_rules_round_trip() {
        let (db, _dir) = setup_db().await;

        let join = insert_auto_role(
            &db,
            NewAutoRoleRule {
                guild_id: GuildId(1),
                role_id: RoleId(10),
                direction: RoleDirection::Add,
                trigger: None,
                reverse: false,
                prevent_direct_assign: false,
            },
        )
        .await
        .unwrap();
        let triggered = insert_auto_role(
            &db,
            NewAutoRoleRule {
                guild_id: GuildId(1),
                role_id: RoleId(11),
                direction: RoleDirection::Remove,
                trigger: Some(RoleTrigger {
                    role_id: RoleId(12),
                    direction: RoleDirection::Add,
                }),
                reverse: true,
                prevent_direct_assign: true,
            },
        )
        .await
        .unwrap();

        let rules = list_auto_roles(&db, GuildId(1)).await.unwrap();
        assert_eq!(rules, vec![join.clone(), triggered]);
        assert!(list_auto_roles(&db, GuildId(2)).await.unwrap().is_empty());

        delete_auto_role(&db, join.id).await.unwrap();
        assert_eq!(list_auto_roles(&db, GuildId(1)).await.unwrap().len(), 1);

        db.close().await.unwrap();
    }
}
