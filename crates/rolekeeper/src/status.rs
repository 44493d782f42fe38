// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `rolekeeper status`: queue depths read straight from the database.
//!
//! Works whether or not `serve` is running. Failed-abort items are only
//! surfaced here, never retried automatically.

use rolekeeper_config::RolekeeperConfig;
use rolekeeper_core::{ReconcileStore, RolekeeperError};
use rolekeeper_storage::SqliteStore;
use serde::Serialize;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct RuleLine {
    pub rule_id: i64,
    pub message_id: u64,
    pub emoji: String,
    pub role_id: u64,
    pub pending: u64,
    pub failed: u64,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct OperationLine {
    pub operation_id: i64,
    pub guild_id: u64,
    pub initiator: u64,
    pub remaining: u64,
}

#[derive(Debug, Serialize, Default)]
pub struct StatusReport {
    pub rules: Vec<RuleLine>,
    pub operations: Vec<OperationLine>,
}

impl StatusReport {
    pub fn failed_total(&self) -> u64 {
        self.rules.iter().map(|r| r.failed).sum()
    }
}

pub async fn collect(store: &dyn ReconcileStore) -> Result<StatusReport, RolekeeperError> {
    let mut report = StatusReport::default();
    for rule in store.list_rules().await? {
        report.rules.push(RuleLine {
            rule_id: rule.id,
            message_id: rule.message_id.get(),
            emoji: rule.emoji,
            role_id: rule.role_id.get(),
            pending: store.unworked_count(rule.id).await?,
            failed: store.failed_count(rule.id).await?,
        });
    }
    for op in store.list_operations().await? {
        report.operations.push(OperationLine {
            operation_id: op.id,
            guild_id: op.guild_id.get(),
            initiator: op.initiator.get(),
            remaining: store.remaining_members(op.id).await?,
        });
    }
    Ok(report)
}

fn render(report: &StatusReport) -> String {
    let mut out = String::from("\n  rolekeeper status\n");
    out.push_str(&format!("  {}\n", "-".repeat(35)));

    if report.rules.is_empty() {
        out.push_str("    no reaction rules\n");
    }
    for r in &report.rules {
        out.push_str(&format!(
            "    rule {:<5} {} on {} -> role {}: {} pending, {} failed\n",
            r.rule_id, r.emoji, r.message_id, r.role_id, r.pending, r.failed
        ));
    }

    if report.operations.is_empty() {
        out.push_str("    no mass role operations\n");
    }
    for op in &report.operations {
        out.push_str(&format!(
            "    operation {:<5} guild {} by {}: {} members remaining\n",
            op.operation_id, op.guild_id, op.initiator, op.remaining
        ));
    }
    out
}

pub async fn run_status(config: &RolekeeperConfig, json: bool) -> Result<(), RolekeeperError> {
    let store = SqliteStore::open(&config.storage).await?;
    let report = collect(&store).await?;
    if json {
        let text = serde_json::to_string_pretty(&report)
            .map_err(|e| RolekeeperError::Internal(format!("status serialization: {e}")))?;
        println!("{text}");
    } else {
        print!("{}", render(&report));
        if report.failed_total() > 0 {
            println!("\n  Failed items are not retried; delete and recreate the rule to clear them.");
        }
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use rolekeeper_core::ids::{ChannelId, GuildId, MessageId, RoleId, UserId};
    use rolekeeper_core::types::{
        MemberFilter, NewMassRoleOperation, NewReactionRule, RoleActions,
    };
    use rolekeeper_core::{MassRoleStore, ReactionStore};
    use rolekeeper_test_utils::TestEnv;

    #[tokio::test]
    async fn reports_pending_failed_and_remaining() {
        let env = TestEnv::new().await.unwrap();
        let now = chrono::Utc::now();
        let rule = env
            .store
            .insert_rule(
                NewReactionRule {
                    guild_id: GuildId(1),
                    channel_id: ChannelId(2),
                    message_id: MessageId(3),
                    emoji: "✅".into(),
                    role_id: RoleId(4),
                    scope_id: None,
                },
                now,
            )
            .await
            .unwrap();
        env.store.enqueue(rule.id, UserId(10), true, now).await.unwrap();
        env.store.enqueue(rule.id, UserId(11), true, now).await.unwrap();
        let item = env.store.dequeue(rule.id).await.unwrap().unwrap();
        env.store
            .fail(rule.id, item.user_id, item.change_counter, 1)
            .await
            .unwrap();

        env.store
            .create_operation(
                NewMassRoleOperation {
                    guild_id: GuildId(1),
                    initiator: UserId(9),
                    filter: MemberFilter {
                        include_bots: false,
                        include_humans: true,
                        role: None,
                    },
                    actions: RoleActions {
                        add: vec![RoleId(4)],
                        ..RoleActions::default()
                    },
                },
                &[UserId(20), UserId(21), UserId(22)],
                now,
            )
            .await
            .unwrap();

        let report = collect(env.store.as_ref()).await.unwrap();
        assert_eq!(report.rules.len(), 1);
        assert_eq!(report.rules[0].pending, 1);
        assert_eq!(report.rules[0].failed, 1);
        assert_eq!(report.failed_total(), 1);
        assert_eq!(report.operations[0].remaining, 3);

        let text = render(&report);
        assert!(text.contains("1 pending, 1 failed"));
        assert!(text.contains("3 members remaining"));
    }

    #[test]
    fn empty_report_renders_placeholders() {
        let text = render(&StatusReport::default());
        assert!(text.contains("no reaction rules"));
        assert!(text.contains("no mass role operations"));
    }
}
