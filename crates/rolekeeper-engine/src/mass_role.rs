// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bulk role operations drained member by member.
//!
//! Unlike the reaction queue there is no retry: each role action is tried
//! once per member and failures are absorbed. The worker deletes its own
//! operation once the member queue is empty.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use rolekeeper_core::ids::{OperationId, RoleId, UserId};
use rolekeeper_core::traits::ReconcileStore;
use rolekeeper_core::types::{MassRoleOperation, MemberFilter, MemberSnapshot, RoleDirection};

use crate::cascade::AutoRoleCascade;
use crate::registry::WorkerRegistry;
use crate::remote::Remote;

const STORE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Selects the target population at a single point in time.
pub fn materialize(filter: &MemberFilter, members: &[MemberSnapshot]) -> Vec<UserId> {
    members
        .iter()
        .filter(|m| filter.matches(m))
        .map(|m| m.user_id)
        .collect()
}

/// The role changes one member receives, resolved against their roles.
pub fn plan_for(op: &MassRoleOperation, member: &MemberSnapshot) -> Vec<(RoleId, RoleDirection)> {
    let actions = &op.actions;
    let adds = actions.add.iter().map(|r| (*r, RoleDirection::Add));
    let removes = actions.remove.iter().map(|r| (*r, RoleDirection::Remove));
    let toggles = actions.toggle.iter().map(|r| {
        let direction = if member.has_role(*r) {
            RoleDirection::Remove
        } else {
            RoleDirection::Add
        };
        (*r, direction)
    });
    adds.chain(removes).chain(toggles).collect()
}

/// Drains one mass operation, then deletes it.
pub struct MassRoleWorker {
    op: MassRoleOperation,
    store: Arc<dyn ReconcileStore>,
    remote: Remote,
    cascade: Arc<AutoRoleCascade>,
    member_yield: Duration,
    cancel: CancellationToken,
}

impl MassRoleWorker {
    pub fn new(
        op: MassRoleOperation,
        store: Arc<dyn ReconcileStore>,
        remote: Remote,
        cascade: Arc<AutoRoleCascade>,
        member_yield: Duration,
    ) -> Self {
        Self {
            op,
            store,
            remote,
            cascade,
            member_yield,
            cancel: CancellationToken::new(),
        }
    }

    /// Starts the worker under `registry`; its entry is dropped when the
    /// operation completes or is stopped.
    pub fn spawn(self, registry: &Arc<WorkerRegistry<OperationId>>) {
        let id = self.op.id;
        let cancel = self.cancel.clone();
        registry.spawn_transient(id, cancel, self.run());
    }

    pub async fn run(self) {
        let operation_id = self.op.id;
        info!(operation_id, initiator = %self.op.initiator, "mass role operation started");

        let mut processed = 0u64;
        loop {
            if self.cancel.is_cancelled() {
                info!(operation_id, processed, "mass role operation stopped");
                return;
            }

            let pause = match self.store.dequeue_member(operation_id).await {
                Ok(Some(user)) => {
                    self.apply(user).await;
                    processed += 1;
                    self.member_yield
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(operation_id, error = %e, "member dequeue failed");
                    STORE_RETRY_DELAY
                }
            };

            if !pause.is_zero() {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep(pause) => {}
                }
            }
        }

        if let Err(e) = self.store.delete_operation(operation_id).await {
            warn!(operation_id, error = %e, "could not delete finished operation");
        }
        info!(operation_id, processed, "mass role operation completed");
    }

    async fn apply(&self, user: UserId) {
        let member = match self.remote.get_member(self.op.guild_id, user).await {
            Ok(Some(member)) => member,
            Ok(None) => {
                debug!(operation_id = self.op.id, user_id = %user, "member gone, skipping");
                return;
            }
            Err(e) => {
                debug!(operation_id = self.op.id, user_id = %user, error = %e, "member lookup failed, skipping");
                return;
            }
        };

        let plan = plan_for(&self.op, &member);
        let results = join_all(
            plan.iter()
                .map(|(role, direction)| self.cascade.apply(&member, *role, *direction)),
        )
        .await;

        let failed = results.iter().filter(|ok| !**ok).count();
        if failed > 0 {
            debug!(operation_id = self.op.id, user_id = %user, failed, "some role actions failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rolekeeper_core::MassRoleStore;
    use rolekeeper_core::ids::GuildId;
    use rolekeeper_core::types::{NewMassRoleOperation, RoleActions, RoleFilter};
    use rolekeeper_test_utils::{TestEnv, wait_until};

    use crate::cache::TtlCache;

    const GUILD: GuildId = GuildId(10);
    const VIP: RoleId = RoleId(1);
    const MUTED: RoleId = RoleId(2);
    const FLAG: RoleId = RoleId(3);

    fn worker(env: &TestEnv, op: MassRoleOperation) -> MassRoleWorker {
        let remote = Remote::new(env.platform.clone(), Duration::from_secs(5));
        let cache = TtlCache::new(chrono::Duration::seconds(60), env.clock.clone());
        let cascade = Arc::new(AutoRoleCascade::new(env.store.clone(), remote.clone(), cache));
        MassRoleWorker::new(op, env.store.clone(), remote, cascade, Duration::ZERO)
    }

    fn member(user: u64, roles: &[RoleId], is_bot: bool) -> MemberSnapshot {
        MemberSnapshot {
            guild_id: GUILD,
            user_id: UserId(user),
            roles: roles.to_vec(),
            is_bot,
        }
    }

    #[test]
    fn materialize_applies_kind_and_role_filter() {
        let members = vec![
            member(1, &[VIP], false),
            member(2, &[], false),
            member(3, &[VIP], true),
        ];
        let filter = MemberFilter {
            include_bots: false,
            include_humans: true,
            role: Some(RoleFilter::Has(VIP)),
        };
        assert_eq!(materialize(&filter, &members), vec![UserId(1)]);
    }

    #[test]
    fn toggle_flips_against_current_roles() {
        let op = MassRoleOperation {
            id: 1,
            guild_id: GUILD,
            initiator: UserId(9),
            filter: MemberFilter {
                include_bots: true,
                include_humans: true,
                role: None,
            },
            actions: RoleActions {
                add: vec![VIP],
                remove: vec![MUTED],
                toggle: vec![FLAG],
            },
            created_at: chrono::Utc::now(),
        };
        let with_flag = plan_for(&op, &member(1, &[FLAG], false));
        assert!(with_flag.contains(&(FLAG, RoleDirection::Remove)));
        let without_flag = plan_for(&op, &member(1, &[], false));
        assert!(without_flag.contains(&(FLAG, RoleDirection::Add)));
        assert_eq!(without_flag.len(), 3);
    }

    #[tokio::test]
    async fn drains_every_member_once_then_deletes_operation() {
        let env = TestEnv::new().await.unwrap();
        for role in [VIP, MUTED, FLAG] {
            env.platform.define_role(GUILD, role).await;
        }
        let users: Vec<UserId> = (100..110).map(UserId).collect();
        for user in &users {
            env.platform.add_member(GUILD, *user, &[MUTED], false).await;
        }
        // One member fails every mutation; the operation still completes.
        env.platform.fail_role_changes_for(UserId(105), true).await;

        let op = env
            .store
            .create_operation(
                NewMassRoleOperation {
                    guild_id: GUILD,
                    initiator: UserId(9),
                    filter: MemberFilter {
                        include_bots: false,
                        include_humans: true,
                        role: None,
                    },
                    actions: RoleActions {
                        add: vec![VIP],
                        remove: vec![MUTED],
                        toggle: vec![FLAG],
                    },
                },
                &users,
                chrono::Utc::now(),
            )
            .await
            .unwrap();
        let op_id = op.id;
        let registry = Arc::new(WorkerRegistry::new());
        worker(&env, op).spawn(&registry);

        assert!(wait_until(Duration::from_secs(3), || async { registry.is_empty() }).await);
        assert!(env.store.get_operation(op_id).await.unwrap().is_none());

        for user in &users {
            let roles = env.platform.roles_of(GUILD, *user).await.unwrap();
            if *user == UserId(105) {
                assert_eq!(roles, vec![MUTED]);
            } else {
                assert_eq!(roles, vec![VIP, FLAG]);
            }
        }
        let adds = env
            .platform
            .calls()
            .await
            .into_iter()
            .filter(|c| matches!(c, rolekeeper_test_utils::PlatformCall::AddRole(_, r) if *r == VIP))
            .count();
        assert_eq!(adds, 9);
    }

    #[tokio::test]
    async fn stop_leaves_operation_and_remaining_members() {
        let env = TestEnv::new().await.unwrap();
        env.platform.define_role(GUILD, VIP).await;
        let users: Vec<UserId> = (100..120).map(UserId).collect();
        for user in &users {
            env.platform.add_member(GUILD, *user, &[], false).await;
        }
        env.platform.set_delay(Some(Duration::from_millis(20))).await;

        let op = env
            .store
            .create_operation(
                NewMassRoleOperation {
                    guild_id: GUILD,
                    initiator: UserId(9),
                    filter: MemberFilter {
                        include_bots: true,
                        include_humans: true,
                        role: None,
                    },
                    actions: RoleActions {
                        add: vec![VIP],
                        ..RoleActions::default()
                    },
                },
                &users,
                chrono::Utc::now(),
            )
            .await
            .unwrap();
        let op_id = op.id;
        let registry = Arc::new(WorkerRegistry::new());
        worker(&env, op).spawn(&registry);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(registry.is_running(&op_id));
        registry.shutdown_all(Duration::from_secs(2)).await;

        assert!(env.store.get_operation(op_id).await.unwrap().is_some());
        let remaining = env.store.remaining_members(op_id).await.unwrap();
        assert!(remaining > 0 && remaining < 20, "remaining = {remaining}");
    }
}
