// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests across storage, engine, and the mock platform.
//!
//! Each test owns a fresh temp database and mock guild. Restart scenarios
//! build a second service over the same store.

use std::sync::Arc;
use std::time::Duration;

use rolekeeper_core::ids::{ChannelId, GuildId, MessageId, RoleId, UserId};
use rolekeeper_core::types::{
    ChannelKind, MemberFilter, NewAutoRoleRule, NewMassRoleOperation, NewReactionRule,
    ReactionEvent, RoleActions, RoleDirection, RoleTrigger, RuleQueueStatus,
};
use rolekeeper_core::{MassRoleStore, ReactionStore};
use rolekeeper_engine::{EngineSettings, ReactionOutcome, ReactionQueueSettings, ReconcileService};
use rolekeeper_test_utils::{TestEnv, wait_until};

const GUILD: GuildId = GuildId(10);
const CHANNEL: ChannelId = ChannelId(20);
const MEMBER_ROLE: RoleId = RoleId(30);
const VERIFIED: RoleId = RoleId(31);

fn settings() -> EngineSettings {
    EngineSettings {
        call_timeout: Duration::from_secs(5),
        reaction_queue: ReactionQueueSettings {
            idle_step: Duration::from_millis(5),
            idle_max: Duration::from_millis(20),
            max_attempts: 3,
        },
        shutdown_grace: Duration::from_secs(2),
        ..EngineSettings::default()
    }
}

fn service(env: &TestEnv) -> Arc<ReconcileService> {
    Arc::new(ReconcileService::new(
        env.store.clone(),
        env.platform.clone(),
        env.clock.clone(),
        settings(),
    ))
}

async fn seed_guild(env: &TestEnv, members: std::ops::Range<u64>) -> MessageId {
    env.platform.add_channel(CHANNEL, ChannelKind::Text).await;
    env.platform.define_role(GUILD, MEMBER_ROLE).await;
    env.platform.define_role(GUILD, VERIFIED).await;
    for user in members {
        env.platform.add_member(GUILD, UserId(user), &[], false).await;
    }
    env.platform.post_as(CHANNEL, UserId(2), "react for the member role").await
}

fn reaction(message: MessageId, user: u64, added: bool, at_secs: i64) -> ReactionEvent {
    ReactionEvent {
        guild_id: GUILD,
        channel_id: CHANNEL,
        message_id: message,
        emoji: "✅".into(),
        user_id: UserId(user),
        is_bot: false,
        added,
        at: chrono::DateTime::from_timestamp(1_767_225_600 + at_secs, 0).unwrap(),
    }
}

#[tokio::test]
async fn burst_of_toggles_converges_on_latest_intent() {
    let env = TestEnv::new().await.unwrap();
    let message = seed_guild(&env, 100..120).await;
    let svc = service(&env);
    let rule = svc
        .create_reaction_rule(NewReactionRule {
            guild_id: GUILD,
            channel_id: CHANNEL,
            message_id: message,
            emoji: "✅".into(),
            role_id: MEMBER_ROLE,
            scope_id: None,
        })
        .await
        .unwrap();

    // Even users end reacted, odd users end unreacted. Events arrive in
    // reverse time order for half of them.
    for user in 100..120u64 {
        let ends_reacted = user % 2 == 0;
        let mut events = vec![
            reaction(message, user, !ends_reacted, 1),
            reaction(message, user, ends_reacted, 2),
        ];
        if user % 4 < 2 {
            events.reverse();
        }
        for event in events {
            let outcome = svc.handle_reaction(&event).await.unwrap();
            assert!(matches!(outcome, ReactionOutcome::Queued { .. }));
        }
    }

    assert!(
        wait_until(Duration::from_secs(5), || async {
            svc.rule_status(rule.id).await.unwrap() == RuleQueueStatus::default()
        })
        .await
    );
    for user in 100..120u64 {
        let roles = env.platform.roles_of(GUILD, UserId(user)).await.unwrap();
        assert_eq!(roles.contains(&MEMBER_ROLE), user % 2 == 0, "user {user}");
    }
    svc.shutdown().await;
}

#[tokio::test]
async fn gated_grant_is_parked_as_failed() {
    let env = TestEnv::new().await.unwrap();
    let message = seed_guild(&env, 100..102).await;
    env.platform.add_member(GUILD, UserId(102), &[VERIFIED], false).await;
    let svc = service(&env);

    // MEMBER_ROLE may only be held alongside VERIFIED.
    svc.add_auto_role(NewAutoRoleRule {
        guild_id: GUILD,
        role_id: MEMBER_ROLE,
        direction: RoleDirection::Add,
        trigger: Some(RoleTrigger {
            role_id: VERIFIED,
            direction: RoleDirection::Add,
        }),
        reverse: true,
        prevent_direct_assign: true,
    })
    .await
    .unwrap();
    let rule = svc
        .create_reaction_rule(NewReactionRule {
            guild_id: GUILD,
            channel_id: CHANNEL,
            message_id: message,
            emoji: "✅".into(),
            role_id: MEMBER_ROLE,
            scope_id: None,
        })
        .await
        .unwrap();

    svc.handle_reaction(&reaction(message, 100, true, 1)).await.unwrap();
    svc.handle_reaction(&reaction(message, 102, true, 1)).await.unwrap();

    assert!(
        wait_until(Duration::from_secs(5), || async {
            svc.rule_status(rule.id).await.unwrap()
                == RuleQueueStatus {
                    pending: 0,
                    failed: 1,
                }
        })
        .await
    );
    assert!(env.platform.roles_of(GUILD, UserId(100)).await.unwrap().is_empty());
    assert_eq!(
        env.platform.roles_of(GUILD, UserId(102)).await.unwrap(),
        vec![MEMBER_ROLE, VERIFIED]
    );

    // Losing VERIFIED takes MEMBER_ROLE with it through the reversed rule.
    env.platform.remove_member(GUILD, UserId(102)).await;
    env.platform.add_member(GUILD, UserId(102), &[MEMBER_ROLE], false).await;
    svc.on_role_changed(GUILD, UserId(102), VERIFIED, RoleDirection::Remove)
        .await
        .unwrap();
    assert!(env.platform.roles_of(GUILD, UserId(102)).await.unwrap().is_empty());
    svc.shutdown().await;
}

#[tokio::test]
async fn mass_operation_survives_restart() {
    let env = TestEnv::new().await.unwrap();
    seed_guild(&env, 100..140).await;
    env.platform.set_delay(Some(Duration::from_millis(5))).await;

    let first = service(&env);
    let op = first
        .create_mass_operation(NewMassRoleOperation {
            guild_id: GUILD,
            initiator: UserId(2),
            filter: MemberFilter {
                include_bots: false,
                include_humans: true,
                role: None,
            },
            actions: RoleActions {
                add: vec![MEMBER_ROLE],
                ..RoleActions::default()
            },
        })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;
    first.shutdown().await;
    drop(first);

    let unfinished = env.store.get_operation(op.id).await.unwrap().is_some();
    let second = service(&env);
    let report = second.start().await.unwrap();
    assert_eq!(report.operations_resumed, usize::from(unfinished));

    assert!(
        wait_until(Duration::from_secs(5), || async {
            env.store.get_operation(op.id).await.unwrap().is_none()
        })
        .await
    );
    for user in 100..140u64 {
        assert_eq!(
            env.platform.roles_of(GUILD, UserId(user)).await.unwrap(),
            vec![MEMBER_ROLE],
            "user {user}"
        );
    }
    second.shutdown().await;
}

#[tokio::test]
async fn queued_intents_survive_restart() {
    let env = TestEnv::new().await.unwrap();
    let message = seed_guild(&env, 100..103).await;
    let rule = env
        .store
        .insert_rule(
            NewReactionRule {
                guild_id: GUILD,
                channel_id: CHANNEL,
                message_id: message,
                emoji: "✅".into(),
                role_id: MEMBER_ROLE,
                scope_id: None,
            },
            chrono::Utc::now(),
        )
        .await
        .unwrap();

    // Intents recorded by a previous run that never got to them, one of
    // them claimed mid-flight.
    for user in 100..103u64 {
        env.store
            .enqueue(rule.id, UserId(user), true, chrono::Utc::now())
            .await
            .unwrap();
    }
    env.store.dequeue(rule.id).await.unwrap();

    let svc = service(&env);
    let report = svc.start().await.unwrap();
    assert_eq!(report.rules_started, 1);
    assert_eq!(report.items_requeued, 1);

    assert!(
        wait_until(Duration::from_secs(5), || async {
            svc.rule_status(rule.id).await.unwrap() == RuleQueueStatus::default()
        })
        .await
    );
    for user in 100..103u64 {
        assert_eq!(
            env.platform.roles_of(GUILD, UserId(user)).await.unwrap(),
            vec![MEMBER_ROLE]
        );
    }
    svc.shutdown().await;
}
