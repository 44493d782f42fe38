// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Permission evaluation against a scope's whitelist/blacklist entries.
//!
//! Two independent checks run against a scope. The role check looks at
//! `Role` and `User` entries against the actor; the channel check looks at
//! `Channel` entries against the channel the action happens in. Deny
//! entries always win. Whitelist mode additionally requires a matching
//! allow entry.

use tracing::debug;

use rolekeeper_core::ids::{ChannelId, RoleId, UserId};
use rolekeeper_core::types::{EntryMode, PermissionScope, SubjectType};

/// Outcome of a permission evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionResult {
    /// Every check ran and passed.
    Pass,
    /// No scope applies; the action is unrestricted.
    NoScope,
    FailRole,
    FailChannel,
    FailBoth,
}

impl PermissionResult {
    /// Builds a result from the two independent checks.
    pub fn from_checks(role_ok: bool, channel_ok: bool) -> Self {
        match (role_ok, channel_ok) {
            (true, true) => Self::Pass,
            (false, true) => Self::FailRole,
            (true, false) => Self::FailChannel,
            (false, false) => Self::FailBoth,
        }
    }

    /// Whether the action may proceed.
    pub fn passed(self) -> bool {
        matches!(self, Self::Pass | Self::NoScope)
    }

    pub fn role_failed(self) -> bool {
        matches!(self, Self::FailRole | Self::FailBoth)
    }

    pub fn channel_failed(self) -> bool {
        matches!(self, Self::FailChannel | Self::FailBoth)
    }

    /// Combines two results: failures accumulate, and `NoScope` only
    /// survives when neither side evaluated a scope.
    pub fn combine(self, other: Self) -> Self {
        let role_failed = self.role_failed() || other.role_failed();
        let channel_failed = self.channel_failed() || other.channel_failed();
        if role_failed || channel_failed {
            return Self::from_checks(!role_failed, !channel_failed);
        }
        if self == Self::NoScope && other == Self::NoScope {
            Self::NoScope
        } else {
            Self::Pass
        }
    }
}

/// The channel an action happens in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelContext {
    pub id: ChannelId,
    /// `false` for voice channels, categories, and the like.
    pub text_capable: bool,
}

/// Who is acting and where.
#[derive(Debug, Clone, Copy, Default)]
pub struct Actor<'a> {
    pub user: Option<UserId>,
    /// `None` when the actor's roles are unknown; the role check then only
    /// considers user entries.
    pub roles: Option<&'a [RoleId]>,
    pub channel: Option<ChannelContext>,
}

/// Evaluates `actor` against `scope`.
pub fn evaluate(scope: Option<&PermissionScope>, actor: &Actor<'_>) -> PermissionResult {
    let Some(scope) = scope else {
        debug!("no permission scope, allowing");
        return PermissionResult::NoScope;
    };

    let result = if scope.is_open() {
        PermissionResult::Pass
    } else {
        PermissionResult::from_checks(role_check(scope, actor), channel_check(scope, actor))
    };

    debug!(
        scope_id = scope.id,
        user_id = ?actor.user,
        roles = ?actor.roles,
        channel = ?actor.channel,
        ?result,
        "permission evaluated"
    );
    result
}

fn role_check(scope: &PermissionScope, actor: &Actor<'_>) -> bool {
    if actor.user.is_none() && actor.roles.is_none() {
        return true;
    }

    let matches = |subject_type: SubjectType, subject_id: u64| match subject_type {
        SubjectType::Role => actor
            .roles
            .is_some_and(|roles| roles.contains(&RoleId(subject_id))),
        SubjectType::User => actor.user == Some(UserId(subject_id)),
        SubjectType::Channel => false,
    };

    let mut allowed = false;
    for entry in &scope.entries {
        if !matches(entry.subject_type, entry.subject_id) {
            continue;
        }
        match entry.mode {
            EntryMode::Deny => return false,
            EntryMode::Allow => allowed = true,
        }
    }
    allowed || !scope.role_whitelist
}

fn channel_check(scope: &PermissionScope, actor: &Actor<'_>) -> bool {
    let Some(channel) = actor.channel else {
        return true;
    };
    if !channel.text_capable {
        return false;
    }

    let mut allowed = false;
    for entry in &scope.entries {
        if entry.subject_type != SubjectType::Channel || entry.subject_id != channel.id.get() {
            continue;
        }
        match entry.mode {
            EntryMode::Deny => return false,
            EntryMode::Allow => allowed = true,
        }
    }
    allowed || !scope.channel_whitelist
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rolekeeper_core::types::ScopeEntry;

    const ROLE_A: RoleId = RoleId(100);
    const ROLE_B: RoleId = RoleId(200);

    fn actor_with(roles: &[RoleId]) -> Actor<'_> {
        Actor {
            user: Some(UserId(1)),
            roles: Some(roles),
            channel: None,
        }
    }

    fn text_channel(id: u64) -> Option<ChannelContext> {
        Some(ChannelContext {
            id: ChannelId(id),
            text_capable: true,
        })
    }

    #[test]
    fn role_whitelist_requires_allowed_role() {
        let mut scope = PermissionScope::new(1, "members");
        scope.add_entry(ScopeEntry::allow(SubjectType::Role, ROLE_A.get()));
        scope.set_whitelist(SubjectType::Role, true).unwrap();

        let only_b = [ROLE_B];
        assert_eq!(
            evaluate(Some(&scope), &actor_with(&only_b)),
            PermissionResult::FailRole
        );

        let both = [ROLE_B, ROLE_A];
        assert_eq!(
            evaluate(Some(&scope), &actor_with(&both)),
            PermissionResult::Pass
        );
    }

    #[test]
    fn deny_overrides_allow() {
        let mut scope = PermissionScope::new(1, "s");
        scope.add_entry(ScopeEntry::allow(SubjectType::Role, ROLE_A.get()));
        scope.add_entry(ScopeEntry::deny(SubjectType::Role, ROLE_B.get()));

        let both = [ROLE_A, ROLE_B];
        assert_eq!(
            evaluate(Some(&scope), &actor_with(&both)),
            PermissionResult::FailRole
        );
    }

    #[test]
    fn user_entries_fold_into_role_check() {
        let mut scope = PermissionScope::new(1, "s");
        scope.add_entry(ScopeEntry::allow(SubjectType::User, 1));
        scope.set_whitelist(SubjectType::Role, true).unwrap();
        assert!(evaluate(Some(&scope), &actor_with(&[])).passed());

        scope.add_entry(ScopeEntry::deny(SubjectType::User, 1));
        assert_eq!(
            evaluate(Some(&scope), &actor_with(&[ROLE_A])),
            PermissionResult::FailRole
        );
    }

    #[test]
    fn non_text_channel_fails_channel_check() {
        let mut scope = PermissionScope::new(1, "s");
        scope.add_entry(ScopeEntry::deny(SubjectType::Role, 999));
        let actor = Actor {
            user: None,
            roles: None,
            channel: Some(ChannelContext {
                id: ChannelId(5),
                text_capable: false,
            }),
        };
        assert_eq!(
            evaluate(Some(&scope), &actor),
            PermissionResult::FailChannel
        );
    }

    #[test]
    fn both_checks_can_fail_together() {
        let mut scope = PermissionScope::new(1, "s");
        scope.add_entry(ScopeEntry::allow(SubjectType::Role, ROLE_A.get()));
        scope.add_entry(ScopeEntry::allow(SubjectType::Channel, 7));
        scope.set_whitelist(SubjectType::Role, true).unwrap();
        scope.set_whitelist(SubjectType::Channel, true).unwrap();

        let roles = [ROLE_B];
        let actor = Actor {
            user: Some(UserId(1)),
            roles: Some(&roles),
            channel: text_channel(8),
        };
        assert_eq!(evaluate(Some(&scope), &actor), PermissionResult::FailBoth);
    }

    #[test]
    fn missing_or_open_scope_passes() {
        let actor = actor_with(&[]);
        assert_eq!(evaluate(None, &actor), PermissionResult::NoScope);
        let open = PermissionScope::new(1, "open");
        assert_eq!(evaluate(Some(&open), &actor), PermissionResult::Pass);
    }

    fn any_result() -> impl Strategy<Value = PermissionResult> {
        prop_oneof![
            Just(PermissionResult::Pass),
            Just(PermissionResult::NoScope),
            Just(PermissionResult::FailRole),
            Just(PermissionResult::FailChannel),
            Just(PermissionResult::FailBoth),
        ]
    }

    proptest! {
        #[test]
        fn combine_is_commutative(a in any_result(), b in any_result()) {
            prop_assert_eq!(a.combine(b), b.combine(a));
        }

        #[test]
        fn combine_is_associative(a in any_result(), b in any_result(), c in any_result()) {
            prop_assert_eq!(a.combine(b).combine(c), a.combine(b.combine(c)));
        }

        #[test]
        fn combined_passes_iff_both_pass(a in any_result(), b in any_result()) {
            prop_assert_eq!(a.combine(b).passed(), a.passed() && b.passed());
        }

        #[test]
        fn evaluation_is_monotone_in_deny_entries(
            held in proptest::collection::vec(0u64..6, 0..4),
            denied in 0u64..6,
        ) {
            let roles: Vec<RoleId> = held.iter().copied().map(RoleId).collect();
            let mut scope = PermissionScope::new(1, "p");
            scope.add_entry(ScopeEntry::deny(SubjectType::Role, denied));
            let result = evaluate(Some(&scope), &actor_with(&roles));
            prop_assert_eq!(result.role_failed(), held.contains(&denied));
        }
    }
}
