// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Auto-role cascade: join rules, triggered rules, and the direct-assignment
//! gate every role mutation passes through.

use std::sync::Arc;

use tracing::{debug, info, warn};

use rolekeeper_core::RolekeeperError;
use rolekeeper_core::ids::{GuildId, RoleId, UserId};
use rolekeeper_core::traits::ReconcileStore;
use rolekeeper_core::types::{AutoRoleRule, MemberSnapshot, RoleDirection, RoleTrigger};

use crate::cache::TtlCache;
use crate::remote::Remote;

/// One way a rule can fire. A rule with `reverse` set has two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Orientation {
    role: RoleId,
    direction: RoleDirection,
    trigger: Option<RoleTrigger>,
    prevent_direct_assign: bool,
}

fn orientations(rule: &AutoRoleRule) -> impl Iterator<Item = Orientation> {
    let forward = Orientation {
        role: rule.role_id,
        direction: rule.direction,
        trigger: rule.trigger,
        prevent_direct_assign: rule.prevent_direct_assign,
    };
    let reversed = (rule.reverse && rule.trigger.is_some()).then(|| Orientation {
        direction: rule.direction.opposite(),
        trigger: rule.trigger.map(|t| RoleTrigger {
            role_id: t.role_id,
            direction: t.direction.opposite(),
        }),
        ..forward
    });
    std::iter::once(forward).chain(reversed)
}

/// Whether `role` may be assigned directly to a member holding `held`.
///
/// - Remove-on-Add (holding X forces Y off): blocked while X is held.
/// - Remove-on-Remove (Y requires X): blocked while X is missing.
/// - Add with `prevent_direct_assign`: Y only arrives through its trigger,
///   so it is blocked unless the trigger condition already holds.
pub fn direct_assignment_allowed(rules: &[AutoRoleRule], held: &[RoleId], role: RoleId) -> bool {
    for o in rules.iter().flat_map(orientations) {
        if o.role != role {
            continue;
        }
        let Some(trigger) = o.trigger else { continue };
        let holds_trigger = held.contains(&trigger.role_id);
        let blocked = match (o.direction, trigger.direction) {
            (RoleDirection::Remove, RoleDirection::Add) => holds_trigger,
            (RoleDirection::Remove, RoleDirection::Remove) => !holds_trigger,
            (RoleDirection::Add, RoleDirection::Add) => o.prevent_direct_assign && !holds_trigger,
            (RoleDirection::Add, RoleDirection::Remove) => o.prevent_direct_assign && holds_trigger,
        };
        if blocked {
            return false;
        }
    }
    true
}

/// Applies auto-role rules and owns the single role mutation primitive.
pub struct AutoRoleCascade {
    store: Arc<dyn ReconcileStore>,
    remote: Remote,
    rules: TtlCache<GuildId, Arc<Vec<AutoRoleRule>>>,
}

impl AutoRoleCascade {
    pub fn new(
        store: Arc<dyn ReconcileStore>,
        remote: Remote,
        rules: TtlCache<GuildId, Arc<Vec<AutoRoleRule>>>,
    ) -> Self {
        Self {
            store,
            remote,
            rules,
        }
    }

    /// Auto-role rules of a guild, served from cache when fresh.
    pub async fn rules_for(&self, guild: GuildId) -> Result<Arc<Vec<AutoRoleRule>>, RolekeeperError> {
        if let Some(rules) = self.rules.get(&guild) {
            return Ok(rules);
        }
        let rules = Arc::new(self.store.list_auto_roles(guild).await?);
        self.rules.insert(guild, rules.clone());
        Ok(rules)
    }

    /// Drops cached rules after a mutation. `None` clears every guild.
    pub fn invalidate(&self, guild: Option<GuildId>) {
        match guild {
            Some(guild) => self.rules.invalidate(&guild),
            None => self.rules.clear(),
        }
    }

    /// Checks the gate against the member's current roles.
    pub async fn is_direct_assignment_allowed(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<bool, RolekeeperError> {
        let rules = self.rules_for(guild).await?;
        let held = self
            .remote
            .get_member(guild, user)
            .await?
            .map(|m| m.roles)
            .unwrap_or_default();
        Ok(direct_assignment_allowed(&rules, &held, role))
    }

    /// Assigns the role of every join rule to a new member. Join rules only
    /// ever grant.
    pub async fn on_join(&self, guild: GuildId, user: UserId) -> Result<(), RolekeeperError> {
        let rules = self.rules_for(guild).await?;
        let join_rules: Vec<&AutoRoleRule> = rules.iter().filter(|r| r.trigger.is_none()).collect();
        if join_rules.is_empty() {
            return Ok(());
        }
        for rule in join_rules {
            let Some(member) = self.remote.get_member(guild, user).await? else {
                debug!(user_id = %user, "member left before join rules ran");
                return Ok(());
            };
            if rule.direction == RoleDirection::Remove {
                debug!(rule_id = rule.id, role_id = %rule.role_id, "join rule stored as remove, assigning instead");
            }
            self.assign(&member, rule.role_id).await;
        }
        Ok(())
    }

    /// Fires rules whose trigger matches a role change on a member.
    pub async fn on_role_changed(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
        direction: RoleDirection,
    ) -> Result<(), RolekeeperError> {
        let rules = self.rules_for(guild).await?;
        let fired: Vec<Orientation> = rules
            .iter()
            .flat_map(orientations)
            .filter(|o| {
                o.trigger
                    .is_some_and(|t| t.role_id == role && t.direction == direction)
            })
            .collect();
        for o in fired {
            let Some(member) = self.remote.get_member(guild, user).await? else {
                return Ok(());
            };
            debug!(
                user_id = %user,
                trigger_role = %role,
                target_role = %o.role,
                direction = %o.direction,
                "auto-role rule fired"
            );
            self.apply(&member, o.role, o.direction).await;
        }
        Ok(())
    }

    pub async fn apply(&self, member: &MemberSnapshot, role: RoleId, direction: RoleDirection) -> bool {
        match direction {
            RoleDirection::Add => self.assign(member, role).await,
            RoleDirection::Remove => self.remove(member, role).await,
        }
    }

    /// Gives `role` to the member unless it is held or gated.
    ///
    /// Returns whether the member ends up holding the role. Platform
    /// failures are logged and reported as `false`.
    pub async fn assign(&self, member: &MemberSnapshot, role: RoleId) -> bool {
        if member.has_role(role) {
            return true;
        }
        let rules = match self.rules_for(member.guild_id).await {
            Ok(rules) => rules,
            Err(e) => {
                warn!(error = %e, "could not load auto-role rules for gate");
                return false;
            }
        };
        if !direct_assignment_allowed(&rules, &member.roles, role) {
            info!(user_id = %member.user_id, role_id = %role, "direct assignment blocked by auto-role rule");
            return false;
        }
        match self.remote.add_role(member.guild_id, member.user_id, role).await {
            Ok(()) => true,
            Err(e) => {
                warn!(user_id = %member.user_id, role_id = %role, error = %e, "role add failed");
                false
            }
        }
    }

    /// Takes `role` away unless it is already absent.
    pub async fn remove(&self, member: &MemberSnapshot, role: RoleId) -> bool {
        if !member.has_role(role) {
            return true;
        }
        match self.remote.remove_role(member.guild_id, member.user_id, role).await {
            Ok(()) => true,
            Err(e) => {
                warn!(user_id = %member.user_id, role_id = %role, error = %e, "role remove failed");
                false
            }
        }
    }
}
