// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model shared across the storage, engine, and platform crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::RolekeeperError;
use crate::ids::{
    AutoRoleId, ChannelId, CollectionId, GuildId, ItemId, MessageId, OperationId, RoleId, RuleId,
    ScopeId, UserId,
};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterKind {
    Platform,
    Storage,
}

// --- Permission scopes ---

/// What a scope entry refers to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum SubjectType {
    Role,
    Channel,
    User,
}

/// Whether a scope entry grants or denies.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum EntryMode {
    Allow,
    Deny,
}

/// A single allow/deny line of a permission scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeEntry {
    pub subject_type: SubjectType,
    pub subject_id: u64,
    pub mode: EntryMode,
}

impl ScopeEntry {
    pub fn allow(subject_type: SubjectType, subject_id: u64) -> Self {
        Self {
            subject_type,
            subject_id,
            mode: EntryMode::Allow,
        }
    }

    pub fn deny(subject_type: SubjectType, subject_id: u64) -> Self {
        Self {
            subject_type,
            subject_id,
            mode: EntryMode::Deny,
        }
    }
}

/// A named set of whitelist/blacklist entries gating who may trigger an action.
///
/// Role checks consider both `Role` and `User` entries; channel checks
/// consider `Channel` entries. Entries are unique per subject and keep their
/// insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionScope {
    pub id: ScopeId,
    pub name: String,
    pub role_whitelist: bool,
    pub channel_whitelist: bool,
    pub entries: Vec<ScopeEntry>,
}

impl PermissionScope {
    /// Creates an empty scope with both whitelist modes off.
    pub fn new(id: ScopeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            role_whitelist: false,
            channel_whitelist: false,
            entries: Vec::new(),
        }
    }

    /// Adds an entry, replacing the mode of an existing entry for the same subject.
    pub fn add_entry(&mut self, entry: ScopeEntry) {
        match self.entries.iter_mut().find(|e| {
            e.subject_type == entry.subject_type && e.subject_id == entry.subject_id
        }) {
            Some(existing) => existing.mode = entry.mode,
            None => self.entries.push(entry),
        }
        self.normalize_whitelists();
    }

    /// Removes the entry for a subject, disabling whitelist mode when its last
    /// allow entry goes away.
    pub fn remove_entry(&mut self, subject_type: SubjectType, subject_id: u64) -> Option<ScopeEntry> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.subject_type == subject_type && e.subject_id == subject_id)?;
        let removed = self.entries.remove(pos);
        self.normalize_whitelists();
        Some(removed)
    }

    /// Turns whitelist mode on or off for the role or channel dimension.
    ///
    /// Enabling requires at least one allow entry for that dimension.
    pub fn set_whitelist(&mut self, subject_type: SubjectType, enabled: bool) -> Result<(), RolekeeperError> {
        if enabled && !self.has_allow_for(subject_type) {
            return Err(RolekeeperError::InvalidInput(format!(
                "scope `{}` has no allow entries for {subject_type}",
                self.name
            )));
        }
        match subject_type {
            SubjectType::Role | SubjectType::User => self.role_whitelist = enabled,
            SubjectType::Channel => self.channel_whitelist = enabled,
        }
        Ok(())
    }

    /// True when the scope has no entries and no whitelist mode.
    pub fn is_open(&self) -> bool {
        self.entries.is_empty() && !self.role_whitelist && !self.channel_whitelist
    }

    fn has_allow_for(&self, subject_type: SubjectType) -> bool {
        self.entries.iter().any(|e| {
            e.mode == EntryMode::Allow && same_dimension(e.subject_type, subject_type)
        })
    }

    fn normalize_whitelists(&mut self) {
        if self.role_whitelist && !self.has_allow_for(SubjectType::Role) {
            self.role_whitelist = false;
        }
        if self.channel_whitelist && !self.has_allow_for(SubjectType::Channel) {
            self.channel_whitelist = false;
        }
    }
}

/// Role and user entries feed the same (role) check.
fn same_dimension(a: SubjectType, b: SubjectType) -> bool {
    match (a, b) {
        (SubjectType::Channel, SubjectType::Channel) => true,
        (SubjectType::Channel, _) | (_, SubjectType::Channel) => false,
        _ => true,
    }
}

// --- Reaction rules and their desired-state queue ---

/// A reaction-role rule bound to one message and emoji.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionRule {
    pub id: RuleId,
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub emoji: String,
    pub role_id: RoleId,
    pub scope_id: Option<ScopeId>,
    pub created_at: DateTime<Utc>,
}

/// Fields for a reaction rule that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReactionRule {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub emoji: String,
    pub role_id: RoleId,
    pub scope_id: Option<ScopeId>,
}

/// Processing state of a desired-state queue item.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum QueueItemState {
    Unworked,
    Processing,
    Completed,
    FailedRetry,
    FailedAbort,
}

impl QueueItemState {
    /// Whether a worker may pick the item up.
    pub fn is_drainable(self) -> bool {
        matches!(self, Self::Unworked | Self::FailedRetry)
    }
}

/// The last requested reaction state of one actor for one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionDesiredState {
    pub rule_id: RuleId,
    pub user_id: UserId,
    /// `true` when the actor last reacted, `false` when they last unreacted.
    pub requested: bool,
    pub change_counter: i64,
    pub changed_at: DateTime<Utc>,
    pub state: QueueItemState,
    pub attempts: u32,
}

/// Counts surfaced to operators inspecting a rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleQueueStatus {
    pub pending: u64,
    pub failed: u64,
}

/// A reaction added or removed on the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub emoji: String,
    pub user_id: UserId,
    pub is_bot: bool,
    pub added: bool,
    pub at: DateTime<Utc>,
}

// --- Mass role operations ---

/// Optional "currently has / lacks role X" population filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleFilter {
    Has(RoleId),
    Lacks(RoleId),
}

/// Who a mass role operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberFilter {
    pub include_bots: bool,
    pub include_humans: bool,
    pub role: Option<RoleFilter>,
}

impl MemberFilter {
    /// Evaluates the filter against a member snapshot.
    pub fn matches(&self, member: &MemberSnapshot) -> bool {
        let kind_ok = if member.is_bot {
            self.include_bots
        } else {
            self.include_humans
        };
        if !kind_ok {
            return false;
        }
        match self.role {
            Some(RoleFilter::Has(role)) => member.has_role(role),
            Some(RoleFilter::Lacks(role)) => !member.has_role(role),
            None => true,
        }
    }
}

/// The role lists a mass operation applies to every queued member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleActions {
    pub add: Vec<RoleId>,
    pub remove: Vec<RoleId>,
    pub toggle: Vec<RoleId>,
}

impl RoleActions {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty() && self.toggle.is_empty()
    }
}

/// A bulk role operation and its target population.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MassRoleOperation {
    pub id: OperationId,
    pub guild_id: GuildId,
    pub initiator: UserId,
    pub filter: MemberFilter,
    pub actions: RoleActions,
    pub created_at: DateTime<Utc>,
}

/// Fields for a mass operation that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMassRoleOperation {
    pub guild_id: GuildId,
    pub initiator: UserId,
    pub filter: MemberFilter,
    pub actions: RoleActions,
}

// --- Auto-role cascade ---

/// Add or remove a role.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum RoleDirection {
    Add,
    Remove,
}

impl RoleDirection {
    pub fn opposite(self) -> Self {
        match self {
            Self::Add => Self::Remove,
            Self::Remove => Self::Add,
        }
    }
}

/// The role change that fires a triggered auto-role rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleTrigger {
    pub role_id: RoleId,
    pub direction: RoleDirection,
}

/// A declarative cascade rule: "when X changes (or a member joins), add/remove Y".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoRoleRule {
    pub id: AutoRoleId,
    pub guild_id: GuildId,
    pub role_id: RoleId,
    pub direction: RoleDirection,
    /// `None` makes this a join rule.
    pub trigger: Option<RoleTrigger>,
    /// Also fire with both directions flipped.
    pub reverse: bool,
    /// Block direct assignment of `role_id` unless the trigger condition holds.
    pub prevent_direct_assign: bool,
}

/// Fields for an auto-role rule that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAutoRoleRule {
    pub guild_id: GuildId,
    pub role_id: RoleId,
    pub direction: RoleDirection,
    pub trigger: Option<RoleTrigger>,
    pub reverse: bool,
    pub prevent_direct_assign: bool,
}

// --- Message collections ---

/// Reaction-to-role settings of a message collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionReaction {
    pub emoji: String,
    pub role_id: RoleId,
    /// Require a reaction on every react-enabled item rather than the last one.
    pub multi_react: bool,
}

/// A maintained, ordered set of messages in one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCollection {
    pub id: CollectionId,
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub reaction: Option<CollectionReaction>,
    pub last_updated: DateTime<Utc>,
    pub last_published: Option<DateTime<Utc>>,
    pub requires_publish: bool,
}

/// Fields for a collection that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessageCollection {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub reaction: Option<CollectionReaction>,
}

/// One declared message of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionItem {
    pub id: ItemId,
    pub collection_id: CollectionId,
    /// 1-based, contiguous within the collection.
    pub sort_index: u32,
    pub content: String,
    pub allow_react: bool,
    /// Sticky: keep this message at the bottom of the channel.
    pub maintain_last: bool,
    pub pending_delete: bool,
    pub published_message_id: Option<MessageId>,
    pub last_updated: DateTime<Utc>,
}

impl CollectionItem {
    /// React-enabled and not on its way out.
    pub fn counts_for_reactions(&self) -> bool {
        self.allow_react && !self.pending_delete
    }
}

/// Fields for a collection item that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCollectionItem {
    pub content: String,
    pub allow_react: bool,
    pub maintain_last: bool,
}

// --- Platform snapshots ---

/// A guild member as currently seen by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSnapshot {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub roles: Vec<RoleId>,
    pub is_bot: bool,
}

impl MemberSnapshot {
    pub fn has_role(&self, role: RoleId) -> bool {
        self.roles.contains(&role)
    }
}

/// A message as currently seen by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub content: String,
}

/// Coarse channel classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum ChannelKind {
    Text,
    Announcement,
    Thread,
    Voice,
    Category,
    Other,
}

impl ChannelKind {
    /// Whether channel-scoped permission checks make sense in this context.
    pub fn is_text_capable(self) -> bool {
        matches!(self, Self::Text | Self::Announcement | Self::Thread)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(roles: &[u64], is_bot: bool) -> MemberSnapshot {
        MemberSnapshot {
            guild_id: GuildId(1),
            user_id: UserId(10),
            roles: roles.iter().copied().map(RoleId).collect(),
            is_bot,
        }
    }

    #[test]
    fn removing_last_allow_entry_disables_whitelist() {
        let mut scope = PermissionScope::new(1, "mods");
        scope.add_entry(ScopeEntry::allow(SubjectType::Role, 5));
        scope.add_entry(ScopeEntry::deny(SubjectType::Role, 6));
        scope.set_whitelist(SubjectType::Role, true).unwrap();

        scope.remove_entry(SubjectType::Role, 5);
        assert!(!scope.role_whitelist);
        assert_eq!(scope.entries.len(), 1);
    }

    #[test]
    fn user_allow_keeps_role_whitelist_alive() {
        let mut scope = PermissionScope::new(1, "mods");
        scope.add_entry(ScopeEntry::allow(SubjectType::Role, 5));
        scope.add_entry(ScopeEntry::allow(SubjectType::User, 99));
        scope.set_whitelist(SubjectType::Role, true).unwrap();

        scope.remove_entry(SubjectType::Role, 5);
        assert!(scope.role_whitelist);
    }

    #[test]
    fn channel_whitelist_is_independent_of_role_entries() {
        let mut scope = PermissionScope::new(1, "chan");
        scope.add_entry(ScopeEntry::allow(SubjectType::Channel, 3));
        scope.add_entry(ScopeEntry::allow(SubjectType::Role, 4));
        scope.set_whitelist(SubjectType::Channel, true).unwrap();

        scope.remove_entry(SubjectType::Channel, 3);
        assert!(!scope.channel_whitelist);
    }

    #[test]
    fn whitelist_requires_an_allow_entry() {
        let mut scope = PermissionScope::new(1, "empty");
        scope.add_entry(ScopeEntry::deny(SubjectType::Role, 2));
        assert!(scope.set_whitelist(SubjectType::Role, true).is_err());
    }

    #[test]
    fn re_adding_subject_replaces_mode() {
        let mut scope = PermissionScope::new(1, "s");
        scope.add_entry(ScopeEntry::allow(SubjectType::Role, 2));
        scope.set_whitelist(SubjectType::Role, true).unwrap();
        scope.add_entry(ScopeEntry::deny(SubjectType::Role, 2));

        assert_eq!(scope.entries.len(), 1);
        assert_eq!(scope.entries[0].mode, EntryMode::Deny);
        assert!(!scope.role_whitelist);
    }

    #[test]
    fn member_filter_respects_kind_and_role() {
        let filter = MemberFilter {
            include_bots: false,
            include_humans: true,
            role: Some(RoleFilter::Lacks(RoleId(7))),
        };
        assert!(filter.matches(&member(&[1], false)));
        assert!(!filter.matches(&member(&[7], false)));
        assert!(!filter.matches(&member(&[], true)));
    }

    #[test]
    fn queue_state_strings_are_snake_case() {
        assert_eq!(QueueItemState::FailedAbort.to_string(), "failed_abort");
        assert_eq!(
            "failed_retry".parse::<QueueItemState>().unwrap(),
            QueueItemState::FailedRetry
        );
        assert!(QueueItemState::FailedRetry.is_drainable());
        assert!(!QueueItemState::FailedAbort.is_drainable());
    }
}
