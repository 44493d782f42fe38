// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Repository traits for the persistent store.
//!
//! Each trait covers one entity family. [`ReconcileStore`] bundles them for
//! callers that need the whole store behind one trait object.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::RolekeeperError;
use crate::ids::{
    AutoRoleId, ChannelId, CollectionId, GuildId, ItemId, MessageId, OperationId, RuleId, ScopeId,
    UserId,
};
use crate::traits::adapter::Adapter;
use crate::types::{
    AutoRoleRule, CollectionItem, MassRoleOperation, MessageCollection, NewAutoRoleRule,
    NewCollectionItem, NewMassRoleOperation, NewMessageCollection, NewReactionRule,
    PermissionScope, QueueItemState, ReactionDesiredState, ReactionRule,
};

/// Permission scopes and their entries.
#[async_trait]
pub trait ScopeStore: Send + Sync {
    /// Creates an empty scope with both whitelist modes off.
    async fn create_scope(&self, name: &str) -> Result<PermissionScope, RolekeeperError>;

    async fn get_scope(&self, id: ScopeId) -> Result<Option<PermissionScope>, RolekeeperError>;

    /// Replaces the scope's flags and entries with the given ones.
    async fn save_scope(&self, scope: &PermissionScope) -> Result<(), RolekeeperError>;

    async fn delete_scope(&self, id: ScopeId) -> Result<(), RolekeeperError>;
}

/// Reaction rules and the per-rule desired-state queue.
#[async_trait]
pub trait ReactionStore: Send + Sync {
    async fn insert_rule(
        &self,
        rule: NewReactionRule,
        now: DateTime<Utc>,
    ) -> Result<ReactionRule, RolekeeperError>;

    async fn get_rule(&self, id: RuleId) -> Result<Option<ReactionRule>, RolekeeperError>;

    async fn list_rules(&self) -> Result<Vec<ReactionRule>, RolekeeperError>;

    /// Looks up the rule bound to a message and emoji.
    async fn find_rule(
        &self,
        message: MessageId,
        emoji: &str,
    ) -> Result<Option<ReactionRule>, RolekeeperError>;

    /// Deletes the rule together with its queue.
    async fn delete_rule(&self, id: RuleId) -> Result<(), RolekeeperError>;

    /// Records the latest intent of `user` for `rule`.
    ///
    /// Atomic insert-or-update: bumps the change counter and resets the item
    /// to `Unworked` with zero attempts. An event older than the stored one
    /// is ignored. Returns whether the write was applied.
    async fn enqueue(
        &self,
        rule: RuleId,
        user: UserId,
        requested: bool,
        at: DateTime<Utc>,
    ) -> Result<bool, RolekeeperError>;

    /// Claims the oldest drainable item of the rule, marking it `Processing`.
    async fn dequeue(&self, rule: RuleId) -> Result<Option<ReactionDesiredState>, RolekeeperError>;

    /// Deletes the item if its change counter is still `change_counter`.
    async fn complete(
        &self,
        rule: RuleId,
        user: UserId,
        change_counter: i64,
    ) -> Result<bool, RolekeeperError>;

    /// Records a failed attempt if the change counter is still
    /// `change_counter`, parking the item as `FailedAbort` once `max_attempts`
    /// is reached. Returns the resulting state, or `None` when superseded.
    async fn fail(
        &self,
        rule: RuleId,
        user: UserId,
        change_counter: i64,
        max_attempts: u32,
    ) -> Result<Option<QueueItemState>, RolekeeperError>;

    /// Items still waiting to be worked, including retries.
    async fn unworked_count(&self, rule: RuleId) -> Result<u64, RolekeeperError>;

    /// Items parked as `FailedAbort`.
    async fn failed_count(&self, rule: RuleId) -> Result<u64, RolekeeperError>;

    /// Drops every queue item of the rule.
    async fn purge(&self, rule: RuleId) -> Result<u64, RolekeeperError>;

    /// Returns items left in `Processing` by a previous run to `Unworked`.
    async fn requeue_stale(&self) -> Result<u64, RolekeeperError>;
}

/// Mass role operations and their materialized member queues.
#[async_trait]
pub trait MassRoleStore: Send + Sync {
    /// Inserts the operation and its member queue in one transaction.
    async fn create_operation(
        &self,
        op: NewMassRoleOperation,
        members: &[UserId],
        now: DateTime<Utc>,
    ) -> Result<MassRoleOperation, RolekeeperError>;

    async fn get_operation(
        &self,
        id: OperationId,
    ) -> Result<Option<MassRoleOperation>, RolekeeperError>;

    async fn list_operations(&self) -> Result<Vec<MassRoleOperation>, RolekeeperError>;

    /// Removes and returns the first queued member, in insertion order.
    async fn dequeue_member(&self, id: OperationId) -> Result<Option<UserId>, RolekeeperError>;

    async fn remaining_members(&self, id: OperationId) -> Result<u64, RolekeeperError>;

    /// Deletes the operation and any members still queued.
    async fn delete_operation(&self, id: OperationId) -> Result<(), RolekeeperError>;
}

/// Auto-role cascade rules.
#[async_trait]
pub trait AutoRoleStore: Send + Sync {
    async fn insert_auto_role(
        &self,
        rule: NewAutoRoleRule,
    ) -> Result<AutoRoleRule, RolekeeperError>;

    async fn list_auto_roles(&self, guild: GuildId) -> Result<Vec<AutoRoleRule>, RolekeeperError>;

    async fn delete_auto_role(&self, id: AutoRoleId) -> Result<(), RolekeeperError>;
}

/// Message collections, their items, and reaction satisfaction records.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    async fn insert_collection(
        &self,
        collection: NewMessageCollection,
        now: DateTime<Utc>,
    ) -> Result<MessageCollection, RolekeeperError>;

    async fn get_collection(
        &self,
        id: CollectionId,
    ) -> Result<Option<MessageCollection>, RolekeeperError>;

    async fn collections_in_channel(
        &self,
        channel: ChannelId,
    ) -> Result<Vec<MessageCollection>, RolekeeperError>;

    /// Finds the collection item published as `message`.
    async fn find_item_by_message(
        &self,
        message: MessageId,
    ) -> Result<Option<CollectionItem>, RolekeeperError>;

    async fn delete_collection(&self, id: CollectionId) -> Result<(), RolekeeperError>;

    /// Sets or clears the requires-publish flag, stamping last-updated.
    async fn set_requires_publish(
        &self,
        id: CollectionId,
        requires: bool,
        now: DateTime<Utc>,
    ) -> Result<(), RolekeeperError>;

    /// Clears requires-publish and stamps last-published.
    async fn mark_published(
        &self,
        id: CollectionId,
        now: DateTime<Utc>,
    ) -> Result<(), RolekeeperError>;

    /// All items of the collection ordered by sort index.
    async fn list_items(&self, id: CollectionId) -> Result<Vec<CollectionItem>, RolekeeperError>;

    async fn get_item(&self, id: ItemId) -> Result<Option<CollectionItem>, RolekeeperError>;

    /// Inserts at `sort_index`, shifting items at or after it up by one.
    /// An index past the end appends.
    async fn insert_item(
        &self,
        collection: CollectionId,
        sort_index: u32,
        item: NewCollectionItem,
        now: DateTime<Utc>,
    ) -> Result<CollectionItem, RolekeeperError>;

    async fn update_item_content(
        &self,
        id: ItemId,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RolekeeperError>;

    async fn set_published_id(
        &self,
        id: ItemId,
        message: Option<MessageId>,
    ) -> Result<(), RolekeeperError>;

    async fn mark_pending_delete(&self, id: ItemId, now: DateTime<Utc>)
    -> Result<(), RolekeeperError>;

    /// Deletes the item and shifts later items down by one.
    async fn remove_item(&self, id: ItemId) -> Result<(), RolekeeperError>;

    /// Records that `user` satisfied the reaction requirement of an item.
    async fn record_item_user(&self, item: ItemId, user: UserId) -> Result<(), RolekeeperError>;

    /// Items of the collection the user has satisfied.
    async fn item_users(
        &self,
        collection: CollectionId,
        user: UserId,
    ) -> Result<Vec<ItemId>, RolekeeperError>;

    async fn clear_item_users(
        &self,
        collection: CollectionId,
        user: UserId,
    ) -> Result<(), RolekeeperError>;
}

/// The whole store behind one trait object.
pub trait ReconcileStore:
    Adapter + ScopeStore + ReactionStore + MassRoleStore + AutoRoleStore + CollectionStore
{
}

impl<T> ReconcileStore for T where
    T: Adapter + ScopeStore + ReactionStore + MassRoleStore + AutoRoleStore + CollectionStore
{
}
