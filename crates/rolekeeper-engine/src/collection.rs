// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message collections: drift audit, publishing, sticky upkeep, and
//! reaction completion tracking.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use rolekeeper_core::RolekeeperError;
use rolekeeper_core::ids::{ChannelId, CollectionId, ItemId, MessageId, UserId};
use rolekeeper_core::traits::{Clock, ReconcileStore};
use rolekeeper_core::types::{CollectionItem, MessageCollection, PlatformMessage};

use crate::cascade::AutoRoleCascade;
use crate::remote::Remote;

/// Drift classification of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemAudit {
    pub item_id: ItemId,
    /// The item's presence on the platform is wrong: a pending-delete item
    /// is still live, or a live item has no message.
    pub needs_add_remove: bool,
    /// The item's message is missing or its content has drifted.
    pub needs_publish: bool,
}

/// Result of [`CollectionReconciler::audit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub items: Vec<ItemAudit>,
}

impl AuditReport {
    pub fn needs_add_remove(&self) -> bool {
        self.items.iter().any(|i| i.needs_add_remove)
    }

    pub fn needs_publish(&self) -> bool {
        self.items.iter().any(|i| i.needs_publish)
    }

    pub fn is_clean(&self) -> bool {
        !self.needs_add_remove() && !self.needs_publish()
    }
}

/// What [`CollectionReconciler::publish`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Every tracked message was deleted and the collection reposted.
    Republished,
    /// Drifted messages were edited in place.
    Edited(usize),
    Unchanged,
}

/// Classifies one item given its observed message, if any.
pub fn classify(item: &CollectionItem, observed: Option<&PlatformMessage>) -> ItemAudit {
    let live = observed.is_some();
    let drifted = observed.is_some_and(|m| m.content != item.content);
    ItemAudit {
        item_id: item.id,
        needs_add_remove: item.pending_delete == live,
        needs_publish: !item.pending_delete && (!live || drifted),
    }
}

/// Whether a user's satisfied items complete the collection.
///
/// Single-react collections need only the last eligible item; multi-react
/// collections need every eligible item. A collection with no eligible
/// items never completes.
pub fn is_complete(items: &[CollectionItem], satisfied: &[ItemId], multi_react: bool) -> bool {
    let mut eligible = items.iter().filter(|i| i.counts_for_reactions()).peekable();
    if eligible.peek().is_none() {
        return false;
    }
    if multi_react {
        eligible.all(|i| satisfied.contains(&i.id))
    } else {
        eligible
            .max_by_key(|i| i.sort_index)
            .is_some_and(|last| satisfied.contains(&last.id))
    }
}

/// Keeps declared collections and the platform's messages in sync.
///
/// Publishing, sticky upkeep and drift audits of one collection run one at
/// a time and reload the collection after taking its lock.
pub struct CollectionReconciler {
    store: Arc<dyn ReconcileStore>,
    remote: Remote,
    cascade: Arc<AutoRoleCascade>,
    clock: Arc<dyn Clock>,
    locks: DashMap<CollectionId, Arc<Mutex<()>>>,
}

impl CollectionReconciler {
    pub fn new(
        store: Arc<dyn ReconcileStore>,
        remote: Remote,
        cascade: Arc<AutoRoleCascade>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            remote,
            cascade,
            clock,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, id: CollectionId) -> Arc<Mutex<()>> {
        self.locks.entry(id).or_default().clone()
    }

    /// Drops the lock of a deleted collection.
    pub fn forget(&self, id: CollectionId) {
        self.locks.remove(&id);
    }

    async fn load(&self, id: CollectionId) -> Result<MessageCollection, RolekeeperError> {
        self.store
            .get_collection(id)
            .await?
            .ok_or_else(|| RolekeeperError::not_found("collection", id))
    }

    /// Fetches the item's message. Lookup failures count as missing.
    async fn observe(&self, channel: ChannelId, item: &CollectionItem) -> Option<PlatformMessage> {
        let message = item.published_message_id?;
        match self.remote.get_message(channel, message).await {
            Ok(found) => found,
            Err(e) => {
                debug!(item_id = item.id, message_id = %message, error = %e, "message fetch failed");
                None
            }
        }
    }

    /// Compares every item against the platform.
    pub async fn audit(&self, id: CollectionId) -> Result<AuditReport, RolekeeperError> {
        let collection = self.load(id).await?;
        let items = self.store.list_items(id).await?;
        Ok(self.audit_items(&collection, &items).await)
    }

    async fn audit_items(&self, collection: &MessageCollection, items: &[CollectionItem]) -> AuditReport {
        let mut report = AuditReport::default();
        for item in items {
            let observed = self.observe(collection.channel_id, item).await;
            report.items.push(classify(item, observed.as_ref()));
        }
        report
    }

    /// Brings the platform in line with the declared collection.
    ///
    /// Any add/remove drift forces a full republish; content drift alone is
    /// fixed with edits. On failure the collection keeps its requires-publish
    /// flag and a later publish resumes from whatever is tracked.
    pub async fn publish(&self, id: CollectionId) -> Result<PublishOutcome, RolekeeperError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        let collection = self.load(id).await?;
        let items = self.store.list_items(id).await?;
        let report = self.audit_items(&collection, &items).await;

        let outcome = if report.needs_add_remove() {
            self.republish(&collection, &items).await?;
            PublishOutcome::Republished
        } else if report.needs_publish() {
            let edited = self.edit_drifted(&collection, &items, &report).await?;
            PublishOutcome::Edited(edited)
        } else {
            // Pending-delete items whose message is already gone.
            for item in items.iter().filter(|i| i.pending_delete) {
                self.store.remove_item(item.id).await?;
            }
            PublishOutcome::Unchanged
        };

        self.store.mark_published(id, self.clock.now()).await?;
        info!(collection_id = id, ?outcome, "collection published");
        Ok(outcome)
    }

    async fn republish(
        &self,
        collection: &MessageCollection,
        items: &[CollectionItem],
    ) -> Result<(), RolekeeperError> {
        let channel = collection.channel_id;

        for item in items.iter().rev() {
            let Some(message) = item.published_message_id else {
                continue;
            };
            self.delete_tolerant(channel, message).await?;
            self.store.set_published_id(item.id, None).await?;
        }

        for item in items.iter().filter(|i| !i.pending_delete) {
            self.post(collection, item).await?;
        }

        for item in items.iter().filter(|i| i.pending_delete) {
            self.store.remove_item(item.id).await?;
        }
        Ok(())
    }

    async fn edit_drifted(
        &self,
        collection: &MessageCollection,
        items: &[CollectionItem],
        report: &AuditReport,
    ) -> Result<usize, RolekeeperError> {
        let mut edited = 0;
        for (item, audit) in items.iter().zip(&report.items) {
            if item.pending_delete {
                self.store.remove_item(item.id).await?;
                continue;
            }
            if !audit.needs_publish {
                continue;
            }
            let Some(message) = item.published_message_id else {
                continue;
            };
            self.remote
                .edit_message(collection.channel_id, message, &item.content)
                .await?;
            edited += 1;
        }
        Ok(edited)
    }

    /// Deletes a message, treating one that is already gone as deleted.
    async fn delete_tolerant(&self, channel: ChannelId, message: MessageId) -> Result<(), RolekeeperError> {
        match self.remote.delete_message(channel, message).await {
            Ok(()) | Err(RolekeeperError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Posts an item, records its message id, and seeds the reaction.
    async fn post(&self, collection: &MessageCollection, item: &CollectionItem) -> Result<MessageId, RolekeeperError> {
        let channel = collection.channel_id;
        let message = self.remote.send_message(channel, &item.content).await?;
        self.store.set_published_id(item.id, Some(message)).await?;

        if let Some(reaction) = &collection.reaction
            && item.allow_react
            && let Err(e) = self.remote.add_reaction(channel, message, &reaction.emoji).await
        {
            warn!(collection_id = collection.id, item_id = item.id, error = %e, "could not seed reaction");
        }
        Ok(message)
    }

    /// Keeps sticky items at the bottom of the channel.
    ///
    /// Returns whether the sticky block was reposted.
    pub async fn maintain_last(&self, id: CollectionId) -> Result<bool, RolekeeperError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        self.maintain_last_locked(id).await
    }

    async fn maintain_last_locked(&self, id: CollectionId) -> Result<bool, RolekeeperError> {
        let collection = self.load(id).await?;
        let items = self.store.list_items(id).await?;
        let stickies: Vec<&CollectionItem> = items
            .iter()
            .filter(|i| i.maintain_last && !i.pending_delete)
            .collect();
        if stickies.is_empty() {
            return Ok(false);
        }

        if !self.sticky_block_intact(&collection, &stickies).await? {
            info!(collection_id = id, count = stickies.len(), "reposting sticky messages");
            for item in stickies.iter().rev() {
                if let Some(message) = item.published_message_id {
                    self.delete_tolerant(collection.channel_id, message).await?;
                }
            }
            for item in &stickies {
                self.post(&collection, item).await?;
            }
            return Ok(true);
        }
        Ok(false)
    }

    async fn sticky_block_intact(
        &self,
        collection: &MessageCollection,
        stickies: &[&CollectionItem],
    ) -> Result<bool, RolekeeperError> {
        let channel = collection.channel_id;
        let mut expected = Vec::with_capacity(stickies.len());
        for item in stickies {
            let Some(message) = item.published_message_id else {
                return Ok(false);
            };
            if self.remote.get_message(channel, message).await?.is_none() {
                debug!(collection_id = collection.id, item_id = item.id, "sticky message missing");
                return Ok(false);
            }
            expected.push(message);
        }

        let after = self.remote.messages_after(channel, expected[0]).await?;
        if let Some(interloper) = after.iter().find(|m| !expected[1..].contains(&m.id)) {
            debug!(
                collection_id = collection.id,
                message_id = %interloper.id,
                author_id = %interloper.author_id,
                "interloper below sticky messages"
            );
            return Ok(false);
        }
        Ok(true)
    }

    /// Records a qualifying reaction and grants the collection role once the
    /// user has completed the collection.
    ///
    /// Returns whether the role was granted by this call.
    pub async fn assign_reaction(
        &self,
        id: CollectionId,
        item_id: ItemId,
        emoji: &str,
        user: UserId,
    ) -> Result<bool, RolekeeperError> {
        let collection = self.load(id).await?;
        let Some(reaction) = &collection.reaction else {
            return Ok(false);
        };
        if reaction.emoji != emoji {
            return Ok(false);
        }
        let Some(item) = self.store.get_item(item_id).await? else {
            return Ok(false);
        };
        if item.collection_id != id || !item.counts_for_reactions() {
            return Ok(false);
        }

        self.store.record_item_user(item_id, user).await?;
        let items = self.store.list_items(id).await?;
        let satisfied = self.store.item_users(id, user).await?;
        if !is_complete(&items, &satisfied, reaction.multi_react) {
            debug!(collection_id = id, user_id = %user, satisfied = satisfied.len(), "collection not yet complete");
            return Ok(false);
        }

        let Some(member) = self.remote.get_member(collection.guild_id, user).await? else {
            return Ok(false);
        };
        if !self.cascade.assign(&member, reaction.role_id).await {
            return Ok(false);
        }
        self.store.clear_item_users(id, user).await?;
        info!(collection_id = id, user_id = %user, role_id = %reaction.role_id, "collection completed, role granted");
        Ok(true)
    }

    /// Opportunistic upkeep after activity in a channel.
    ///
    /// Reposts sticky blocks and flags collections whose messages drifted.
    /// Activity authored by the bot itself is ignored; `None` stands for
    /// authorless events such as deletions.
    pub async fn on_channel_activity(
        &self,
        channel: ChannelId,
        author: Option<UserId>,
    ) -> Result<(), RolekeeperError> {
        if author == Some(self.remote.bot_user_id()) {
            return Ok(());
        }
        for listed in self.store.collections_in_channel(channel).await? {
            if listed.last_published.is_none() {
                continue;
            }
            let lock = self.lock_for(listed.id);
            let _guard = lock.lock().await;

            if let Err(e) = self.maintain_last_locked(listed.id).await {
                warn!(collection_id = listed.id, error = %e, "sticky upkeep failed");
            }
            let Some(collection) = self.store.get_collection(listed.id).await? else {
                continue;
            };
            let items = self.store.list_items(collection.id).await?;
            let report = self.audit_items(&collection, &items).await;
            if !report.is_clean() && !collection.requires_publish {
                info!(collection_id = collection.id, "collection drifted, flagged for publish");
                self.store
                    .set_requires_publish(collection.id, true, self.clock.now())
                    .await?;
            }
        }
        Ok(())
    }
}
