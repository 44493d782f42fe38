// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the repository traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use rolekeeper_config::model::StorageConfig;
use rolekeeper_core::ids::{
    AutoRoleId, ChannelId, CollectionId, GuildId, ItemId, MessageId, OperationId, RuleId, ScopeId,
    UserId,
};
use rolekeeper_core::types::{
    AutoRoleRule, CollectionItem, MassRoleOperation, MessageCollection, NewAutoRoleRule,
    NewCollectionItem, NewMassRoleOperation, NewMessageCollection, NewReactionRule,
    PermissionScope, QueueItemState, ReactionDesiredState, ReactionRule,
};
use rolekeeper_core::{
    Adapter, AdapterKind, AutoRoleStore, CollectionStore, HealthStatus, MassRoleStore,
    ReactionStore, RolekeeperError, ScopeStore,
};

use crate::database::{Database, map_tr_err};
use crate::queries::{auto_role, collections, mass_role, reaction, scopes};

/// SQLite-backed store. Every trait method delegates to a query module.
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    /// Opens the database described by `config`, running migrations.
    pub async fn open(config: &StorageConfig) -> Result<Self, RolekeeperError> {
        let db = Database::open_with(&config.database_path, config.wal_mode).await?;
        debug!(path = %config.database_path, "SQLite store initialized");
        Ok(Self { db })
    }

    /// Wraps an already-open database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Checkpoints the WAL and releases the connection.
    pub async fn close(self) -> Result<(), RolekeeperError> {
        self.db.close().await
    }
}

#[async_trait]
impl Adapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, RolekeeperError> {
        self.db
            .connection()
            .call(|conn| conn.query_row("SELECT 1", [], |_| Ok(())))
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl ScopeStore for SqliteStore {
    async fn create_scope(&self, name: &str) -> Result<PermissionScope, RolekeeperError> {
        scopes::create_scope(&self.db, name).await
    }

    async fn get_scope(&self, id: ScopeId) -> Result<Option<PermissionScope>, RolekeeperError> {
        scopes::get_scope(&self.db, id).await
    }

    async fn save_scope(&self, scope: &PermissionScope) -> Result<(), RolekeeperError> {
        scopes::save_scope(&self.db, scope).await
    }

    async fn delete_scope(&self, id: ScopeId) -> Result<(), RolekeeperError> {
        scopes::delete_scope(&self.db, id).await
    }
}

#[async_trait]
impl ReactionStore for SqliteStore {
    async fn insert_rule(
        &self,
        rule: NewReactionRule,
        now: DateTime<Utc>,
    ) -> Result<ReactionRule, RolekeeperError> {
        reaction::insert_rule(&self.db, rule, now).await
    }

    async fn get_rule(&self, id: RuleId) -> Result<Option<ReactionRule>, RolekeeperError> {
        reaction::get_rule(&self.db, id).await
    }

    async fn list_rules(&self) -> Result<Vec<ReactionRule>, RolekeeperError> {
        reaction::list_rules(&self.db).await
    }

    async fn find_rule(
        &self,
        message: MessageId,
        emoji: &str,
    ) -> Result<Option<ReactionRule>, RolekeeperError> {
        reaction::find_rule(&self.db, message, emoji).await
    }

    async fn delete_rule(&self, id: RuleId) -> Result<(), RolekeeperError> {
        reaction::delete_rule(&self.db, id).await
    }

    async fn enqueue(
        &self,
        rule: RuleId,
        user: UserId,
        requested: bool,
        at: DateTime<Utc>,
    ) -> Result<bool, RolekeeperError> {
        reaction::enqueue(&self.db, rule, user, requested, at).await
    }

    async fn dequeue(&self, rule: RuleId) -> Result<Option<ReactionDesiredState>, RolekeeperError> {
        reaction::dequeue(&self.db, rule).await
    }

    async fn complete(
        &self,
        rule: RuleId,
        user: UserId,
        change_counter: i64,
    ) -> Result<bool, RolekeeperError> {
        reaction::complete(&self.db, rule, user, change_counter).await
    }

    async fn fail(
        &self,
        rule: RuleId,
        user: UserId,
        change_counter: i64,
        max_attempts: u32,
    ) -> Result<Option<QueueItemState>, RolekeeperError> {
        reaction::fail(&self.db, rule, user, change_counter, max_attempts).await
    }

    async fn unworked_count(&self, rule: RuleId) -> Result<u64, RolekeeperError> {
        reaction::unworked_count(&self.db, rule).await
    }

    async fn failed_count(&self, rule: RuleId) -> Result<u64, RolekeeperError> {
        reaction::failed_count(&self.db, rule).await
    }

    async fn purge(&self, rule: RuleId) -> Result<u64, RolekeeperError> {
        reaction::purge(&self.db, rule).await
    }

    async fn requeue_stale(&self) -> Result<u64, RolekeeperError> {
        reaction::requeue_stale(&self.db).await
    }
}

#[async_trait]
impl MassRoleStore for SqliteStore {
    async fn create_operation(
        &self,
        op: NewMassRoleOperation,
        members: &[UserId],
        now: DateTime<Utc>,
    ) -> Result<MassRoleOperation, RolekeeperError> {
        mass_role::create_operation(&self.db, op, members, now).await
    }

    async fn get_operation(
        &self,
        id: OperationId,
    ) -> Result<Option<MassRoleOperation>, RolekeeperError> {
        mass_role::get_operation(&self.db, id).await
    }

    async fn list_operations(&self) -> Result<Vec<MassRoleOperation>, RolekeeperError> {
        mass_role::list_operations(&self.db).await
    }

    async fn dequeue_member(&self, id: OperationId) -> Result<Option<UserId>, RolekeeperError> {
        mass_role::dequeue_member(&self.db, id).await
    }

    async fn remaining_members(&self, id: OperationId) -> Result<u64, RolekeeperError> {
        mass_role::remaining_members(&self.db, id).await
    }

    async fn delete_operation(&self, id: OperationId) -> Result<(), RolekeeperError> {
        mass_role::delete_operation(&self.db, id).await
    }
}

#[async_trait]
impl AutoRoleStore for SqliteStore {
    async fn insert_auto_role(
        &self,
        rule: NewAutoRoleRule,
    ) -> Result<AutoRoleRule, RolekeeperError> {
        auto_role::insert_auto_role(&self.db, rule).await
    }

    async fn list_auto_roles(&self, guild: GuildId) -> Result<Vec<AutoRoleRule>, RolekeeperError> {
        auto_role::list_auto_roles(&self.db, guild).await
    }

    async fn delete_auto_role(&self, id: AutoRoleId) -> Result<(), RolekeeperError> {
        auto_role::delete_auto_role(&self.db, id).await
    }
}

#[async_trait]
impl CollectionStore for SqliteStore {
    async fn insert_collection(
        &self,
        collection: NewMessageCollection,
        now: DateTime<Utc>,
    ) -> Result<MessageCollection, RolekeeperError> {
        collections::insert_collection(&self.db, collection, now).await
    }

    async fn get_collection(
        &self,
        id: CollectionId,
    ) -> Result<Option<MessageCollection>, RolekeeperError> {
        collections::get_collection(&self.db, id).await
    }

    async fn collections_in_channel(
        &self,
        channel: ChannelId,
    ) -> Result<Vec<MessageCollection>, RolekeeperError> {
        collections::collections_in_channel(&self.db, channel).await
    }

    async fn find_item_by_message(
        &self,
        message: MessageId,
    ) -> Result<Option<CollectionItem>, RolekeeperError> {
        collections::find_item_by_message(&self.db, message).await
    }

    async fn delete_collection(&self, id: CollectionId) -> Result<(), RolekeeperError> {
        collections::delete_collection(&self.db, id).await
    }

    async fn set_requires_publish(
        &self,
        id: CollectionId,
        requires: bool,
        now: DateTime<Utc>,
    ) -> Result<(), RolekeeperError> {
        collections::set_requires_publish(&self.db, id, requires, now).await
    }

    async fn mark_published(
        &self,
        id: CollectionId,
        now: DateTime<Utc>,
    ) -> Result<(), RolekeeperError> {
        collections::mark_published(&self.db, id, now).await
    }

    async fn list_items(&self, id: CollectionId) -> Result<Vec<CollectionItem>, RolekeeperError> {
        collections::list_items(&self.db, id).await
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<CollectionItem>, RolekeeperError> {
        collections::get_item(&self.db, id).await
    }

    async fn insert_item(
        &self,
        collection: CollectionId,
        sort_index: u32,
        item: NewCollectionItem,
        now: DateTime<Utc>,
    ) -> Result<CollectionItem, RolekeeperError> {
        collections::insert_item(&self.db, collection, sort_index, item, now).await
    }

    async fn update_item_content(
        &self,
        id: ItemId,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RolekeeperError> {
        collections::update_item_content(&self.db, id, content, now).await
    }

    async fn set_published_id(
        &self,
        id: ItemId,
        message: Option<MessageId>,
    ) -> Result<(), RolekeeperError> {
        collections::set_published_id(&self.db, id, message).await
    }

    async fn mark_pending_delete(
        &self,
        id: ItemId,
        now: DateTime<Utc>,
    ) -> Result<(), RolekeeperError> {
        collections::mark_pending_delete(&self.db, id, now).await
    }

    async fn remove_item(&self, id: ItemId) -> Result<(), RolekeeperError> {
        collections::remove_item(&self.db, id).await
    }

    async fn record_item_user(&self, item: ItemId, user: UserId) -> Result<(), RolekeeperError> {
        collections::record_item_user(&self.db, item, user).await
    }

    async fn item_users(
        &self,
        collection: CollectionId,
        user: UserId,
    ) -> Result<Vec<ItemId>, RolekeeperError> {
        collections::item_users(&self.db, collection, user).await
    }

    async fn clear_item_users(
        &self,
        collection: CollectionId,
        user: UserId,
    ) -> Result<(), RolekeeperError> {
        collections::clear_item_users(&self.db, collection, user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolekeeper_core::ReconcileStore;
    use std::sync::Arc;

    async fn open_store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            database_path: dir.path().join("store.db").display().to_string(),
            wal_mode: true,
        };
        (SqliteStore::open(&config).await.unwrap(), dir)
    }

    #[tokio::test]
    async fn store_is_healthy_and_usable_as_trait_object() {
        let (store, _dir) = open_store().await;
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
        assert_eq!(store.kind(), AdapterKind::Storage);

        let store: Arc<dyn ReconcileStore> = Arc::new(store);
        let scope = store.create_scope("everyone").await.unwrap();
        assert!(store.get_scope(scope.id).await.unwrap().unwrap().is_open());
    }

    #[tokio::test]
    async fn concurrent_enqueues_for_one_user_collapse() {
        let (store, _dir) = open_store().await;
        let store = Arc::new(store);
        let rule = store
            .insert_rule(
                NewReactionRule {
                    guild_id: GuildId(1),
                    channel_id: ChannelId(2),
                    message_id: MessageId(3),
                    emoji: "⭐".to_string(),
                    role_id: rolekeeper_core::RoleId(4),
                    scope_id: None,
                },
                Utc::now(),
            )
            .await
            .unwrap();

        let base = Utc::now();
        let mut handles = Vec::new();
        for i in 0..20i64 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .enqueue(
                        rule.id,
                        UserId(9),
                        i % 2 == 1,
                        base + chrono::Duration::milliseconds(i),
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let item = store.dequeue(rule.id).await.unwrap().unwrap();
        assert!(item.requested, "latest event (i = 19) requested the role");
        assert!(store.dequeue(rule.id).await.unwrap().is_none());
    }
}
