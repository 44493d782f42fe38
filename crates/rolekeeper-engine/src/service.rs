// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The reconciliation service: owns the worker registries and caches, and
//! is the single entry point for platform events and operator actions.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use rolekeeper_config::RolekeeperConfig;
use rolekeeper_core::RolekeeperError;
use rolekeeper_core::ids::{
    AutoRoleId, ChannelId, CollectionId, GuildId, ItemId, MessageId, OperationId, RoleId, RuleId,
    ScopeId, UserId,
};
use rolekeeper_core::traits::{Clock, PlatformAdapter, ReconcileStore};
use rolekeeper_core::types::{
    AutoRoleRule, CollectionItem, MassRoleOperation, MessageCollection, NewAutoRoleRule,
    NewCollectionItem, NewMassRoleOperation, NewMessageCollection, NewReactionRule,
    PermissionScope, ReactionEvent, ReactionRule, RoleDirection, RuleQueueStatus, ScopeEntry,
    SubjectType,
};

use crate::cache::TtlCache;
use crate::cascade::AutoRoleCascade;
use crate::collection::{AuditReport, CollectionReconciler, PublishOutcome};
use crate::mass_role::{MassRoleWorker, materialize};
use crate::permission::{self, Actor, ChannelContext, PermissionResult};
use crate::reaction_queue::{ReactionQueueSettings, ReactionWorker};
use crate::registry::WorkerRegistry;
use crate::remote::Remote;

/// Runtime tuning derived from configuration.
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub call_timeout: Duration,
    pub reaction_queue: ReactionQueueSettings,
    pub member_yield: Duration,
    pub cache_ttl: chrono::Duration,
    pub maintain_on_activity: bool,
    pub shutdown_grace: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(10),
            reaction_queue: ReactionQueueSettings::default(),
            member_yield: Duration::ZERO,
            cache_ttl: chrono::Duration::seconds(60),
            maintain_on_activity: true,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &RolekeeperConfig) -> Self {
        Self {
            call_timeout: Duration::from_secs(config.platform.call_timeout_secs),
            reaction_queue: ReactionQueueSettings::from_config(&config.reaction_queue),
            member_yield: Duration::from_millis(config.mass_role.member_yield_ms),
            cache_ttl: chrono::Duration::seconds(
                i64::try_from(config.cache.ttl_secs).unwrap_or(i64::MAX / 1_000),
            ),
            maintain_on_activity: config.collections.maintain_on_activity,
            ..Self::default()
        }
    }
}

/// What happened to a reaction event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionOutcome {
    /// Not a reaction anything listens to, or made by a bot.
    Ignored,
    /// The rule's permission scope rejected the actor.
    Denied(PermissionResult),
    /// The intent was recorded. `applied` is false for a stale event.
    Queued { applied: bool },
    /// The reaction counted towards a message collection.
    Collection { granted: bool },
}

/// Counts from [`ReconcileService::start`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartupReport {
    pub rules_started: usize,
    pub rules_skipped: usize,
    pub operations_resumed: usize,
    pub items_requeued: u64,
}

/// Progress of a mass role operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationStatus {
    pub remaining: u64,
    pub running: bool,
}

type RuleKey = (MessageId, String);

const PERMISSION_LOOKUP_ATTEMPTS: u32 = 3;
const PERMISSION_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Reconciles declared role and message state against the platform.
pub struct ReconcileService {
    store: Arc<dyn ReconcileStore>,
    remote: Remote,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
    cascade: Arc<AutoRoleCascade>,
    collections: CollectionReconciler,
    reaction_workers: WorkerRegistry<RuleId>,
    mass_workers: Arc<WorkerRegistry<OperationId>>,
    rules: TtlCache<RuleKey, Option<ReactionRule>>,
}

impl ReconcileService {
    pub fn new(
        store: Arc<dyn ReconcileStore>,
        platform: Arc<dyn PlatformAdapter>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        let remote = Remote::new(platform, settings.call_timeout);
        let cascade = Arc::new(AutoRoleCascade::new(
            store.clone(),
            remote.clone(),
            TtlCache::new(settings.cache_ttl, clock.clone()),
        ));
        let collections =
            CollectionReconciler::new(store.clone(), remote.clone(), cascade.clone(), clock.clone());
        Self {
            rules: TtlCache::new(settings.cache_ttl, clock.clone()),
            store,
            remote,
            clock,
            settings,
            cascade,
            collections,
            reaction_workers: WorkerRegistry::new(),
            mass_workers: Arc::new(WorkerRegistry::new()),
        }
    }

    // --- Lifecycle ---

    /// Resumes persisted work: returns stale items to the queue, starts a
    /// worker for every valid reaction rule, and restarts mass operations.
    pub async fn start(&self) -> Result<StartupReport, RolekeeperError> {
        let mut report = StartupReport {
            items_requeued: self.store.requeue_stale().await?,
            ..StartupReport::default()
        };
        if report.items_requeued > 0 {
            info!(count = report.items_requeued, "requeued items left processing");
        }

        for rule in self.store.list_rules().await? {
            if self.rule_target_missing(&rule).await {
                report.rules_skipped += 1;
                continue;
            }
            self.spawn_reaction_worker(rule);
            report.rules_started += 1;
        }

        for op in self.store.list_operations().await? {
            self.spawn_mass_worker(op);
            report.operations_resumed += 1;
        }

        info!(
            rules_started = report.rules_started,
            rules_skipped = report.rules_skipped,
            operations_resumed = report.operations_resumed,
            "reconcile service started"
        );
        Ok(report)
    }

    /// True only when the platform confirms the rule's role or message is
    /// gone. Lookup failures are transient and the rule still starts.
    async fn rule_target_missing(&self, rule: &ReactionRule) -> bool {
        match self.remote.role_exists(rule.guild_id, rule.role_id).await {
            Ok(false) => {
                warn!(rule_id = rule.id, role_id = %rule.role_id, "rule role no longer exists, not starting");
                return true;
            }
            Ok(true) => {}
            Err(e) => debug!(rule_id = rule.id, error = %e, "role lookup failed at startup"),
        }
        match self.remote.get_message(rule.channel_id, rule.message_id).await {
            Ok(None) => {
                warn!(rule_id = rule.id, message_id = %rule.message_id, "rule message no longer exists, not starting");
                true
            }
            Ok(Some(_)) => false,
            Err(e) => {
                debug!(rule_id = rule.id, error = %e, "message lookup failed at startup");
                false
            }
        }
    }

    /// Cancels every worker and waits for them to wind down.
    pub async fn shutdown(&self) {
        info!(
            reaction_workers = self.reaction_workers.len(),
            mass_workers = self.mass_workers.len(),
            "stopping reconcile workers"
        );
        self.reaction_workers
            .shutdown_all(self.settings.shutdown_grace)
            .await;
        self.mass_workers.shutdown_all(self.settings.shutdown_grace).await;
    }

    fn spawn_reaction_worker(&self, rule: ReactionRule) {
        let id = rule.id;
        let worker = ReactionWorker::new(
            rule,
            self.store.clone(),
            self.remote.clone(),
            self.cascade.clone(),
            self.settings.reaction_queue,
        );
        self.reaction_workers.insert(id, worker.spawn());
    }

    fn spawn_mass_worker(&self, op: MassRoleOperation) {
        let worker = MassRoleWorker::new(
            op,
            self.store.clone(),
            self.remote.clone(),
            self.cascade.clone(),
            self.settings.member_yield,
        );
        worker.spawn(&self.mass_workers);
    }

    // --- Permissions ---

    /// Evaluates an actor against a scope. A scope id that no longer
    /// resolves is treated as no scope.
    pub async fn evaluate(
        &self,
        scope: Option<ScopeId>,
        user: Option<UserId>,
        roles: Option<&[RoleId]>,
        channel: Option<ChannelId>,
    ) -> Result<PermissionResult, RolekeeperError> {
        let scope = match scope {
            Some(id) => self.store.get_scope(id).await?,
            None => None,
        };
        let channel = match channel {
            Some(id) if scope.is_some() => Some(self.channel_context(id).await?),
            _ => None,
        };
        let actor = Actor {
            user,
            roles,
            channel,
        };
        Ok(permission::evaluate(scope.as_ref(), &actor))
    }

    async fn channel_context(&self, id: ChannelId) -> Result<ChannelContext, RolekeeperError> {
        let kind = self.remote.channel_kind(id).await?;
        Ok(ChannelContext {
            id,
            text_capable: kind.is_some_and(|k| k.is_text_capable()),
        })
    }

    // --- Reaction rules ---

    /// Validates the target, persists the rule, seeds the bot's reaction,
    /// and starts the rule's worker.
    pub async fn create_reaction_rule(
        &self,
        new: NewReactionRule,
    ) -> Result<ReactionRule, RolekeeperError> {
        if new.emoji.trim().is_empty() {
            return Err(RolekeeperError::InvalidInput("emoji must not be empty".into()));
        }
        if self
            .remote
            .get_message(new.channel_id, new.message_id)
            .await?
            .is_none()
        {
            return Err(RolekeeperError::not_found("message", new.message_id));
        }
        if !self.remote.role_exists(new.guild_id, new.role_id).await? {
            return Err(RolekeeperError::not_found("role", new.role_id));
        }
        if let Some(scope) = new.scope_id
            && self.store.get_scope(scope).await?.is_none()
        {
            return Err(RolekeeperError::not_found("scope", scope));
        }

        let rule = self.store.insert_rule(new, self.clock.now()).await?;
        self.rules
            .invalidate(&(rule.message_id, rule.emoji.clone()));

        if let Err(e) = self
            .remote
            .add_reaction(rule.channel_id, rule.message_id, &rule.emoji)
            .await
        {
            warn!(rule_id = rule.id, error = %e, "could not seed rule reaction");
        }
        self.spawn_reaction_worker(rule.clone());
        info!(rule_id = rule.id, message_id = %rule.message_id, role_id = %rule.role_id, "reaction rule created");
        Ok(rule)
    }

    /// Stops the worker, purges the queue, and deletes the rule.
    pub async fn delete_reaction_rule(&self, id: RuleId) -> Result<(), RolekeeperError> {
        let rule = self
            .store
            .get_rule(id)
            .await?
            .ok_or_else(|| RolekeeperError::not_found("reaction rule", id))?;
        self.stop_listening(id);
        let purged = self.store.purge(id).await?;
        self.store.delete_rule(id).await?;
        self.rules.invalidate(&(rule.message_id, rule.emoji));
        info!(rule_id = id, purged, "reaction rule deleted");
        Ok(())
    }

    /// Stops the rule's worker. Returns whether one was running.
    pub fn stop_listening(&self, rule: RuleId) -> bool {
        self.reaction_workers.remove(&rule)
    }

    /// Cuts the rule worker's idle wait short.
    pub fn reset_queue_delay(&self, rule: RuleId) -> bool {
        self.reaction_workers.wake(&rule)
    }

    /// Records an actor's latest intent for a rule and wakes its worker.
    pub async fn enqueue(
        &self,
        rule: RuleId,
        user: UserId,
        requested: bool,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<bool, RolekeeperError> {
        let applied = self.store.enqueue(rule, user, requested, at).await?;
        if applied {
            self.reset_queue_delay(rule);
        } else {
            debug!(rule_id = rule, user_id = %user, "stale reaction event ignored");
        }
        Ok(applied)
    }

    async fn rule_for(&self, message: MessageId, emoji: &str) -> Result<Option<ReactionRule>, RolekeeperError> {
        let key = (message, emoji.to_string());
        if let Some(hit) = self.rules.get(&key) {
            return Ok(hit);
        }
        let rule = self.store.find_rule(message, emoji).await?;
        self.rules.insert(key, rule.clone());
        Ok(rule)
    }

    /// Routes a reaction add/remove to its rule queue or collection.
    pub async fn handle_reaction(&self, event: &ReactionEvent) -> Result<ReactionOutcome, RolekeeperError> {
        if event.is_bot || event.user_id == self.remote.bot_user_id() {
            return Ok(ReactionOutcome::Ignored);
        }

        if let Some(rule) = self.rule_for(event.message_id, &event.emoji).await? {
            let result = self.permission_with_retry(&rule, event).await?;
            if !result.passed() {
                debug!(rule_id = rule.id, user_id = %event.user_id, ?result, "reaction denied by scope");
                return Ok(ReactionOutcome::Denied(result));
            }
            let applied = self
                .enqueue(rule.id, event.user_id, event.added, event.at)
                .await?;
            return Ok(ReactionOutcome::Queued { applied });
        }

        if event.added
            && let Some(item) = self.store.find_item_by_message(event.message_id).await?
        {
            let granted = self
                .collections
                .assign_reaction(item.collection_id, item.id, &event.emoji, event.user_id)
                .await?;
            return Ok(ReactionOutcome::Collection { granted });
        }

        Ok(ReactionOutcome::Ignored)
    }

    /// Member and channel lookups are remote calls; a transient failure is
    /// retried before the intent is given up.
    async fn permission_with_retry(
        &self,
        rule: &ReactionRule,
        event: &ReactionEvent,
    ) -> Result<PermissionResult, RolekeeperError> {
        let mut attempt = 1;
        loop {
            match self.check_rule_permission(rule, event).await {
                Ok(result) => return Ok(result),
                Err(e) if attempt < PERMISSION_LOOKUP_ATTEMPTS => {
                    debug!(rule_id = rule.id, user_id = %event.user_id, attempt, error = %e, "permission lookup failed, retrying");
                    tokio::time::sleep(PERMISSION_RETRY_DELAY * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(
                        rule_id = rule.id,
                        user_id = %event.user_id,
                        added = event.added,
                        error = %e,
                        "reaction intent dropped, permission lookup kept failing"
                    );
                    return Err(e);
                }
            }
        }
    }

    async fn check_rule_permission(
        &self,
        rule: &ReactionRule,
        event: &ReactionEvent,
    ) -> Result<PermissionResult, RolekeeperError> {
        let Some(scope_id) = rule.scope_id else {
            return Ok(PermissionResult::NoScope);
        };
        let Some(scope) = self.store.get_scope(scope_id).await? else {
            return Ok(PermissionResult::NoScope);
        };
        if scope.is_open() {
            return Ok(PermissionResult::Pass);
        }
        let roles = self
            .remote
            .get_member(rule.guild_id, event.user_id)
            .await?
            .map(|m| m.roles)
            .unwrap_or_default();
        let channel = self.channel_context(event.channel_id).await?;
        let actor = Actor {
            user: Some(event.user_id),
            roles: Some(&roles),
            channel: Some(channel),
        };
        Ok(permission::evaluate(Some(&scope), &actor))
    }

    /// Pending and failed-abort counts of a rule.
    pub async fn rule_status(&self, rule: RuleId) -> Result<RuleQueueStatus, RolekeeperError> {
        if self.store.get_rule(rule).await?.is_none() {
            return Err(RolekeeperError::not_found("reaction rule", rule));
        }
        Ok(RuleQueueStatus {
            pending: self.store.unworked_count(rule).await?,
            failed: self.store.failed_count(rule).await?,
        })
    }

    pub fn is_listening(&self, rule: RuleId) -> bool {
        self.reaction_workers.is_running(&rule)
    }

    // --- Mass role operations ---

    /// Materializes the target population and starts draining it.
    pub async fn create_mass_operation(
        &self,
        new: NewMassRoleOperation,
    ) -> Result<MassRoleOperation, RolekeeperError> {
        if new.actions.is_empty() {
            return Err(RolekeeperError::InvalidInput(
                "mass role operation has no role actions".into(),
            ));
        }
        if !new.filter.include_bots && !new.filter.include_humans {
            return Err(RolekeeperError::InvalidInput(
                "mass role operation excludes both bots and humans".into(),
            ));
        }
        let actions = &new.actions;
        for role in actions.add.iter().chain(&actions.remove).chain(&actions.toggle) {
            if !self.remote.role_exists(new.guild_id, *role).await? {
                return Err(RolekeeperError::not_found("role", role));
            }
        }

        let members = self.remote.list_members(new.guild_id).await?;
        let targets = materialize(&new.filter, &members);
        let op = self
            .store
            .create_operation(new, &targets, self.clock.now())
            .await?;
        info!(operation_id = op.id, members = targets.len(), "mass role operation created");
        self.spawn_mass_worker(op.clone());
        Ok(op)
    }

    /// Halts the operation before its next member, keeping the record and
    /// the remaining queue.
    pub fn stop_mass_operation(&self, id: OperationId) -> bool {
        self.mass_workers.remove(&id)
    }

    /// Stops the operation and discards its remaining members.
    pub async fn delete_mass_operation(&self, id: OperationId) -> Result<(), RolekeeperError> {
        self.stop_mass_operation(id);
        self.store.delete_operation(id).await?;
        info!(operation_id = id, "mass role operation deleted");
        Ok(())
    }

    pub async fn operation_status(&self, id: OperationId) -> Result<OperationStatus, RolekeeperError> {
        if self.store.get_operation(id).await?.is_none() {
            return Err(RolekeeperError::not_found("mass role operation", id));
        }
        Ok(OperationStatus {
            remaining: self.store.remaining_members(id).await?,
            running: self.mass_workers.is_running(&id),
        })
    }

    // --- Auto-role cascade ---

    pub async fn on_member_join(&self, guild: GuildId, user: UserId) -> Result<(), RolekeeperError> {
        self.cascade.on_join(guild, user).await
    }

    pub async fn on_role_changed(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
        direction: RoleDirection,
    ) -> Result<(), RolekeeperError> {
        self.cascade.on_role_changed(guild, user, role, direction).await
    }

    pub async fn is_direct_assignment_allowed(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<bool, RolekeeperError> {
        self.cascade
            .is_direct_assignment_allowed(guild, user, role)
            .await
    }

    pub async fn add_auto_role(&self, new: NewAutoRoleRule) -> Result<AutoRoleRule, RolekeeperError> {
        if new.trigger.is_some_and(|t| t.role_id == new.role_id) {
            return Err(RolekeeperError::InvalidInput(
                "auto-role rule cannot trigger on its own role".into(),
            ));
        }
        if new.trigger.is_none() && new.direction == RoleDirection::Remove {
            return Err(RolekeeperError::InvalidInput(
                "join rules can only add roles".into(),
            ));
        }
        if !self.remote.role_exists(new.guild_id, new.role_id).await? {
            return Err(RolekeeperError::not_found("role", new.role_id));
        }
        let guild = new.guild_id;
        let rule = self.store.insert_auto_role(new).await?;
        self.cascade.invalidate(Some(guild));
        Ok(rule)
    }

    pub async fn delete_auto_role(&self, id: AutoRoleId) -> Result<(), RolekeeperError> {
        self.store.delete_auto_role(id).await?;
        self.cascade.invalidate(None);
        Ok(())
    }

    // --- Permission scopes ---

    pub async fn create_scope(&self, name: &str) -> Result<PermissionScope, RolekeeperError> {
        if name.trim().is_empty() {
            return Err(RolekeeperError::InvalidInput("scope name must not be empty".into()));
        }
        self.store.create_scope(name).await
    }

    async fn edit_scope(
        &self,
        id: ScopeId,
        edit: impl FnOnce(&mut PermissionScope) -> Result<(), RolekeeperError>,
    ) -> Result<PermissionScope, RolekeeperError> {
        let mut scope = self
            .store
            .get_scope(id)
            .await?
            .ok_or_else(|| RolekeeperError::not_found("scope", id))?;
        edit(&mut scope)?;
        self.store.save_scope(&scope).await?;
        Ok(scope)
    }

    pub async fn add_scope_entry(
        &self,
        id: ScopeId,
        entry: ScopeEntry,
    ) -> Result<PermissionScope, RolekeeperError> {
        self.edit_scope(id, |scope| {
            scope.add_entry(entry);
            Ok(())
        })
        .await
    }

    pub async fn remove_scope_entry(
        &self,
        id: ScopeId,
        subject_type: SubjectType,
        subject_id: u64,
    ) -> Result<PermissionScope, RolekeeperError> {
        self.edit_scope(id, |scope| {
            scope
                .remove_entry(subject_type, subject_id)
                .map(|_| ())
                .ok_or_else(|| RolekeeperError::not_found("scope entry", subject_id))
        })
        .await
    }

    pub async fn set_scope_whitelist(
        &self,
        id: ScopeId,
        subject_type: SubjectType,
        enabled: bool,
    ) -> Result<PermissionScope, RolekeeperError> {
        self.edit_scope(id, |scope| scope.set_whitelist(subject_type, enabled))
            .await
    }

    pub async fn delete_scope(&self, id: ScopeId) -> Result<(), RolekeeperError> {
        self.store.delete_scope(id).await
    }

    // --- Message collections ---

    pub async fn create_collection(
        &self,
        new: NewMessageCollection,
    ) -> Result<MessageCollection, RolekeeperError> {
        match self.remote.channel_kind(new.channel_id).await? {
            Some(kind) if kind.is_text_capable() => {}
            Some(kind) => {
                return Err(RolekeeperError::InvalidInput(format!(
                    "channel {} is a {kind} channel",
                    new.channel_id
                )));
            }
            None => return Err(RolekeeperError::not_found("channel", new.channel_id)),
        }
        if let Some(reaction) = &new.reaction
            && !self.remote.role_exists(new.guild_id, reaction.role_id).await?
        {
            return Err(RolekeeperError::not_found("role", reaction.role_id));
        }
        self.store.insert_collection(new, self.clock.now()).await
    }

    /// Inserts an item at a 1-based index, shifting later items down the list.
    pub async fn insert_item(
        &self,
        collection: CollectionId,
        sort_index: u32,
        item: NewCollectionItem,
    ) -> Result<CollectionItem, RolekeeperError> {
        if item.content.trim().is_empty() {
            return Err(RolekeeperError::InvalidInput("item content must not be empty".into()));
        }
        if self.store.get_collection(collection).await?.is_none() {
            return Err(RolekeeperError::not_found("collection", collection));
        }
        self.store
            .insert_item(collection, sort_index, item, self.clock.now())
            .await
    }

    pub async fn edit_item(&self, id: ItemId, content: &str) -> Result<(), RolekeeperError> {
        if content.trim().is_empty() {
            return Err(RolekeeperError::InvalidInput("item content must not be empty".into()));
        }
        self.store
            .update_item_content(id, content, self.clock.now())
            .await
    }

    /// Published items are removed on the next publish; unpublished ones
    /// are dropped immediately.
    pub async fn remove_item(&self, id: ItemId) -> Result<(), RolekeeperError> {
        let item = self
            .store
            .get_item(id)
            .await?
            .ok_or_else(|| RolekeeperError::not_found("collection item", id))?;
        let now = self.clock.now();
        if item.published_message_id.is_some() {
            self.store.mark_pending_delete(id, now).await
        } else {
            self.store.remove_item(id).await?;
            self.store
                .set_requires_publish(item.collection_id, true, now)
                .await
        }
    }

    /// Forgets a collection. Messages already posted stay in the channel.
    pub async fn delete_collection(&self, id: CollectionId) -> Result<(), RolekeeperError> {
        self.store.delete_collection(id).await?;
        self.collections.forget(id);
        info!(collection_id = id, "collection deleted");
        Ok(())
    }

    pub async fn audit(&self, collection: CollectionId) -> Result<AuditReport, RolekeeperError> {
        self.collections.audit(collection).await
    }

    pub async fn publish(&self, collection: CollectionId) -> Result<PublishOutcome, RolekeeperError> {
        self.collections.publish(collection).await
    }

    pub async fn maintain_last(&self, collection: CollectionId) -> Result<bool, RolekeeperError> {
        self.collections.maintain_last(collection).await
    }

    pub async fn assign_reaction(
        &self,
        collection: CollectionId,
        item: ItemId,
        emoji: &str,
        user: UserId,
    ) -> Result<bool, RolekeeperError> {
        self.collections
            .assign_reaction(collection, item, emoji, user)
            .await
    }

    /// Drift detection hook for message events in a channel.
    pub async fn on_channel_activity(
        &self,
        channel: ChannelId,
        author: Option<UserId>,
    ) -> Result<(), RolekeeperError> {
        if !self.settings.maintain_on_activity {
            return Ok(());
        }
        self.collections.on_channel_activity(channel, author).await
    }
}
