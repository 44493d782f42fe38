// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory platform adapter for deterministic tests.
//!
//! `MockPlatform` keeps guild state (roles, members, channels, messages) in
//! memory, logs every mutating call, and can be told to fail or stall.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use rolekeeper_core::ids::{ChannelId, GuildId, MessageId, RoleId, UserId};
use rolekeeper_core::types::{ChannelKind, MemberSnapshot, PlatformMessage};
use rolekeeper_core::{Adapter, AdapterKind, HealthStatus, PlatformAdapter, RolekeeperError};

/// A mutating call observed by the mock, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    AddRole(UserId, RoleId),
    RemoveRole(UserId, RoleId),
    Send(ChannelId, MessageId),
    Edit(ChannelId, MessageId),
    Delete(ChannelId, MessageId),
    React(MessageId, String),
}

#[derive(Default)]
struct State {
    roles: HashSet<(GuildId, RoleId)>,
    members: BTreeMap<(GuildId, UserId), MemberSnapshot>,
    channels: HashMap<ChannelId, ChannelKind>,
    /// Per channel, ordered by id (post order).
    messages: BTreeMap<ChannelId, BTreeMap<MessageId, PlatformMessage>>,
    next_message_id: u64,
    calls: Vec<PlatformCall>,
    failing_users: HashSet<UserId>,
    failing_roles: HashSet<RoleId>,
    failing_lookups: u32,
    offline: bool,
    delay: Option<Duration>,
}

/// A fake guild behind [`PlatformAdapter`].
pub struct MockPlatform {
    bot: UserId,
    state: Mutex<State>,
}

impl MockPlatform {
    pub fn new(bot: UserId) -> Self {
        Self {
            bot,
            state: Mutex::new(State {
                next_message_id: 1_000,
                ..State::default()
            }),
        }
    }

    pub async fn define_role(&self, guild: GuildId, role: RoleId) {
        self.state.lock().await.roles.insert((guild, role));
    }

    pub async fn delete_role(&self, guild: GuildId, role: RoleId) {
        let mut state = self.state.lock().await;
        state.roles.remove(&(guild, role));
        for member in state.members.values_mut() {
            member.roles.retain(|r| *r != role);
        }
    }

    pub async fn add_member(&self, guild: GuildId, user: UserId, roles: &[RoleId], is_bot: bool) {
        let mut state = self.state.lock().await;
        for role in roles {
            state.roles.insert((guild, *role));
        }
        state.members.insert(
            (guild, user),
            MemberSnapshot {
                guild_id: guild,
                user_id: user,
                roles: roles.to_vec(),
                is_bot,
            },
        );
    }

    pub async fn remove_member(&self, guild: GuildId, user: UserId) {
        self.state.lock().await.members.remove(&(guild, user));
    }

    /// Current roles of a member, sorted.
    pub async fn roles_of(&self, guild: GuildId, user: UserId) -> Option<Vec<RoleId>> {
        let state = self.state.lock().await;
        state.members.get(&(guild, user)).map(|m| {
            let mut roles = m.roles.clone();
            roles.sort();
            roles
        })
    }

    pub async fn add_channel(&self, channel: ChannelId, kind: ChannelKind) {
        let mut state = self.state.lock().await;
        state.channels.insert(channel, kind);
        state.messages.entry(channel).or_default();
    }

    /// Posts a message as someone other than the bot. Not logged as a call.
    pub async fn post_as(&self, channel: ChannelId, author: UserId, content: &str) -> MessageId {
        let mut state = self.state.lock().await;
        insert_message(&mut state, channel, author, content)
    }

    /// Deletes a message out from under the bot.
    pub async fn delete_externally(&self, channel: ChannelId, message: MessageId) {
        let mut state = self.state.lock().await;
        if let Some(messages) = state.messages.get_mut(&channel) {
            messages.remove(&message);
        }
    }

    /// Rewrites a message out from under the bot.
    pub async fn edit_externally(&self, channel: ChannelId, message: MessageId, content: &str) {
        let mut state = self.state.lock().await;
        if let Some(msg) = state
            .messages
            .get_mut(&channel)
            .and_then(|m| m.get_mut(&message))
        {
            msg.content = content.to_string();
        }
    }

    /// Messages in a channel, oldest first.
    pub async fn messages_in(&self, channel: ChannelId) -> Vec<PlatformMessage> {
        let state = self.state.lock().await;
        state
            .messages
            .get(&channel)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn calls(&self) -> Vec<PlatformCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    /// Role mutations targeting `user` fail until cleared.
    pub async fn fail_role_changes_for(&self, user: UserId, failing: bool) {
        let mut state = self.state.lock().await;
        if failing {
            state.failing_users.insert(user);
        } else {
            state.failing_users.remove(&user);
        }
    }

    /// Mutations of `role` fail until cleared.
    pub async fn fail_role(&self, role: RoleId, failing: bool) {
        let mut state = self.state.lock().await;
        if failing {
            state.failing_roles.insert(role);
        } else {
            state.failing_roles.remove(&role);
        }
    }

    /// The next `count` member lookups fail.
    pub async fn fail_member_lookups(&self, count: u32) {
        self.state.lock().await.failing_lookups = count;
    }

    /// Every call fails while offline.
    pub async fn set_offline(&self, offline: bool) {
        self.state.lock().await.offline = offline;
    }

    /// Every call sleeps this long before answering.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        self.state.lock().await.delay = delay;
    }

    async fn enter(&self) -> Result<tokio::sync::MutexGuard<'_, State>, RolekeeperError> {
        let delay = self.state.lock().await.delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.state.lock().await;
        if state.offline {
            return Err(RolekeeperError::platform("mock platform offline"));
        }
        Ok(state)
    }

    async fn change_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
        add: bool,
    ) -> Result<(), RolekeeperError> {
        let mut state = self.enter().await?;
        if state.failing_users.contains(&user) || state.failing_roles.contains(&role) {
            return Err(RolekeeperError::platform("missing permissions"));
        }
        if !state.roles.contains(&(guild, role)) {
            return Err(RolekeeperError::not_found("role", role));
        }
        let member = state
            .members
            .get_mut(&(guild, user))
            .ok_or_else(|| RolekeeperError::not_found("member", user))?;
        if add {
            if !member.roles.contains(&role) {
                member.roles.push(role);
            }
        } else {
            member.roles.retain(|r| *r != role);
        }
        state.calls.push(if add {
            PlatformCall::AddRole(user, role)
        } else {
            PlatformCall::RemoveRole(user, role)
        });
        Ok(())
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new(UserId(1))
    }
}

fn insert_message(state: &mut State, channel: ChannelId, author: UserId, content: &str) -> MessageId {
    state.next_message_id += 1;
    let id = MessageId(state.next_message_id);
    state.messages.entry(channel).or_default().insert(
        id,
        PlatformMessage {
            id,
            channel_id: channel,
            author_id: author,
            content: content.to_string(),
        },
    );
    id
}

#[async_trait]
impl Adapter for MockPlatform {
    fn name(&self) -> &str {
        "mock-platform"
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Platform
    }

    async fn health_check(&self) -> Result<HealthStatus, RolekeeperError> {
        if self.state.lock().await.offline {
            Ok(HealthStatus::Unhealthy("offline".to_string()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }
}

#[async_trait]
impl PlatformAdapter for MockPlatform {
    fn bot_user_id(&self) -> UserId {
        self.bot
    }

    async fn get_member(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> Result<Option<MemberSnapshot>, RolekeeperError> {
        let mut state = self.enter().await?;
        if state.failing_lookups > 0 {
            state.failing_lookups -= 1;
            return Err(RolekeeperError::platform("member lookup failed"));
        }
        Ok(state.members.get(&(guild, user)).cloned())
    }

    async fn list_members(&self, guild: GuildId) -> Result<Vec<MemberSnapshot>, RolekeeperError> {
        let state = self.enter().await?;
        Ok(state
            .members
            .values()
            .filter(|m| m.guild_id == guild)
            .cloned()
            .collect())
    }

    async fn role_exists(&self, guild: GuildId, role: RoleId) -> Result<bool, RolekeeperError> {
        let state = self.enter().await?;
        Ok(state.roles.contains(&(guild, role)))
    }

    async fn add_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), RolekeeperError> {
        self.change_role(guild, user, role, true).await
    }

    async fn remove_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), RolekeeperError> {
        self.change_role(guild, user, role, false).await
    }

    async fn channel_kind(
        &self,
        channel: ChannelId,
    ) -> Result<Option<ChannelKind>, RolekeeperError> {
        let state = self.enter().await?;
        Ok(state.channels.get(&channel).copied())
    }

    async fn get_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<Option<PlatformMessage>, RolekeeperError> {
        let state = self.enter().await?;
        Ok(state
            .messages
            .get(&channel)
            .and_then(|m| m.get(&message))
            .cloned())
    }

    async fn messages_after(
        &self,
        channel: ChannelId,
        after: MessageId,
    ) -> Result<Vec<PlatformMessage>, RolekeeperError> {
        let state = self.enter().await?;
        Ok(state
            .messages
            .get(&channel)
            .map(|m| {
                m.range(MessageId(after.0 + 1)..)
                    .map(|(_, msg)| msg.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn send_message(
        &self,
        channel: ChannelId,
        content: &str,
    ) -> Result<MessageId, RolekeeperError> {
        let mut state = self.enter().await?;
        if !state.channels.contains_key(&channel) {
            return Err(RolekeeperError::not_found("channel", channel));
        }
        let bot = self.bot;
        let id = insert_message(&mut state, channel, bot, content);
        state.calls.push(PlatformCall::Send(channel, id));
        Ok(id)
    }

    async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: &str,
    ) -> Result<(), RolekeeperError> {
        let mut state = self.enter().await?;
        let msg = state
            .messages
            .get_mut(&channel)
            .and_then(|m| m.get_mut(&message))
            .ok_or_else(|| RolekeeperError::not_found("message", message))?;
        msg.content = content.to_string();
        state.calls.push(PlatformCall::Edit(channel, message));
        Ok(())
    }

    async fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), RolekeeperError> {
        let mut state = self.enter().await?;
        let removed = state
            .messages
            .get_mut(&channel)
            .and_then(|m| m.remove(&message));
        if removed.is_none() {
            return Err(RolekeeperError::not_found("message", message));
        }
        state.calls.push(PlatformCall::Delete(channel, message));
        Ok(())
    }

    async fn add_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: &str,
    ) -> Result<(), RolekeeperError> {
        let mut state = self.enter().await?;
        let exists = state
            .messages
            .get(&channel)
            .is_some_and(|m| m.contains_key(&message));
        if !exists {
            return Err(RolekeeperError::not_found("message", message));
        }
        state
            .calls
            .push(PlatformCall::React(message, emoji.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const G: GuildId = GuildId(1);

    #[tokio::test]
    async fn role_changes_are_applied_and_logged() {
        let platform = MockPlatform::default();
        platform.add_member(G, UserId(5), &[], false).await;
        platform.define_role(G, RoleId(9)).await;

        platform.add_role(G, UserId(5), RoleId(9)).await.unwrap();
        platform.add_role(G, UserId(5), RoleId(9)).await.unwrap();
        assert_eq!(platform.roles_of(G, UserId(5)).await, Some(vec![RoleId(9)]));

        platform.remove_role(G, UserId(5), RoleId(9)).await.unwrap();
        assert_eq!(platform.roles_of(G, UserId(5)).await, Some(vec![]));
        assert_eq!(platform.calls().await.len(), 3);
    }

    #[tokio::test]
    async fn injected_failures_surface_as_errors() {
        let platform = MockPlatform::default();
        platform.add_member(G, UserId(5), &[], false).await;
        platform.define_role(G, RoleId(9)).await;

        platform.fail_role_changes_for(UserId(5), true).await;
        assert!(platform.add_role(G, UserId(5), RoleId(9)).await.is_err());
        platform.fail_role_changes_for(UserId(5), false).await;

        platform.set_offline(true).await;
        assert!(platform.get_member(G, UserId(5)).await.is_err());
        platform.set_offline(false).await;

        assert!(matches!(
            platform.add_role(G, UserId(5), RoleId(77)).await,
            Err(RolekeeperError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn messages_after_returns_later_posts_in_order() {
        let platform = MockPlatform::default();
        let ch = ChannelId(3);
        platform.add_channel(ch, ChannelKind::Text).await;

        let first = platform.send_message(ch, "one").await.unwrap();
        let second = platform.post_as(ch, UserId(8), "two").await;
        let third = platform.send_message(ch, "three").await.unwrap();

        let after: Vec<MessageId> = platform
            .messages_after(ch, first)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(after, vec![second, third]);
    }
}
