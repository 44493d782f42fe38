// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform adapter trait for the remote chat service.

use async_trait::async_trait;

use crate::error::RolekeeperError;
use crate::ids::{ChannelId, GuildId, MessageId, RoleId, UserId};
use crate::traits::adapter::Adapter;
use crate::types::{ChannelKind, MemberSnapshot, PlatformMessage};

/// REST-level access to the chat platform.
///
/// Every call may fail independently of local state. Lookups return
/// `Ok(None)` when the remote entity does not exist; mutations on a missing
/// entity return [`RolekeeperError::NotFound`].
#[async_trait]
pub trait PlatformAdapter: Adapter {
    /// The user id the bot itself acts as.
    fn bot_user_id(&self) -> UserId;

    /// Fetches a member with their current role set.
    async fn get_member(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> Result<Option<MemberSnapshot>, RolekeeperError>;

    /// Lists every member of the guild.
    async fn list_members(&self, guild: GuildId) -> Result<Vec<MemberSnapshot>, RolekeeperError>;

    /// Whether the role still exists in the guild.
    async fn role_exists(&self, guild: GuildId, role: RoleId) -> Result<bool, RolekeeperError>;

    async fn add_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), RolekeeperError>;

    async fn remove_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), RolekeeperError>;

    /// Classifies a channel, or `None` when it no longer exists.
    async fn channel_kind(&self, channel: ChannelId)
    -> Result<Option<ChannelKind>, RolekeeperError>;

    async fn get_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<Option<PlatformMessage>, RolekeeperError>;

    /// Messages posted strictly after `after`, oldest first.
    async fn messages_after(
        &self,
        channel: ChannelId,
        after: MessageId,
    ) -> Result<Vec<PlatformMessage>, RolekeeperError>;

    async fn send_message(
        &self,
        channel: ChannelId,
        content: &str,
    ) -> Result<MessageId, RolekeeperError>;

    async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: &str,
    ) -> Result<(), RolekeeperError>;

    async fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), RolekeeperError>;

    /// Adds the bot's own reaction so members have something to click.
    async fn add_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: &str,
    ) -> Result<(), RolekeeperError>;
}
