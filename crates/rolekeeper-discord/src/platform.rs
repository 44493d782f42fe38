// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discord REST implementation of [`PlatformAdapter`].

use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{
    Channel, ChannelType, CreateMessage, EditMessage, Http, HttpError, Member, Message,
    MessagePagination, ReactionType,
};
use serenity::model::id as discord;
use tracing::debug;

use rolekeeper_core::RolekeeperError;
use rolekeeper_core::ids::{ChannelId, GuildId, MessageId, RoleId, UserId};
use rolekeeper_core::traits::{Adapter, PlatformAdapter};
use rolekeeper_core::types::{
    AdapterKind, ChannelKind, HealthStatus, MemberSnapshot, PlatformMessage,
};

/// Discord's page size for member and message listings.
const MEMBER_PAGE: u64 = 1000;
const MESSAGE_PAGE: u8 = 100;

/// Talks to Discord over serenity's HTTP client.
pub struct DiscordPlatform {
    http: Arc<Http>,
    bot: UserId,
}

impl DiscordPlatform {
    /// Wraps an authenticated client, resolving the bot's own user id.
    pub async fn connect(http: Arc<Http>) -> Result<Self, RolekeeperError> {
        let me = http
            .get_current_user()
            .await
            .map_err(|e| platform_err("fetch current user", e))?;
        debug!(bot_user_id = %me.id, "discord platform connected");
        Ok(Self {
            http,
            bot: UserId(me.id.get()),
        })
    }

    pub fn http(&self) -> &Arc<Http> {
        &self.http
    }
}

fn platform_err(action: &str, e: serenity::Error) -> RolekeeperError {
    RolekeeperError::Platform {
        message: format!("{action}: {e}"),
        source: Some(Box::new(e)),
    }
}

fn is_not_found(e: &serenity::Error) -> bool {
    matches!(
        e,
        serenity::Error::Http(HttpError::UnsuccessfulRequest(resp)) if resp.status_code.as_u16() == 404
    )
}

/// Maps a 404 to `None` and every other failure to a platform error.
fn optional<T>(action: &str, result: serenity::Result<T>) -> Result<Option<T>, RolekeeperError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if is_not_found(&e) => Ok(None),
        Err(e) => Err(platform_err(action, e)),
    }
}

fn guild_id(id: GuildId) -> discord::GuildId {
    discord::GuildId::new(id.get())
}

fn user_id(id: UserId) -> discord::UserId {
    discord::UserId::new(id.get())
}

fn role_id(id: RoleId) -> discord::RoleId {
    discord::RoleId::new(id.get())
}

fn channel_id(id: ChannelId) -> discord::ChannelId {
    discord::ChannelId::new(id.get())
}

fn message_id(id: MessageId) -> discord::MessageId {
    discord::MessageId::new(id.get())
}

fn snapshot(member: &Member) -> MemberSnapshot {
    MemberSnapshot {
        guild_id: GuildId(member.guild_id.get()),
        user_id: UserId(member.user.id.get()),
        roles: member.roles.iter().map(|r| RoleId(r.get())).collect(),
        is_bot: member.user.bot,
    }
}

fn platform_message(message: &Message) -> PlatformMessage {
    PlatformMessage {
        id: MessageId(message.id.get()),
        channel_id: ChannelId(message.channel_id.get()),
        author_id: UserId(message.author.id.get()),
        content: message.content.clone(),
    }
}

/// Collapses Discord's channel types into the classes the engine cares about.
pub fn classify(kind: ChannelType) -> ChannelKind {
    match kind {
        ChannelType::Text => ChannelKind::Text,
        ChannelType::News => ChannelKind::Announcement,
        ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread => {
            ChannelKind::Thread
        }
        ChannelType::Voice | ChannelType::Stage => ChannelKind::Voice,
        ChannelType::Category => ChannelKind::Category,
        _ => ChannelKind::Other,
    }
}

fn reaction_type(emoji: &str) -> Result<ReactionType, RolekeeperError> {
    ReactionType::try_from(emoji)
        .map_err(|e| RolekeeperError::InvalidInput(format!("invalid emoji `{emoji}`: {e}")))
}

#[async_trait]
impl Adapter for DiscordPlatform {
    fn name(&self) -> &str {
        "discord"
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Platform
    }

    async fn health_check(&self) -> Result<HealthStatus, RolekeeperError> {
        Ok(match self.http.get_current_user().await {
            Ok(_) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }
}

#[async_trait]
impl PlatformAdapter for DiscordPlatform {
    fn bot_user_id(&self) -> UserId {
        self.bot
    }

    async fn get_member(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> Result<Option<MemberSnapshot>, RolekeeperError> {
        let member = optional(
            "fetch member",
            self.http.get_member(guild_id(guild), user_id(user)).await,
        )?;
        Ok(member.as_ref().map(snapshot))
    }

    async fn list_members(&self, guild: GuildId) -> Result<Vec<MemberSnapshot>, RolekeeperError> {
        let mut members = Vec::new();
        let mut after = None;
        loop {
            let page = self
                .http
                .get_guild_members(guild_id(guild), Some(MEMBER_PAGE), after)
                .await
                .map_err(|e| platform_err("list members", e))?;
            let full = page.len() as u64 == MEMBER_PAGE;
            after = page.last().map(|m| m.user.id.get());
            members.extend(page.iter().map(snapshot));
            if !full {
                break;
            }
        }
        Ok(members)
    }

    async fn role_exists(&self, guild: GuildId, role: RoleId) -> Result<bool, RolekeeperError> {
        let roles = self
            .http
            .get_guild_roles(guild_id(guild))
            .await
            .map_err(|e| platform_err("list roles", e))?;
        Ok(roles.iter().any(|r| r.id.get() == role.get()))
    }

    async fn add_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), RolekeeperError> {
        self.http
            .add_member_role(guild_id(guild), user_id(user), role_id(role), None)
            .await
            .map_err(|e| platform_err("add role", e))
    }

    async fn remove_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), RolekeeperError> {
        self.http
            .remove_member_role(guild_id(guild), user_id(user), role_id(role), None)
            .await
            .map_err(|e| platform_err("remove role", e))
    }

    async fn channel_kind(
        &self,
        channel: ChannelId,
    ) -> Result<Option<ChannelKind>, RolekeeperError> {
        let found = optional("fetch channel", self.http.get_channel(channel_id(channel)).await)?;
        Ok(found.map(|c| match c {
            Channel::Guild(gc) => classify(gc.kind),
            _ => ChannelKind::Other,
        }))
    }

    async fn get_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<Option<PlatformMessage>, RolekeeperError> {
        let found = optional(
            "fetch message",
            self.http
                .get_message(channel_id(channel), message_id(message))
                .await,
        )?;
        Ok(found.as_ref().map(platform_message))
    }

    async fn messages_after(
        &self,
        channel: ChannelId,
        after: MessageId,
    ) -> Result<Vec<PlatformMessage>, RolekeeperError> {
        let mut out: Vec<PlatformMessage> = Vec::new();
        let mut cursor = message_id(after);
        loop {
            let page = self
                .http
                .get_messages(
                    channel_id(channel),
                    Some(MessagePagination::After(cursor)),
                    Some(MESSAGE_PAGE),
                )
                .await
                .map_err(|e| platform_err("list messages", e))?;
            let full = page.len() == usize::from(MESSAGE_PAGE);
            match page.iter().map(|m| m.id).max() {
                Some(newest) => cursor = newest,
                None => break,
            }
            out.extend(page.iter().map(platform_message));
            if !full {
                break;
            }
        }
        out.sort_by_key(|m| m.id);
        Ok(out)
    }

    async fn send_message(
        &self,
        channel: ChannelId,
        content: &str,
    ) -> Result<MessageId, RolekeeperError> {
        let sent = channel_id(channel)
            .send_message(&self.http, CreateMessage::new().content(content))
            .await
            .map_err(|e| platform_err("send message", e))?;
        Ok(MessageId(sent.id.get()))
    }

    async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: &str,
    ) -> Result<(), RolekeeperError> {
        channel_id(channel)
            .edit_message(&self.http, message_id(message), EditMessage::new().content(content))
            .await
            .map(|_| ())
            .map_err(|e| platform_err("edit message", e))
    }

    async fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), RolekeeperError> {
        match channel_id(channel)
            .delete_message(&self.http, message_id(message))
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Err(RolekeeperError::not_found("message", message)),
            Err(e) => Err(platform_err("delete message", e)),
        }
    }

    async fn add_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: &str,
    ) -> Result<(), RolekeeperError> {
        let reaction = reaction_type(emoji)?;
        self.http
            .create_reaction(channel_id(channel), message_id(message), &reaction)
            .await
            .map_err(|e| platform_err("add reaction", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_like_channels_are_text_capable() {
        for kind in [
            ChannelType::Text,
            ChannelType::News,
            ChannelType::PublicThread,
            ChannelType::PrivateThread,
        ] {
            assert!(classify(kind).is_text_capable(), "{kind:?}");
        }
        for kind in [ChannelType::Voice, ChannelType::Stage, ChannelType::Category] {
            assert!(!classify(kind).is_text_capable(), "{kind:?}");
        }
    }

    #[test]
    fn unicode_and_custom_emoji_parse() {
        assert!(matches!(reaction_type("✅"), Ok(ReactionType::Unicode(_))));
        assert!(matches!(
            reaction_type("<:party:123456789012345678>"),
            Ok(ReactionType::Custom { .. })
        ));
    }
}
