// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway event handler feeding Discord events into the reconcile service.

use std::sync::Arc;

use serenity::all::{
    Context, EventHandler, GatewayIntents, GuildMemberUpdateEvent, Member, Message,
    MessageUpdateEvent, Reaction, Ready,
};
use serenity::async_trait;
use serenity::model::id as discord;
use tracing::{debug, info, warn};

use rolekeeper_core::ids::{ChannelId, GuildId, MessageId, RoleId, UserId};
use rolekeeper_core::types::{ReactionEvent, RoleDirection};
use rolekeeper_engine::{ReactionOutcome, ReconcileService};

/// Gateway intents the handler depends on.
pub fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
}

/// Role changes between two role sets, removals first.
pub fn role_diff(old: &[RoleId], new: &[RoleId]) -> Vec<(RoleId, RoleDirection)> {
    let removed = old
        .iter()
        .filter(|r| !new.contains(r))
        .map(|r| (*r, RoleDirection::Remove));
    let added = new
        .iter()
        .filter(|r| !old.contains(r))
        .map(|r| (*r, RoleDirection::Add));
    removed.chain(added).collect()
}

fn roles(ids: &[discord::RoleId]) -> Vec<RoleId> {
    ids.iter().map(|r| RoleId(r.get())).collect()
}

pub struct RolekeeperHandler {
    service: Arc<ReconcileService>,
    guild: Option<GuildId>,
}

impl RolekeeperHandler {
    /// Routes events to `service`. With `guild` set, events from every
    /// other guild are dropped.
    pub fn new(service: Arc<ReconcileService>, guild: Option<GuildId>) -> Self {
        Self { service, guild }
    }

    fn accepts(&self, guild: Option<discord::GuildId>) -> Option<GuildId> {
        let guild = GuildId(guild?.get());
        match self.guild {
            Some(only) if only != guild => None,
            _ => Some(guild),
        }
    }

    async fn reaction(&self, reaction: Reaction, added: bool) {
        let Some(guild) = self.accepts(reaction.guild_id) else {
            return;
        };
        let Some(user) = reaction.user_id else {
            return;
        };
        let event = ReactionEvent {
            guild_id: guild,
            channel_id: ChannelId(reaction.channel_id.get()),
            message_id: MessageId(reaction.message_id.get()),
            emoji: reaction.emoji.to_string(),
            user_id: UserId(user.get()),
            is_bot: reaction.member.as_ref().is_some_and(|m| m.user.bot),
            added,
            at: chrono::Utc::now(),
        };
        match self.service.handle_reaction(&event).await {
            Ok(ReactionOutcome::Ignored) => {}
            Ok(outcome) => debug!(message_id = %event.message_id, user_id = %event.user_id, ?outcome, "reaction handled"),
            Err(e) => warn!(message_id = %event.message_id, user_id = %event.user_id, error = %e, "reaction handling failed"),
        }
    }

    async fn activity(&self, guild: Option<discord::GuildId>, channel: discord::ChannelId, author: Option<UserId>) {
        if self.accepts(guild).is_none() {
            return;
        }
        let channel = ChannelId(channel.get());
        if let Err(e) = self.service.on_channel_activity(channel, author).await {
            warn!(channel_id = %channel, error = %e, "channel upkeep failed");
        }
    }
}

#[async_trait]
impl EventHandler for RolekeeperHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, guilds = ready.guilds.len(), "discord gateway ready");
    }

    async fn reaction_add(&self, _ctx: Context, reaction: Reaction) {
        self.reaction(reaction, true).await;
    }

    async fn reaction_remove(&self, _ctx: Context, reaction: Reaction) {
        self.reaction(reaction, false).await;
    }

    async fn guild_member_addition(&self, _ctx: Context, member: Member) {
        let Some(guild) = self.accepts(Some(member.guild_id)) else {
            return;
        };
        let user = UserId(member.user.id.get());
        if let Err(e) = self.service.on_member_join(guild, user).await {
            warn!(user_id = %user, error = %e, "join rules failed");
        }
    }

    async fn guild_member_update(
        &self,
        _ctx: Context,
        old_if_available: Option<Member>,
        _new: Option<Member>,
        event: GuildMemberUpdateEvent,
    ) {
        let Some(guild) = self.accepts(Some(event.guild_id)) else {
            return;
        };
        let user = UserId(event.user.id.get());
        let Some(old) = old_if_available else {
            debug!(user_id = %user, "no cached member, role diff skipped");
            return;
        };
        for (role, direction) in role_diff(&roles(&old.roles), &roles(&event.roles)) {
            if let Err(e) = self
                .service
                .on_role_changed(guild, user, role, direction)
                .await
            {
                warn!(user_id = %user, role_id = %role, %direction, error = %e, "role cascade failed");
            }
        }
    }

    async fn message(&self, _ctx: Context, message: Message) {
        let author = UserId(message.author.id.get());
        self.activity(message.guild_id, message.channel_id, Some(author))
            .await;
    }

    async fn message_update(
        &self,
        _ctx: Context,
        _old_if_available: Option<Message>,
        _new: Option<Message>,
        event: MessageUpdateEvent,
    ) {
        let author = event.author.as_ref().map(|a| UserId(a.id.get()));
        self.activity(event.guild_id, event.channel_id, author).await;
    }

    async fn message_delete(
        &self,
        _ctx: Context,
        channel_id: discord::ChannelId,
        _deleted_message_id: discord::MessageId,
        guild_id: Option<discord::GuildId>,
    ) {
        self.activity(guild_id, channel_id, None).await;
    }
}
