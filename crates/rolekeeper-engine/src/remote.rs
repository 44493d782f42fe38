// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Latency-bounded access to the chat platform.
//!
//! Every call goes through [`tokio::time::timeout`]. An elapsed deadline
//! surfaces as [`RolekeeperError::Timeout`] and is handled like any other
//! remote failure.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rolekeeper_core::RolekeeperError;
use rolekeeper_core::ids::{ChannelId, GuildId, MessageId, RoleId, UserId};
use rolekeeper_core::traits::PlatformAdapter;
use rolekeeper_core::types::{ChannelKind, MemberSnapshot, PlatformMessage};

/// A platform adapter with a per-call deadline.
#[derive(Clone)]
pub struct Remote {
    platform: Arc<dyn PlatformAdapter>,
    timeout: Duration,
}

impl Remote {
    pub fn new(platform: Arc<dyn PlatformAdapter>, timeout: Duration) -> Self {
        Self { platform, timeout }
    }

    pub fn bot_user_id(&self) -> UserId {
        self.platform.bot_user_id()
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, RolekeeperError>>,
    ) -> Result<T, RolekeeperError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RolekeeperError::Timeout {
                duration: self.timeout,
            }),
        }
    }

    pub async fn get_member(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> Result<Option<MemberSnapshot>, RolekeeperError> {
        self.bounded(self.platform.get_member(guild, user)).await
    }

    pub async fn list_members(&self, guild: GuildId) -> Result<Vec<MemberSnapshot>, RolekeeperError> {
        self.bounded(self.platform.list_members(guild)).await
    }

    pub async fn role_exists(&self, guild: GuildId, role: RoleId) -> Result<bool, RolekeeperError> {
        self.bounded(self.platform.role_exists(guild, role)).await
    }

    pub async fn add_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), RolekeeperError> {
        self.bounded(self.platform.add_role(guild, user, role)).await
    }

    pub async fn remove_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), RolekeeperError> {
        self.bounded(self.platform.remove_role(guild, user, role)).await
    }

    pub async fn channel_kind(
        &self,
        channel: ChannelId,
    ) -> Result<Option<ChannelKind>, RolekeeperError> {
        self.bounded(self.platform.channel_kind(channel)).await
    }

    pub async fn get_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<Option<PlatformMessage>, RolekeeperError> {
        self.bounded(self.platform.get_message(channel, message)).await
    }

    pub async fn messages_after(
        &self,
        channel: ChannelId,
        after: MessageId,
    ) -> Result<Vec<PlatformMessage>, RolekeeperError> {
        self.bounded(self.platform.messages_after(channel, after)).await
    }

    pub async fn send_message(
        &self,
        channel: ChannelId,
        content: &str,
    ) -> Result<MessageId, RolekeeperError> {
        self.bounded(self.platform.send_message(channel, content)).await
    }

    pub async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: &str,
    ) -> Result<(), RolekeeperError> {
        self.bounded(self.platform.edit_message(channel, message, content))
            .await
    }

    pub async fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), RolekeeperError> {
        self.bounded(self.platform.delete_message(channel, message)).await
    }

    pub async fn add_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: &str,
    ) -> Result<(), RolekeeperError> {
        self.bounded(self.platform.add_reaction(channel, message, emoji))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolekeeper_test_utils::MockPlatform;

    #[tokio::test]
    async fn slow_calls_time_out() {
        let platform = Arc::new(MockPlatform::default());
        platform.set_delay(Some(Duration::from_millis(200))).await;
        let remote = Remote::new(platform, Duration::from_millis(20));

        let err = remote.get_member(GuildId(1), UserId(2)).await.unwrap_err();
        assert!(matches!(err, RolekeeperError::Timeout { .. }));
    }

    #[tokio::test]
    async fn fast_calls_pass_through() {
        let platform = Arc::new(MockPlatform::default());
        platform.add_member(GuildId(1), UserId(2), &[RoleId(3)], false).await;
        let remote = Remote::new(platform, Duration::from_secs(1));

        let member = remote.get_member(GuildId(1), UserId(2)).await.unwrap();
        assert!(member.is_some_and(|m| m.has_role(RoleId(3))));
    }
}
