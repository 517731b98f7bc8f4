// Discord gateway adapter over serenity's HTTP client and cache

use std::sync::Arc;

use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use tracing::debug;

use super::{Gateway, PlatformError, RoleInfo};

const AUDIT_LOG_REASON: &str = "Reaction role";

pub struct SerenityGateway {
    http: Arc<serenity::Http>,
    cache: Arc<serenity::Cache>,
    bot_id: serenity::UserId,
}

impl SerenityGateway {
    pub fn new(http: Arc<serenity::Http>, cache: Arc<serenity::Cache>, bot_id: serenity::UserId) -> Self {
        Self { http, cache, bot_id }
    }

    pub fn from_context(ctx: &serenity::Context, bot_id: serenity::UserId) -> Self {
        Self::new(ctx.http.clone(), ctx.cache.clone(), bot_id)
    }
}

impl From<&serenity::Role> for RoleInfo {
    fn from(role: &serenity::Role) -> Self {
        Self {
            id: role.id,
            name: role.name.clone(),
            position: role.position,
        }
    }
}

#[async_trait]
impl Gateway for SerenityGateway {
    fn current_user_id(&self) -> serenity::UserId {
        self.bot_id
    }

    async fn ensure_message(
        &self,
        channel_id: serenity::ChannelId,
        message_id: serenity::MessageId,
    ) -> Result<(), PlatformError> {
        let cached = self.cache.message(channel_id, message_id).is_some();
        if cached {
            return Ok(());
        }
        debug!("Fetching message {} in {}", message_id, channel_id);
        self.http.get_message(channel_id, message_id).await?;
        Ok(())
    }

    async fn guild_roles(&self, guild_id: serenity::GuildId) -> Result<Vec<RoleInfo>, PlatformError> {
        let cached: Option<Vec<RoleInfo>> = self
            .cache
            .guild(guild_id)
            .map(|guild| guild.roles.values().map(RoleInfo::from).collect());
        if let Some(roles) = cached {
            return Ok(roles);
        }

        let roles = self.http.get_guild_roles(guild_id).await?;
        Ok(roles.iter().map(RoleInfo::from).collect())
    }

    async fn member_roles(
        &self,
        guild_id: serenity::GuildId,
        user_id: serenity::UserId,
    ) -> Result<Vec<serenity::RoleId>, PlatformError> {
        let cached: Option<Vec<serenity::RoleId>> = self
            .cache
            .guild(guild_id)
            .and_then(|guild| guild.members.get(&user_id).map(|member| member.roles.clone()));
        if let Some(roles) = cached {
            return Ok(roles);
        }

        let member = self.http.get_member(guild_id, user_id).await?;
        Ok(member.roles)
    }

    async fn add_member_role(
        &self,
        guild_id: serenity::GuildId,
        user_id: serenity::UserId,
        role_id: serenity::RoleId,
    ) -> Result<(), PlatformError> {
        self.http
            .add_member_role(guild_id, user_id, role_id, Some(AUDIT_LOG_REASON))
            .await?;
        Ok(())
    }

    async fn remove_member_role(
        &self,
        guild_id: serenity::GuildId,
        user_id: serenity::UserId,
        role_id: serenity::RoleId,
    ) -> Result<(), PlatformError> {
        self.http
            .remove_member_role(guild_id, user_id, role_id, Some(AUDIT_LOG_REASON))
            .await?;
        Ok(())
    }

    async fn send_message(
        &self,
        channel_id: serenity::ChannelId,
        content: &str,
    ) -> Result<serenity::MessageId, PlatformError> {
        let message = channel_id.say(&self.http, content).await?;
        Ok(message.id)
    }

    async fn delete_message(
        &self,
        channel_id: serenity::ChannelId,
        message_id: serenity::MessageId,
    ) -> Result<(), PlatformError> {
        channel_id.delete_message(&self.http, message_id).await?;
        Ok(())
    }
}
