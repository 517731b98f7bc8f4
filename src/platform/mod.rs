// Platform seam
// Everything the bot asks of a chat platform goes through these traits

pub mod discord;

use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("discord request failed: {0}")]
    Discord(#[from] serenity::Error),
    #[error("{0} not found")]
    NotFound(String),
}

/// Minimal view of a guild role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleInfo {
    pub id: serenity::RoleId,
    pub name: String,
    /// Hierarchy position, higher is more senior
    pub position: u16,
}

/// Operations the reaction-role engine needs from the gateway
#[async_trait]
pub trait Gateway: Send + Sync {
    /// The bot's own user
    fn current_user_id(&self) -> serenity::UserId;

    /// Make sure the message is known locally, fetching it if needed
    async fn ensure_message(
        &self,
        channel_id: serenity::ChannelId,
        message_id: serenity::MessageId,
    ) -> Result<(), PlatformError>;

    /// Live role list of a guild
    async fn guild_roles(&self, guild_id: serenity::GuildId) -> Result<Vec<RoleInfo>, PlatformError>;

    /// Role IDs currently held by a member
    async fn member_roles(
        &self,
        guild_id: serenity::GuildId,
        user_id: serenity::UserId,
    ) -> Result<Vec<serenity::RoleId>, PlatformError>;

    async fn add_member_role(
        &self,
        guild_id: serenity::GuildId,
        user_id: serenity::UserId,
        role_id: serenity::RoleId,
    ) -> Result<(), PlatformError>;

    async fn remove_member_role(
        &self,
        guild_id: serenity::GuildId,
        user_id: serenity::UserId,
        role_id: serenity::RoleId,
    ) -> Result<(), PlatformError>;

    async fn send_message(
        &self,
        channel_id: serenity::ChannelId,
        content: &str,
    ) -> Result<serenity::MessageId, PlatformError>;

    async fn delete_message(
        &self,
        channel_id: serenity::ChannelId,
        message_id: serenity::MessageId,
    ) -> Result<(), PlatformError>;
}

/// A secondary chat connection (e.g. Twitch) started and stopped alongside Discord
#[async_trait]
pub trait ChatClient: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> Result<(), PlatformError>;

    async fn stop(&self);
}
