//! Collaborator contracts for the external chat platform.
//!
//! The host process owns the actual platform client; cogs only ever see
//! these traits. Implementations must be `Send + Sync` so they can be
//! shared across cog tasks behind an `Arc`.

use async_trait::async_trait;
use thiserror::Error;

use crate::embed::Embed;
use crate::events::Emoji;
use crate::ids::{ChannelId, GuildId, MessageId, RoleId, UserId};

/// Errors surfaced by the platform client.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The addressed guild, member, channel or message no longer resolves.
    #[error("not found: {0}")]
    NotFound(String),

    /// The bot lacks the permission required for the call.
    #[error("permission denied: {0}")]
    Forbidden(String),

    /// A transient transport or platform failure.
    #[error("platform call failed: {0}")]
    Http(String),
}

/// Membership accessor and mutator for guild roles.
#[async_trait]
pub trait Members: Send + Sync {
    /// The implicit role every member of `guild` holds. It must never be
    /// explicitly included in a role-replacement call.
    fn everyone_role(&self, guild: GuildId) -> RoleId;

    /// Current role ids of a member, `Err(NotFound)` when the member or
    /// guild is unavailable.
    async fn member_roles(&self, guild: GuildId, user: UserId)
        -> Result<Vec<RoleId>, PlatformError>;

    /// Replace the member's role set in a single call.
    async fn replace_member_roles(
        &self,
        guild: GuildId,
        user: UserId,
        roles: &[RoleId],
    ) -> Result<(), PlatformError>;

    /// Grant one role without touching the rest of the set.
    async fn add_member_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), PlatformError>;

    /// Revoke one role without touching the rest of the set.
    async fn remove_member_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), PlatformError>;
}

/// Message and reaction delivery.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// The bot's own user id, used to ignore self-generated events.
    fn bot_user(&self) -> UserId;

    async fn send_message(&self, channel: ChannelId, text: &str)
        -> Result<MessageId, PlatformError>;

    async fn send_embed(&self, channel: ChannelId, embed: &Embed)
        -> Result<MessageId, PlatformError>;

    /// Direct-message an embed to a user.
    async fn send_user_embed(&self, user: UserId, embed: &Embed) -> Result<(), PlatformError>;

    async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        text: &str,
    ) -> Result<(), PlatformError>;

    async fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), PlatformError>;

    /// Upload raw bytes as a file attachment, with optional leading text.
    async fn send_file(
        &self,
        channel: ChannelId,
        filename: &str,
        bytes: Vec<u8>,
        text: &str,
    ) -> Result<MessageId, PlatformError>;

    async fn add_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: &Emoji,
    ) -> Result<(), PlatformError>;

    async fn remove_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: &Emoji,
        user: UserId,
    ) -> Result<(), PlatformError>;

    /// Whether the message still exists and is visible to the bot.
    async fn message_exists(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<bool, PlatformError>;

    /// Users who currently hold the given reaction on a message.
    async fn reaction_users(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: &Emoji,
    ) -> Result<Vec<UserId>, PlatformError>;
}

/// Everything a cog may ask of the platform.
pub trait ChatHost: Members + Messenger {}

impl<T: Members + Messenger> ChatHost for T {}
