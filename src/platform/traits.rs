// src/platform/traits.rs
// The outbound half of the chat platform: everything the bot can ask it to do.

use async_trait::async_trait;

use super::types::{ChannelId, Message, MessageId, User, UserId};
use crate::error::PlatformError;

/// Implement for any chat backend the bot should run on
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// The bot's own account id
    fn bot_user_id(&self) -> UserId;

    /// Reply to `original`. With `mention_author` off the author isn't pinged.
    async fn send_reply(
        &self,
        original: &Message,
        text: &str,
        mention_author: bool,
    ) -> Result<Message, PlatformError>;

    /// Hide the link previews of a message
    async fn suppress_embeds(&self, message: &Message) -> Result<(), PlatformError>;

    async fn add_reaction(&self, message: &Message, emoji: &str) -> Result<(), PlatformError>;

    async fn delete_message(&self, message: &Message) -> Result<(), PlatformError>;

    async fn send_direct_message(&self, user: UserId, text: &str) -> Result<(), PlatformError>;

    async fn fetch_message(
        &self,
        channel: ChannelId,
        id: MessageId,
    ) -> Result<Message, PlatformError>;

    async fn fetch_user(&self, id: UserId) -> Result<User, PlatformError>;

    /// Set the "playing ..." status line
    async fn set_presence(&self, status: &str) -> Result<(), PlatformError>;
}
