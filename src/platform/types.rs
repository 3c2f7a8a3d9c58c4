// src/platform/types.rs
// =============================================================================
// Data the chat platform hands us: ids, users, servers, messages, reactions.
//
// Ids are u64 snowflakes wrapped in newtypes so a user id can't be passed
// where a message id is expected. Their Display output is the bare number,
// which is also the key format used in the stats file.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Base for links that jump straight to a message
const JUMP_BASE: &str = "https://discord.com/";

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            #[cfg(test)]
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

snowflake!(
    /// A user or bot account
    UserId
);
snowflake!(
    /// A server (guild)
    ServerId
);
snowflake!(ChannelId);
snowflake!(MessageId);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    /// Account name (@name)
    pub name: String,
    /// Name shown in the server, falls back to `name`
    pub display_name: String,
    /// Bot or service account
    pub bot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub id: ServerId,
    pub name: String,
}

/// Points from a reply to the message it answers.
///
/// `resolved` is filled in when the platform already had the referenced
/// message at hand. It may be missing even though the message exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageReference {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    pub resolved: Option<Box<Message>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    /// None for direct messages
    pub server: Option<Server>,
    pub author: User,
    pub content: String,
    pub reference: Option<MessageReference>,
}

impl Message {
    pub fn is_reply(&self) -> bool {
        self.reference.is_some()
    }

    /// The referenced message, when the platform resolved it
    pub fn resolved_reference(&self) -> Option<&Message> {
        self.reference
            .as_ref()
            .and_then(|reference| reference.resolved.as_deref())
    }

    /// Link that opens this message in the client
    pub fn jump_url(&self) -> Result<Url, url::ParseError> {
        let server = self
            .server
            .as_ref()
            .map(|server| server.id.to_string())
            .unwrap_or_else(|| "@me".to_string());

        Url::parse(JUMP_BASE)?.join(&format!(
            "channels/{}/{}/{}",
            server, self.channel_id, self.id
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionAdd {
    /// The message that received the reaction
    pub message: Message,
    pub emoji: String,
    /// Who reacted
    pub user: User,
}

/// An owner command flipping the runtime switches. None leaves a switch as is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToggleCommand {
    pub fixing_enabled: Option<bool>,
    pub status_count: Option<bool>,
}

/// A user turning their reply notifications on or off. None flips the
/// current setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationsCommand {
    pub user: User,
    pub enabled: Option<bool>,
}

/// Inbound events delivered by the platform
#[derive(Debug, Clone)]
pub enum Event {
    Message(Message),
    ReactionAdded(ReactionAdd),
    Notifications(NotificationsCommand),
    Toggle(ToggleCommand),
}
