// src/platform/console.rs
// =============================================================================
// A chat platform that lives entirely in memory.
//
// Inbound events arrive as JSON lines (see ConsoleEvent), for example:
//
//   {"type":"message","id":10,"channel_id":2,"server_id":3,"server_name":"Lounge",
//    "author":{"id":7,"name":"alice"},"content":"https://x.com/a/status/1"}
//   {"type":"reaction","message_id":1099511627776,"emoji":"❌","user":{"id":7,"name":"alice"}}
//   {"type":"notifications","user":{"id":7,"name":"alice"}}
//   {"type":"toggle","fixing_enabled":false}
//
// Everything the bot does in return becomes an Action. With echo on (this is
// how `link-fixer serve` runs) each one is printed as a JSON line and
// dropped; with echo off they are kept so tests can check what the bot did.
// Only the last DEFAULT_MAX_MESSAGES messages are remembered.
// =============================================================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;
use tracing::debug;

use super::traits::ChatPlatform;
use super::types::{
    ChannelId, Event, Message, MessageId, MessageReference, NotificationsCommand, ReactionAdd,
    Server, ServerId, ToggleCommand, User, UserId,
};
use crate::error::PlatformError;

/// Account id the console bot runs under
pub const CONSOLE_BOT_ID: u64 = 1;

/// Ids handed to messages the bot sends, far away from typical input ids
const FIRST_SENT_ID: u64 = 1 << 40;

/// How many messages are kept for replies and reactions to resolve against
pub const DEFAULT_MAX_MESSAGES: usize = 1000;

/// One line of console input
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsoleEvent {
    Message {
        id: u64,
        channel_id: u64,
        #[serde(default)]
        server_id: Option<u64>,
        #[serde(default)]
        server_name: Option<String>,
        author: ConsoleUser,
        content: String,
        /// Id of the message this one replies to
        #[serde(default)]
        reply_to: Option<u64>,
    },
    Reaction {
        message_id: u64,
        emoji: String,
        user: ConsoleUser,
    },
    /// A user's notifications command. Without `enabled` it flips the
    /// current setting.
    Notifications {
        user: ConsoleUser,
        #[serde(default)]
        enabled: Option<bool>,
    },
    /// Owner switches, e.g. {"type":"toggle","fixing_enabled":false}
    Toggle {
        #[serde(default)]
        fixing_enabled: Option<bool>,
        #[serde(default)]
        status_count: Option<bool>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleUser {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl From<ConsoleUser> for User {
    fn from(user: ConsoleUser) -> Self {
        User {
            id: UserId::new(user.id),
            display_name: user.display_name.unwrap_or_else(|| user.name.clone()),
            name: user.name,
            bot: user.bot,
        }
    }
}

/// Something the bot asked the platform to do
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Reply {
        to: MessageId,
        message_id: MessageId,
        text: String,
        mention_author: bool,
    },
    SuppressEmbeds {
        message_id: MessageId,
    },
    React {
        message_id: MessageId,
        emoji: String,
    },
    Delete {
        message_id: MessageId,
    },
    DirectMessage {
        user_id: UserId,
        text: String,
    },
    Presence {
        status: String,
    },
}

/// Calls the console platform refuses, to exercise the fallback paths
#[derive(Debug, Clone, Copy, Default)]
pub struct Permissions {
    pub deny_suppress: bool,
    pub deny_reply: bool,
    pub deny_direct_messages: bool,
}

#[derive(Default)]
struct ConsoleState {
    messages: HashMap<MessageId, Message>,
    // Insertion order of `messages`, oldest first
    order: VecDeque<MessageId>,
    users: HashMap<UserId, User>,
    next_id: u64,
    actions: Vec<Action>,
}

impl ConsoleState {
    fn remember(&mut self, message: Message, limit: usize) {
        let id = message.id;
        if self.messages.insert(id, message).is_none() {
            self.order.push_back(id);
        }
        while self.order.len() > limit {
            if let Some(oldest) = self.order.pop_front() {
                self.messages.remove(&oldest);
            }
        }
    }

    fn forget(&mut self, id: MessageId) -> bool {
        self.order.retain(|kept| *kept != id);
        self.messages.remove(&id).is_some()
    }
}

pub struct ConsolePlatform {
    bot: User,
    permissions: Permissions,
    echo: bool,
    max_messages: usize,
    state: Mutex<ConsoleState>,
}

impl ConsolePlatform {
    pub fn new() -> Self {
        Self::with_permissions(Permissions::default())
    }

    pub fn with_permissions(permissions: Permissions) -> Self {
        let bot = User {
            id: UserId::new(CONSOLE_BOT_ID),
            name: "link-fixer".to_string(),
            display_name: "link-fixer".to_string(),
            bot: true,
        };

        let mut state = ConsoleState {
            next_id: FIRST_SENT_ID,
            ..ConsoleState::default()
        };
        state.users.insert(bot.id, bot.clone());

        ConsolePlatform {
            bot,
            permissions,
            echo: false,
            max_messages: DEFAULT_MAX_MESSAGES,
            state: Mutex::new(state),
        }
    }

    /// Print every action to stdout as a JSON line instead of keeping it
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Cap on remembered messages. Past it the oldest ones stop resolving.
    pub fn message_limit(mut self, limit: usize) -> Self {
        self.max_messages = limit.max(1);
        self
    }

    /// Turns one line of console input into a platform event, keeping the
    /// message around so later replies and reactions can resolve it.
    pub async fn ingest(&self, event: ConsoleEvent) -> Result<Event, PlatformError> {
        let mut state = self.state.lock().await;

        match event {
            ConsoleEvent::Message {
                id,
                channel_id,
                server_id,
                server_name,
                author,
                content,
                reply_to,
            } => {
                let author = User::from(author);
                state.users.insert(author.id, author.clone());

                let channel_id = ChannelId::new(channel_id);
                let reference = reply_to.map(|reply_id| {
                    let message_id = MessageId::new(reply_id);
                    MessageReference {
                        message_id,
                        channel_id,
                        resolved: state.messages.get(&message_id).map(shallow),
                    }
                });

                let message = Message {
                    id: MessageId::new(id),
                    channel_id,
                    server: server_id.map(|server_id| Server {
                        id: ServerId::new(server_id),
                        name: server_name.unwrap_or_else(|| "Unknown Server".to_string()),
                    }),
                    author,
                    content,
                    reference,
                };
                state.remember(message.clone(), self.max_messages);

                Ok(Event::Message(message))
            }
            ConsoleEvent::Reaction {
                message_id,
                emoji,
                user,
            } => {
                let message = state
                    .messages
                    .get(&MessageId::new(message_id))
                    .cloned()
                    .ok_or_else(|| PlatformError::NotFound(format!("message {message_id}")))?;

                let user = User::from(user);
                state.users.insert(user.id, user.clone());

                Ok(Event::ReactionAdded(ReactionAdd {
                    message,
                    emoji,
                    user,
                }))
            }
            ConsoleEvent::Notifications { user, enabled } => {
                let user = User::from(user);
                state.users.insert(user.id, user.clone());

                Ok(Event::Notifications(NotificationsCommand { user, enabled }))
            }
            ConsoleEvent::Toggle {
                fixing_enabled,
                status_count,
            } => Ok(Event::Toggle(ToggleCommand {
                fixing_enabled,
                status_count,
            })),
        }
    }

    /// Everything the bot has done so far, oldest first
    #[cfg(test)]
    pub async fn actions(&self) -> Vec<Action> {
        self.state.lock().await.actions.clone()
    }

    // Echoed actions are printed and dropped, the rest are kept for actions()
    fn push_action(&self, state: &mut ConsoleState, action: Action) {
        if !self.echo {
            state.actions.push(action);
            return;
        }
        match serde_json::to_string(&action) {
            Ok(line) => println!("{line}"),
            Err(e) => debug!("could not encode action: {}", e),
        }
    }
}

impl Default for ConsolePlatform {
    fn default() -> Self {
        Self::new()
    }
}

// A resolved reference carries the message but not its own resolved chain
fn shallow(message: &Message) -> Box<Message> {
    let mut copy = message.clone();
    if let Some(reference) = copy.reference.as_mut() {
        reference.resolved = None;
    }
    Box::new(copy)
}

#[async_trait]
impl ChatPlatform for ConsolePlatform {
    fn bot_user_id(&self) -> UserId {
        self.bot.id
    }

    async fn send_reply(
        &self,
        original: &Message,
        text: &str,
        mention_author: bool,
    ) -> Result<Message, PlatformError> {
        if self.permissions.deny_reply {
            return Err(PlatformError::Forbidden("send messages".to_string()));
        }

        let mut state = self.state.lock().await;
        let id = MessageId::new(state.next_id);
        state.next_id += 1;

        let sent = Message {
            id,
            channel_id: original.channel_id,
            server: original.server.clone(),
            author: self.bot.clone(),
            content: text.to_string(),
            reference: Some(MessageReference {
                message_id: original.id,
                channel_id: original.channel_id,
                resolved: Some(shallow(original)),
            }),
        };
        state.remember(sent.clone(), self.max_messages);

        self.push_action(
            &mut state,
            Action::Reply {
                to: original.id,
                message_id: id,
                text: text.to_string(),
                mention_author,
            },
        );
        Ok(sent)
    }

    async fn suppress_embeds(&self, message: &Message) -> Result<(), PlatformError> {
        if self.permissions.deny_suppress {
            return Err(PlatformError::Forbidden("manage messages".to_string()));
        }

        let mut state = self.state.lock().await;
        self.push_action(
            &mut state,
            Action::SuppressEmbeds {
                message_id: message.id,
            },
        );
        Ok(())
    }

    async fn add_reaction(&self, message: &Message, emoji: &str) -> Result<(), PlatformError> {
        if emoji.is_empty() {
            return Err(PlatformError::Other("empty reaction emoji".to_string()));
        }
        let mut state = self.state.lock().await;
        self.push_action(
            &mut state,
            Action::React {
                message_id: message.id,
                emoji: emoji.to_string(),
            },
        );
        Ok(())
    }

    async fn delete_message(&self, message: &Message) -> Result<(), PlatformError> {
        let mut state = self.state.lock().await;
        if !state.forget(message.id) {
            return Err(PlatformError::NotFound(format!("message {}", message.id)));
        }
        self.push_action(
            &mut state,
            Action::Delete {
                message_id: message.id,
            },
        );
        Ok(())
    }

    async fn send_direct_message(&self, user: UserId, text: &str) -> Result<(), PlatformError> {
        if self.permissions.deny_direct_messages {
            return Err(PlatformError::Forbidden(format!("direct message {user}")));
        }

        let mut state = self.state.lock().await;
        self.push_action(
            &mut state,
            Action::DirectMessage {
                user_id: user,
                text: text.to_string(),
            },
        );
        Ok(())
    }

    async fn fetch_message(
        &self,
        channel: ChannelId,
        id: MessageId,
    ) -> Result<Message, PlatformError> {
        let state = self.state.lock().await;
        state
            .messages
            .get(&id)
            .filter(|message| message.channel_id == channel)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("message {id} in channel {channel}")))
    }

    async fn fetch_user(&self, id: UserId) -> Result<User, PlatformError> {
        let state = self.state.lock().await;
        state
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("user {id}")))
    }

    async fn set_presence(&self, status: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock().await;
        self.push_action(
            &mut state,
            Action::Presence {
                status: status.to_string(),
            },
        );
        Ok(())
    }
}
