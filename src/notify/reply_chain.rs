// src/notify/reply_chain.rs
// =============================================================================
// Tells people when someone replies to a link the bot fixed for them.
//
// The reply chain looks like this:
//
//   original message (target user posts a twitter link)
//     └─ bot's fix message (fxtwitter link, a reply to the original)
//          └─ incoming message (someone replies to the fix)
//
// Walking it:
// 1. Ignore bot authors
// 2. The incoming message must be a reply with a resolved target
// 3. That target must be the bot's own message...
// 4. ...which is itself a reply...
// 5. ...containing a fixed link
// 6. Fetch the original message; its author is the one to notify
// 7. Skip opted-out users and people replying to their own link
// 8. Send the direct message
//
// Any lookup or send that fails just ends the walk. No retries.
//
// The same struct handles the notifications command, since the opt-out set
// it changes is the one step 7 reads.
// =============================================================================

use std::sync::Arc;
use tracing::debug;

use crate::handlers::registry;
use crate::platform::{ChatPlatform, Message, NotificationsCommand, User};
use crate::stats::StatsStore;

/// Reply to the notifications command, given the user's new opt-out state
pub fn opt_out_confirmation(opted_out: bool) -> &'static str {
    if opted_out {
        "You will no longer receive reply notifications."
    } else {
        "You will now receive reply notifications."
    }
}

pub struct ReplyNotifier {
    platform: Arc<dyn ChatPlatform>,
    store: Arc<StatsStore>,
    /// Command name quoted in the opt-out instructions
    opt_out_command: String,
}

impl ReplyNotifier {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        store: Arc<StatsStore>,
        opt_out_command: impl Into<String>,
    ) -> Self {
        ReplyNotifier {
            platform,
            store,
            opt_out_command: opt_out_command.into(),
        }
    }

    /// Works out who, if anyone, should hear about `message`
    pub async fn target(&self, message: &Message) -> Option<User> {
        if message.author.bot || !message.is_reply() {
            return None;
        }

        let replied = message.resolved_reference()?;
        if replied.author.id != self.platform.bot_user_id() {
            return None;
        }

        let original_ref = replied.reference.as_ref()?;

        let is_fix = registry()
            .iter()
            .any(|handler| replied.content.contains(handler.canonical_domain()));
        if !is_fix {
            debug!(message_id = %replied.id, "bot reply holds no fixed link");
            return None;
        }

        // The resolved copy is often missing here, so fetch the original
        let original = match self
            .platform
            .fetch_message(original_ref.channel_id, original_ref.message_id)
            .await
        {
            Ok(original) => original,
            Err(e) => {
                debug!("could not resolve original link message: {}", e);
                return None;
            }
        };

        let target = match self.platform.fetch_user(original.author.id).await {
            Ok(user) => user,
            Err(e) => {
                debug!("could not resolve link author: {}", e);
                return None;
            }
        };

        if target.id == message.author.id {
            return None;
        }
        if self.store.is_ignored(&target.id.to_string()).await {
            debug!(user_id = %target.id, "user opted out of reply notifications");
            return None;
        }

        Some(target)
    }

    /// Sends the notification if the reply chain calls for one.
    /// Returns true when a direct message went out.
    pub async fn notify(&self, message: &Message) -> bool {
        let Some(target) = self.target(message).await else {
            return false;
        };

        let text = self.notification_text(message);
        match self.platform.send_direct_message(target.id, &text).await {
            Ok(()) => {
                debug!(user_id = %target.id, "sent reply notification");
                true
            }
            Err(e) => {
                debug!(user_id = %target.id, "reply notification not delivered: {}", e);
                false
            }
        }
    }

    /// Applies a user's notifications command and confirms it by direct
    /// message. Returns true when the user ends up opted out.
    pub async fn set_preference(&self, command: &NotificationsCommand) -> bool {
        let user_id = command.user.id.to_string();
        let opted_out = match command.enabled {
            Some(enabled) => {
                self.store.set_ignored(&user_id, !enabled).await;
                !enabled
            }
            None => self.store.toggle_ignored(&user_id).await,
        };
        debug!(user_id = %command.user.id, opted_out, "notification preference changed");

        let text = opt_out_confirmation(opted_out);
        if let Err(e) = self.platform.send_direct_message(command.user.id, text).await {
            debug!(user_id = %command.user.id, "confirmation not delivered: {}", e);
        }
        opted_out
    }

    fn notification_text(&self, message: &Message) -> String {
        let server_name = message
            .server
            .as_ref()
            .map(|server| server.name.as_str())
            .unwrap_or("a direct message");
        let link = message
            .jump_url()
            .map(|url| url.to_string())
            .unwrap_or_default();

        format!(
            "{} replied to your link in {}: {}\nIf you want to disable these reminders, use the command {}.",
            message.author.display_name, server_name, link, self.opt_out_command
        )
    }
}
