// src/bot/events.rs
// =============================================================================
// Handlers for inbound platform events.
//
// New message:
// - the reply notifier and the link fixer run side by side
// - the fixer suppresses the original preview (or warns when it can't),
//   posts the fixed links as a reply, adds the delete reaction and only
//   then records the stats
//
// New reaction:
// - the delete emoji on one of the bot's replies removes that reply, but
//   only when it comes from the person who posted the original link
// =============================================================================

use tracing::{debug, info, warn};

use super::LinkFixBot;
use crate::platform::{Message, ReactionAdd, UserId};
use crate::rewrite::{compose_reply, fix_all, with_preview_warning};

/// What the bot did with one message
#[derive(Debug, Default)]
pub struct MessageOutcome {
    /// A reply notification went out
    pub notified: bool,
    /// The bot's reply with the fixed links
    pub reply: Option<Message>,
}

impl LinkFixBot {
    pub async fn on_message(&self, message: &Message) -> MessageOutcome {
        if message.author.bot || !self.store.toggles().await.fixing_enabled {
            return MessageOutcome::default();
        }

        let (notified, reply) =
            futures::join!(self.notifier.notify(message), self.fix_links(message));

        MessageOutcome { notified, reply }
    }

    /// Posts fixed versions of any links in `message`. Returns the bot's
    /// reply, or None when nothing was posted.
    async fn fix_links(&self, message: &Message) -> Option<Message> {
        // Stats are kept per server, so direct messages are left alone
        let server = message.server.as_ref()?;

        let results = fix_all(&message.content);
        let reply = compose_reply(&results)?;

        tokio::time::sleep(self.settings.suppress_delay).await;
        let reply = match self.platform.suppress_embeds(message).await {
            Ok(()) => reply,
            Err(e) if e.is_forbidden() => {
                warn!(server_id = %server.id, "cannot suppress embeds: {}", e);
                with_preview_warning(&reply)
            }
            Err(e) => {
                debug!(message_id = %message.id, "suppressing embeds failed: {}", e);
                reply
            }
        };

        let sent = match self.platform.send_reply(message, &reply, false).await {
            Ok(sent) => sent,
            Err(e) => {
                debug!(message_id = %message.id, "could not post fixed links: {}", e);
                return None;
            }
        };

        if let Err(e) = self
            .platform
            .add_reaction(&sent, &self.settings.delete_emoji)
            .await
        {
            debug!(message_id = %sent.id, "could not add delete reaction: {}", e);
        }

        let server_id = server.id.to_string();
        let user_id = message.author.id.to_string();
        let mut fixed = 0;
        for result in &results {
            self.store
                .record(&server_id, &user_id, result.count(), result.handler.name())
                .await;
            fixed += result.count();
        }

        info!(server_id = %server.id, user_id = %message.author.id, fixed, "fixed links");
        Some(sent)
    }

    /// Deletes the bot's reply when the original poster reacts with the
    /// delete emoji. Returns true when the reply was removed.
    pub async fn on_reaction_added(&self, reaction: &ReactionAdd) -> bool {
        if reaction.user.bot || reaction.emoji != self.settings.delete_emoji {
            return false;
        }

        let fix = &reaction.message;
        if fix.author.id != self.platform.bot_user_id() {
            return false;
        }

        match self.link_author(fix).await {
            Some(author) if author == reaction.user.id => {}
            _ => return false,
        }

        if let Err(e) = self.platform.delete_message(fix).await {
            debug!(message_id = %fix.id, "could not delete fixed links: {}", e);
            return false;
        }

        let server_name = fix
            .server
            .as_ref()
            .map(|server| server.name.as_str())
            .unwrap_or("a direct message");
        let text = format!("You deleted a link I fixed in {server_name}.");
        if let Err(e) = self
            .platform
            .send_direct_message(reaction.user.id, &text)
            .await
        {
            debug!(user_id = %reaction.user.id, "could not confirm deletion: {}", e);
        }

        true
    }

    // Author of the message the bot's reply points at
    async fn link_author(&self, fix: &Message) -> Option<UserId> {
        if let Some(original) = fix.resolved_reference() {
            return Some(original.author.id);
        }

        let reference = fix.reference.as_ref()?;
        self.platform
            .fetch_message(reference.channel_id, reference.message_id)
            .await
            .ok()
            .map(|original| original.author.id)
    }
}

#[cfg(test)]
mod tests {
    use super::super::BotSettings;
    use super::*;
    use crate::platform::{
        Action, ChatPlatform, ConsoleEvent, ConsolePlatform, ConsoleUser, Event, Permissions,
        ToggleCommand,
    };
    use crate::rewrite::PREVIEW_WARNING;
    use crate::stats::StatsStore;
    use std::sync::Arc;
    use std::time::Duration;

    const ALICE: u64 = 7;
    const BOB: u64 = 8;

    struct Harness {
        platform: Arc<ConsolePlatform>,
        store: Arc<StatsStore>,
        bot: LinkFixBot,
    }

    fn harness(permissions: Permissions) -> Harness {
        let platform = Arc::new(ConsolePlatform::with_permissions(permissions));
        let store = Arc::new(StatsStore::new("unused.json"));
        let settings = BotSettings {
            status: "fixing links".to_string(),
            suppress_delay: Duration::ZERO,
            delete_emoji: "❌".to_string(),
            notification_command: "/notifications".to_string(),
        };
        let bot = LinkFixBot::new(platform.clone(), store.clone(), settings);
        Harness {
            platform,
            store,
            bot,
        }
    }

    fn person(id: u64, name: &str) -> ConsoleUser {
        ConsoleUser {
            id,
            name: name.to_string(),
            display_name: None,
            bot: false,
        }
    }

    async fn post(
        platform: &ConsolePlatform,
        id: u64,
        author: ConsoleUser,
        content: &str,
        reply_to: Option<u64>,
    ) -> Message {
        let event = ConsoleEvent::Message {
            id,
            channel_id: 2,
            server_id: Some(3),
            server_name: Some("Lounge".to_string()),
            author,
            content: content.to_string(),
            reply_to,
        };
        match platform.ingest(event).await.unwrap() {
            Event::Message(message) => message,
            other => panic!("unexpected event: {other:?}"),
        }
    }

    async fn react(platform: &ConsolePlatform, message_id: u64, user: ConsoleUser, emoji: &str) -> ReactionAdd {
        let event = ConsoleEvent::Reaction {
            message_id,
            emoji: emoji.to_string(),
            user,
        };
        match platform.ingest(event).await.unwrap() {
            Event::ReactionAdded(reaction) => reaction,
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_twitter_link_is_fixed_and_recorded() {
        let h = harness(Permissions::default());
        let message = post(
            &h.platform,
            1,
            person(ALICE, "alice"),
            "check this https://twitter.com/alice/status/123",
            None,
        )
        .await;

        let outcome = h.bot.on_message(&message).await;
        let reply = outcome.reply.unwrap();
        assert_eq!(reply.content, "https://fxtwitter.com/alice/status/123");
        assert!(!outcome.notified);

        let actions = h.platform.actions().await;
        assert_eq!(
            actions,
            vec![
                Action::SuppressEmbeds {
                    message_id: message.id
                },
                Action::Reply {
                    to: message.id,
                    message_id: reply.id,
                    text: "https://fxtwitter.com/alice/status/123".to_string(),
                    mention_author: false,
                },
                Action::React {
                    message_id: reply.id,
                    emoji: "❌".to_string()
                },
            ]
        );

        let snapshot = h.store.snapshot().await;
        assert_eq!(snapshot.handlers["Twitter"].links_fixed, 1);
        assert_eq!(h.store.server_total("3").await, 1);
        assert_eq!(h.store.user_total(&ALICE.to_string()).await, 1);
    }

    #[tokio::test]
    async fn test_plain_message_does_nothing() {
        let h = harness(Permissions::default());
        let message = post(&h.platform, 1, person(ALICE, "alice"), "good morning", None).await;

        let outcome = h.bot.on_message(&message).await;
        assert!(outcome.reply.is_none());
        assert!(h.platform.actions().await.is_empty());
        assert_eq!(h.store.total_fixed().await, 0);
    }

    #[tokio::test]
    async fn test_already_fixed_link_is_left_alone() {
        let h = harness(Permissions::default());
        let message = post(
            &h.platform,
            1,
            person(ALICE, "alice"),
            "https://fxtwitter.com/alice/status/123",
            None,
        )
        .await;

        assert!(h.bot.on_message(&message).await.reply.is_none());
        assert_eq!(h.store.total_fixed().await, 0);
    }

    #[tokio::test]
    async fn test_multiple_platforms_reply_in_reverse_order() {
        let h = harness(Permissions::default());
        let message = post(
            &h.platform,
            1,
            person(ALICE, "alice"),
            "https://www.instagram.com/p/ABC123/ https://x.com/a/status/1",
            None,
        )
        .await;

        let reply = h.bot.on_message(&message).await.reply.unwrap();
        assert_eq!(
            reply.content,
            "https://ddinstagram.com/p/ABC123/\nddinstagram is unstable, some links may not embed correctly.\nhttps://fxtwitter.com/a/status/1"
        );

        let snapshot = h.store.snapshot().await;
        assert_eq!(snapshot.handlers["Twitter"].links_fixed, 1);
        assert_eq!(snapshot.handlers["Instagram"].links_fixed, 1);
        assert_eq!(h.store.total_fixed().await, 2);
    }

    #[tokio::test]
    async fn test_missing_suppress_permission_prepends_warning() {
        let h = harness(Permissions {
            deny_suppress: true,
            ..Permissions::default()
        });
        let message = post(
            &h.platform,
            1,
            person(ALICE, "alice"),
            "||https://x.com/a/status/1||",
            None,
        )
        .await;

        let reply = h.bot.on_message(&message).await.reply.unwrap();
        assert_eq!(
            reply.content,
            format!("{PREVIEW_WARNING}\n||https://fxtwitter.com/a/status/1||")
        );
        assert_eq!(h.store.total_fixed().await, 1);
    }

    #[tokio::test]
    async fn test_denied_reply_records_nothing() {
        let h = harness(Permissions {
            deny_reply: true,
            ..Permissions::default()
        });
        let message = post(
            &h.platform,
            1,
            person(ALICE, "alice"),
            "https://twitter.com/a/status/1",
            None,
        )
        .await;

        assert!(h.bot.on_message(&message).await.reply.is_none());
        assert_eq!(h.store.total_fixed().await, 0);
    }

    #[tokio::test]
    async fn test_disabled_fixing_ignores_messages() {
        let h = harness(Permissions::default());
        h.store.set_fixing_enabled(false).await;
        let message = post(
            &h.platform,
            1,
            person(ALICE, "alice"),
            "https://twitter.com/a/status/1",
            None,
        )
        .await;

        assert!(h.bot.on_message(&message).await.reply.is_none());
        assert!(h.platform.actions().await.is_empty());
    }

    #[tokio::test]
    async fn test_bot_authors_are_ignored() {
        let h = harness(Permissions::default());
        let mut other_bot = person(99, "otherbot");
        other_bot.bot = true;
        let message = post(&h.platform, 1, other_bot, "https://twitter.com/a/status/1", None).await;

        assert!(h.bot.on_message(&message).await.reply.is_none());
    }

    #[tokio::test]
    async fn test_reply_to_fix_notifies_and_opt_out_silences() {
        let h = harness(Permissions::default());
        let original = post(
            &h.platform,
            1,
            person(ALICE, "alice"),
            "https://twitter.com/a/status/1",
            None,
        )
        .await;
        let fix = h.bot.on_message(&original).await.reply.unwrap();

        let reply = post(&h.platform, 2, person(BOB, "bob"), "nice", Some(fix.id.get())).await;
        assert!(h.bot.on_message(&reply).await.notified);

        h.store.set_ignored(&ALICE.to_string(), true).await;
        let again = post(&h.platform, 3, person(BOB, "bob"), "nice 2", Some(fix.id.get())).await;
        assert!(!h.bot.on_message(&again).await.notified);
    }

    #[tokio::test]
    async fn test_notifications_command_silences_replies() {
        let h = harness(Permissions::default());
        let original = post(
            &h.platform,
            1,
            person(ALICE, "alice"),
            "https://twitter.com/a/status/1",
            None,
        )
        .await;
        let fix = h.bot.on_message(&original).await.reply.unwrap();

        let command = ConsoleEvent::Notifications {
            user: person(ALICE, "alice"),
            enabled: None,
        };
        let event = h.platform.ingest(command).await.unwrap();
        h.bot.dispatch(event).await;

        assert!(h.store.is_ignored(&ALICE.to_string()).await);
        assert!(h.platform.actions().await.contains(&Action::DirectMessage {
            user_id: UserId::new(ALICE),
            text: "You will no longer receive reply notifications.".to_string(),
        }));

        let reply = post(&h.platform, 2, person(BOB, "bob"), "nice", Some(fix.id.get())).await;
        let outcome = h.bot.on_message(&reply).await;
        assert!(!outcome.notified);

        let notifications = h
            .platform
            .actions()
            .await
            .into_iter()
            .filter(|action| {
                matches!(action, Action::DirectMessage { text, .. } if text.contains("replied to your link"))
            })
            .count();
        assert_eq!(notifications, 0);
    }

    #[tokio::test]
    async fn test_link_author_can_delete_fix() {
        let h = harness(Permissions::default());
        let original = post(
            &h.platform,
            1,
            person(ALICE, "alice"),
            "https://twitter.com/a/status/1",
            None,
        )
        .await;
        let fix = h.bot.on_message(&original).await.reply.unwrap();

        let reaction = react(&h.platform, fix.id.get(), person(ALICE, "alice"), "❌").await;
        assert!(h.bot.on_reaction_added(&reaction).await);

        let actions = h.platform.actions().await;
        assert!(actions.contains(&Action::Delete { message_id: fix.id }));
        assert!(actions.contains(&Action::DirectMessage {
            user_id: UserId::new(ALICE),
            text: "You deleted a link I fixed in Lounge.".to_string(),
        }));
        assert!(h.platform.fetch_message(fix.channel_id, fix.id).await.is_err());
    }

    #[tokio::test]
    async fn test_other_reactors_cannot_delete() {
        let h = harness(Permissions::default());
        let original = post(
            &h.platform,
            1,
            person(ALICE, "alice"),
            "https://twitter.com/a/status/1",
            None,
        )
        .await;
        let fix = h.bot.on_message(&original).await.reply.unwrap();

        let by_bob = react(&h.platform, fix.id.get(), person(BOB, "bob"), "❌").await;
        assert!(!h.bot.on_reaction_added(&by_bob).await);

        let wrong_emoji = react(&h.platform, fix.id.get(), person(ALICE, "alice"), "👍").await;
        assert!(!h.bot.on_reaction_added(&wrong_emoji).await);

        // Reacting on a human message never deletes it
        let on_original = react(&h.platform, original.id.get(), person(ALICE, "alice"), "❌").await;
        assert!(!h.bot.on_reaction_added(&on_original).await);

        assert!(h.platform.fetch_message(fix.channel_id, fix.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_dispatch_routes_events() {
        let h = harness(Permissions::default());
        let original = post(
            &h.platform,
            1,
            person(ALICE, "alice"),
            "https://vt.tiktok.com/ZSq/",
            None,
        )
        .await;

        h.bot.dispatch(Event::Message(original)).await;
        assert_eq!(h.store.total_fixed().await, 1);
    }

    #[tokio::test]
    async fn test_toggle_event_disables_fixing() {
        let h = harness(Permissions::default());
        h.bot
            .dispatch(Event::Toggle(ToggleCommand {
                fixing_enabled: Some(false),
                status_count: None,
            }))
            .await;

        let message = post(
            &h.platform,
            1,
            person(ALICE, "alice"),
            "https://twitter.com/a/status/1",
            None,
        )
        .await;
        assert!(h.bot.on_message(&message).await.reply.is_none());

        // Untouched switch keeps its value
        assert!(!h.store.toggles().await.status_count);
    }

    #[tokio::test]
    async fn test_status_count_off_restores_status_text() {
        let h = harness(Permissions::default());
        h.store.set_status_count(true).await;
        h.bot.startup().await;
        assert!(h.platform.actions().await.is_empty());

        h.bot
            .on_toggle(ToggleCommand {
                fixing_enabled: None,
                status_count: Some(false),
            })
            .await;
        assert_eq!(
            h.platform.actions().await,
            vec![Action::Presence {
                status: "fixing links".to_string()
            }]
        );
    }
}
