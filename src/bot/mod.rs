// src/bot/mod.rs
// =============================================================================
// The bot itself: glue between platform events, the rewrite engine, the
// reply notifier and the stats store.
//
// Submodules:
// - events: what happens on a new message or a new reaction
// - timer: the background task that flushes stats and updates presence
//
// Everything the bot shares (platform, store) is behind an Arc, so the
// event handlers and the timer task can all hold a handle at once.
// =============================================================================

mod events;
mod timer;

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::notify::ReplyNotifier;
use crate::platform::{ChatPlatform, Event, ToggleCommand};
use crate::stats::StatsStore;

pub use timer::spawn_background;

/// The parts of the config the event handlers need
#[derive(Debug, Clone)]
pub struct BotSettings {
    /// Presence text shown while status_count is off
    pub status: String,
    pub suppress_delay: Duration,
    pub delete_emoji: String,
    pub notification_command: String,
}

impl From<&Config> for BotSettings {
    fn from(config: &Config) -> Self {
        BotSettings {
            status: config.status.clone(),
            suppress_delay: config.suppress_delay(),
            delete_emoji: config.delete_emoji.clone(),
            notification_command: config.notification_command.clone(),
        }
    }
}

pub struct LinkFixBot {
    platform: Arc<dyn ChatPlatform>,
    store: Arc<StatsStore>,
    notifier: ReplyNotifier,
    settings: BotSettings,
}

impl LinkFixBot {
    pub fn new(platform: Arc<dyn ChatPlatform>, store: Arc<StatsStore>, settings: BotSettings) -> Self {
        let notifier = ReplyNotifier::new(
            Arc::clone(&platform),
            Arc::clone(&store),
            settings.notification_command.clone(),
        );

        LinkFixBot {
            platform,
            store,
            notifier,
            settings,
        }
    }

    /// Sets the startup presence. With status_count on, the timer owns the
    /// presence instead.
    pub async fn startup(&self) {
        if self.store.toggles().await.status_count {
            return;
        }
        self.show_status().await;
    }

    async fn show_status(&self) {
        if self.settings.status.is_empty() {
            return;
        }
        if let Err(e) = self.platform.set_presence(&self.settings.status).await {
            warn!("could not set presence: {}", e);
        }
    }

    /// Applies an owner toggle. Turning status_count off hands the presence
    /// back to the configured status text right away.
    pub async fn on_toggle(&self, command: ToggleCommand) {
        if let Some(enabled) = command.fixing_enabled {
            self.store.set_fixing_enabled(enabled).await;
            info!(enabled, "link fixing toggled");
        }
        if let Some(enabled) = command.status_count {
            self.store.set_status_count(enabled).await;
            info!(enabled, "fix count presence toggled");
            if !enabled {
                self.show_status().await;
            }
        }
    }

    /// Routes one inbound event to its handler
    pub async fn dispatch(&self, event: Event) {
        match event {
            Event::Message(message) => {
                self.on_message(&message).await;
            }
            Event::ReactionAdded(reaction) => {
                self.on_reaction_added(&reaction).await;
            }
            Event::Notifications(command) => {
                self.notifier.set_preference(&command).await;
            }
            Event::Toggle(command) => self.on_toggle(command).await,
        }
    }
}
