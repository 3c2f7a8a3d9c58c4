// src/bot/timer.rs
// =============================================================================
// Background task: every period, optionally show the running total as the
// bot's presence, then flush the stats to disk.
//
// The task owns no state of its own. It only talks to the store (which does
// its own locking) and the platform.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, warn};

use crate::platform::ChatPlatform;
use crate::stats::StatsStore;

/// Starts the timer. The first tick happens one full period from now.
pub fn spawn_background(
    store: Arc<StatsStore>,
    platform: Arc<dyn ChatPlatform>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            tick(&store, platform.as_ref()).await;
        }
    })
}

/// One round of presence update plus flush
pub async fn tick(store: &StatsStore, platform: &dyn ChatPlatform) {
    if store.toggles().await.status_count {
        let total = store.total_fixed().await;
        if let Err(e) = platform.set_presence(&format!("{total} fixed embeds")).await {
            warn!("could not update presence: {}", e);
        }
    }

    // A failed flush only loses this round; the next tick tries again
    if let Err(e) = store.flush().await {
        error!("flushing link stats failed: {:#}", e);
    }
}
