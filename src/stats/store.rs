// src/stats/store.rs
// =============================================================================
// The shared stats store.
//
// Message events and the background timer all touch the same counters, so
// every read-modify-write goes through one tokio Mutex. A whole record()
// call (server + user + total) is a single critical section, which means a
// flush can never see a half-applied update.
//
// Disk I/O never happens while the state lock is held:
// - flush() copies the state into a JSON string under the lock, then writes
//   the file on the blocking thread pool
// - load() reads the file on the blocking pool, then swaps it in under the
//   lock
//
// A second lock (write_lock) keeps two flushes from racing on the temp file.
//
// The runtime toggles (fixing on/off, running total as presence) live here
// too so they follow the same locking rules. They are not written to disk.
// =============================================================================

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::snapshot::{write_atomic, Snapshot};
use crate::handlers::registry;

/// Switches that can be flipped while the bot runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toggles {
    /// When false, message events are ignored entirely
    pub fixing_enabled: bool,
    /// When true, the presence shows the running total of fixed links
    pub status_count: bool,
}

impl Default for Toggles {
    fn default() -> Self {
        Toggles {
            fixing_enabled: true,
            status_count: false,
        }
    }
}

/// A server or user id together with its combined fix count
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedEntry {
    pub id: String,
    pub count: u64,
}

/// Totals across every handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalStats {
    pub total_fixed: u64,
    /// Highest count first, ties in ascending id order
    pub top_servers: Vec<RankedEntry>,
    pub top_users: Vec<RankedEntry>,
}

struct StoreState {
    snapshot: Snapshot,
    toggles: Toggles,
}

pub struct StatsStore {
    path: PathBuf,
    state: Mutex<StoreState>,
    write_lock: Mutex<()>,
}

impl StatsStore {
    /// Creates an empty store backed by `path`. Call load() before use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StatsStore {
            path: path.into(),
            state: Mutex::new(StoreState {
                snapshot: Snapshot::zeroed(registry()),
                toggles: Toggles::default(),
            }),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the stats file. When it doesn't exist yet, starts from zeroed
    /// counters for every handler and writes the file straight away.
    pub async fn load(&self) -> Result<()> {
        let path = self.path.clone();
        let loaded = tokio::task::spawn_blocking(move || Snapshot::read(&path)).await??;

        match loaded {
            Some(mut snapshot) => {
                snapshot.ensure_handlers(registry());
                self.state.lock().await.snapshot = snapshot;
                info!(path = %self.path.display(), "loaded link stats");
            }
            None => {
                self.state.lock().await.snapshot = Snapshot::zeroed(registry());
                info!(path = %self.path.display(), "no stats file found, creating one");
                self.flush().await?;
            }
        }

        Ok(())
    }

    /// Writes the current state to disk, replacing the previous file.
    pub async fn flush(&self) -> Result<()> {
        let _writer = self.write_lock.lock().await;

        let json = {
            let state = self.state.lock().await;
            serde_json::to_string_pretty(&state.snapshot)?
        };

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &json)).await??;

        debug!(path = %self.path.display(), "flushed link stats");
        Ok(())
    }

    /// Adds `count` fixes for `handler` to the server, the user and the
    /// handler total. A count of zero changes nothing.
    pub async fn record(&self, server_id: &str, user_id: &str, count: u64, handler: &str) {
        if count == 0 {
            return;
        }

        let mut state = self.state.lock().await;
        let stats = state
            .snapshot
            .handlers
            .entry(handler.to_string())
            .or_default();

        *stats.servers.entry(server_id.to_string()).or_insert(0) += count;
        *stats.users.entry(user_id.to_string()).or_insert(0) += count;
        stats.links_fixed += count;

        debug!(handler, server_id, user_id, count, "recorded fixes");
    }

    /// Sum of every handler's total
    pub async fn total_fixed(&self) -> u64 {
        let state = self.state.lock().await;
        state
            .snapshot
            .handlers
            .values()
            .map(|stats| stats.links_fixed)
            .sum()
    }

    pub async fn global_stats(&self) -> GlobalStats {
        let state = self.state.lock().await;

        let mut servers: BTreeMap<&str, u64> = BTreeMap::new();
        let mut users: BTreeMap<&str, u64> = BTreeMap::new();
        let mut total_fixed = 0;

        for stats in state.snapshot.handlers.values() {
            for (id, count) in &stats.servers {
                *servers.entry(id.as_str()).or_insert(0) += count;
            }
            for (id, count) in &stats.users {
                *users.entry(id.as_str()).or_insert(0) += count;
            }
            total_fixed += stats.links_fixed;
        }

        GlobalStats {
            total_fixed,
            top_servers: rank(servers),
            top_users: rank(users),
        }
    }

    /// Fixes in one server, summed across handlers
    pub async fn server_total(&self, server_id: &str) -> u64 {
        let state = self.state.lock().await;
        state
            .snapshot
            .handlers
            .values()
            .filter_map(|stats| stats.servers.get(server_id))
            .sum()
    }

    /// Fixes for one user, summed across handlers
    pub async fn user_total(&self, user_id: &str) -> u64 {
        let state = self.state.lock().await;
        state
            .snapshot
            .handlers
            .values()
            .filter_map(|stats| stats.users.get(user_id))
            .sum()
    }

    pub async fn is_ignored(&self, user_id: &str) -> bool {
        self.state.lock().await.snapshot.ignored.contains_key(user_id)
    }

    /// Adds or removes a user from the opt-out set. Returns true when the set
    /// changed.
    pub async fn set_ignored(&self, user_id: &str, ignored: bool) -> bool {
        let mut state = self.state.lock().await;
        if ignored {
            state
                .snapshot
                .ignored
                .insert(user_id.to_string(), true)
                .is_none()
        } else {
            state.snapshot.ignored.remove(user_id).is_some()
        }
    }

    /// Flips a user's opt-out and returns the new state (true = opted out)
    pub async fn toggle_ignored(&self, user_id: &str) -> bool {
        let mut state = self.state.lock().await;
        if state.snapshot.ignored.remove(user_id).is_some() {
            false
        } else {
            state.snapshot.ignored.insert(user_id.to_string(), true);
            true
        }
    }

    pub async fn toggles(&self) -> Toggles {
        self.state.lock().await.toggles
    }

    pub async fn set_fixing_enabled(&self, enabled: bool) {
        self.state.lock().await.toggles.fixing_enabled = enabled;
    }

    pub async fn set_status_count(&self, enabled: bool) {
        self.state.lock().await.toggles.status_count = enabled;
    }

    /// Copy of the counters and opt-out set
    #[cfg(test)]
    pub async fn snapshot(&self) -> Snapshot {
        self.state.lock().await.snapshot.clone()
    }
}

// Highest count first. The sort is stable and the map is ordered by id, so
// ties always come out in the same order.
fn rank(totals: BTreeMap<&str, u64>) -> Vec<RankedEntry> {
    let mut ranked: Vec<RankedEntry> = totals
        .into_iter()
        .map(|(id, count)| RankedEntry {
            id: id.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why tokio::sync::Mutex and not std::sync::Mutex?
//    - flush() holds write_lock across an .await (the blocking file write)
//    - A std MutexGuard can't be held across .await in a spawned task
//    - tokio's lock yields to other tasks while waiting instead of blocking
//
// 2. What is spawn_blocking?
//    - Runs a closure on a separate thread pool meant for blocking work
//    - File I/O there doesn't stall the tasks handling messages
//    - The returned JoinHandle is awaited like any other future
//
// 3. Why does .await?? have two question marks?
//    - The first ? handles the JoinError (the blocking task panicked)
//    - The second ? handles the Result our closure returned
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> StatsStore {
        StatsStore::new(dir.path().join("stats.json"))
    }

    #[tokio::test]
    async fn test_load_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.load().await.unwrap();

        assert!(store.path().exists());
        let on_disk = Snapshot::read(store.path()).unwrap().unwrap();
        assert_eq!(on_disk, Snapshot::zeroed(registry()));
    }

    #[tokio::test]
    async fn test_record_updates_all_counters() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.load().await.unwrap();

        store.record("10", "20", 2, "Twitter").await;
        store.record("10", "21", 1, "Instagram").await;

        assert_eq!(store.total_fixed().await, 3);
        assert_eq!(store.server_total("10").await, 3);
        assert_eq!(store.user_total("20").await, 2);
        assert_eq!(store.user_total("99").await, 0);

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.handlers["Twitter"].links_fixed, 2);
        assert_eq!(snapshot.handlers["Instagram"].users["21"], 1);
    }

    #[tokio::test]
    async fn test_record_zero_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.load().await.unwrap();
        let before = store.snapshot().await;

        store.record("10", "20", 0, "Twitter").await;

        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_records_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(store_in(&dir));
        store.load().await.unwrap();

        let tasks = (0..200).map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.record("1", "2", 1, "Twitter").await })
        });
        for result in join_all(tasks).await {
            result.unwrap();
        }

        assert_eq!(store.total_fixed().await, 200);
        assert_eq!(store.server_total("1").await, 200);
        assert_eq!(store.user_total("2").await, 200);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_flush_during_records_stays_consistent() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(store_in(&dir));
        store.load().await.unwrap();

        let records = (0..100).map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.record("1", "2", 1, "Tiktok").await })
        });
        let flushes = (0..5).map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.flush().await.unwrap() })
        });
        join_all(records).await;
        join_all(flushes).await;

        // Every snapshot on disk has matching server, user and total counts
        let on_disk = Snapshot::read(store.path()).unwrap().unwrap();
        let tiktok = &on_disk.handlers["Tiktok"];
        let total = tiktok.links_fixed;
        assert_eq!(tiktok.servers.get("1").copied().unwrap_or(0), total);
        assert_eq!(tiktok.users.get("2").copied().unwrap_or(0), total);
    }

    #[tokio::test]
    async fn test_flush_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.load().await.unwrap();
        store.record("10", "20", 3, "Twitter").await;
        store.set_ignored("20", true).await;
        store.flush().await.unwrap();

        let reloaded = store_in(&dir);
        reloaded.load().await.unwrap();

        // Zeroed Instagram/Tiktok entries survive as well
        assert_eq!(reloaded.snapshot().await, store.snapshot().await);
    }

    #[tokio::test]
    async fn test_load_fills_in_new_handlers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stats.json");
        std::fs::write(
            &path,
            r#"{"Twitter": {"servers": {}, "users": {}, "links_fixed": 7}, "ignored": {}}"#,
        )
        .unwrap();

        let store = StatsStore::new(&path);
        store.load().await.unwrap();

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.handlers["Twitter"].links_fixed, 7);
        assert!(snapshot.handlers.contains_key("Tiktok"));
        assert_eq!(store.total_fixed().await, 7);
    }

    #[tokio::test]
    async fn test_global_stats_sorted_descending() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.load().await.unwrap();
        store.record("a", "u1", 1, "Twitter").await;
        store.record("b", "u2", 5, "Twitter").await;
        store.record("a", "u3", 5, "Instagram").await;
        store.record("c", "u1", 2, "Tiktok").await;

        let stats = store.global_stats().await;
        assert_eq!(stats.total_fixed, 13);

        let servers: Vec<(&str, u64)> = stats
            .top_servers
            .iter()
            .map(|entry| (entry.id.as_str(), entry.count))
            .collect();
        assert_eq!(servers, vec![("a", 6), ("b", 5), ("c", 2)]);

        let users: Vec<(&str, u64)> = stats
            .top_users
            .iter()
            .map(|entry| (entry.id.as_str(), entry.count))
            .collect();
        // u2 and u3 tie; ids break the tie
        assert_eq!(users, vec![("u2", 5), ("u3", 5), ("u1", 3)]);
    }

    #[tokio::test]
    async fn test_ignore_set() {
        let store = StatsStore::new("unused.json");
        assert!(!store.is_ignored("5").await);

        assert!(store.set_ignored("5", true).await);
        assert!(!store.set_ignored("5", true).await);
        assert!(store.is_ignored("5").await);

        assert!(store.set_ignored("5", false).await);
        assert!(!store.is_ignored("5").await);

        assert!(store.toggle_ignored("6").await);
        assert!(!store.toggle_ignored("6").await);
    }

    #[tokio::test]
    async fn test_toggles_default_and_update() {
        let store = StatsStore::new("unused.json");
        assert_eq!(store.toggles().await, Toggles::default());

        store.set_fixing_enabled(false).await;
        store.set_status_count(true).await;
        let toggles = store.toggles().await;
        assert!(!toggles.fixing_enabled);
        assert!(toggles.status_count);
    }
}
