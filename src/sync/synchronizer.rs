//! Stats synchronizer.
//!
//! Reconciles one session's progress with the remote profile. Every write
//! re-fetches the remote snapshot first and adds only what this session has
//! not reported yet, tracked by a small ledger:
//!
//! ```text
//!   local progress ──┐
//!                    ├──▶ delta = local - ledger ──▶ remote ⊕ delta ──▶ PUT
//!   ledger ──────────┘                                                  │
//!      ▲                                                                │
//!      └──────────────────────── advance on success ◀───────────────────┘
//! ```
//!
//! Failures never reach the session: they are logged and reported as
//! `SyncOutcome::Failed`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use super::error::SyncError;
use super::identity::{Identity, ProfileId};
use super::store::ProfileStore;
use crate::state::{
    GameResult, ProgressDelta, SessionProgress, SessionStatus, StatsSnapshot, TerminalEvent,
    TileDefinition,
};

/// Play-time gates for the non-terminal syncs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Minimum elapsed seconds before a periodic sync writes.
    pub periodic_min_play_secs: u32,
    /// Minimum elapsed seconds before the exit flush writes.
    pub exit_min_play_secs: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            periodic_min_play_secs: 10,
            exit_min_play_secs: 5,
        }
    }
}

/// Why a sync did not write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No profile to attach to
    NoProfile,
    /// Session not running
    NotActive,
    /// Below the minimum play time
    TooShort,
    /// Nothing new since the last write
    NothingNew,
    /// The final sync already ran
    AlreadyFinalized,
}

/// Result of a sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Written,
    Skipped(SkipReason),
    Failed,
}

impl SyncOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written)
    }
}

/// Progress already written to the store.
#[derive(Debug, Clone, Copy, Default)]
struct Ledger {
    moves: u64,
    play_secs: u64,
}

impl Ledger {
    fn delta(&self, moves: u32, elapsed_secs: u32, highest_tile: u32) -> ProgressDelta {
        ProgressDelta {
            moves: u64::from(moves).saturating_sub(self.moves),
            play_secs: u64::from(elapsed_secs).saturating_sub(self.play_secs),
            highest_tile,
        }
    }

    fn advance(&mut self, delta: &ProgressDelta) {
        self.moves += delta.moves;
        self.play_secs += delta.play_secs;
    }
}

fn log_failure(operation: &str, profile_id: &ProfileId, err: &SyncError) {
    match err {
        SyncError::Unauthorized => tracing::warn!(
            profile_id = %profile_id,
            operation,
            "Session expired, stats not synced"
        ),
        _ => tracing::warn!(
            profile_id = %profile_id,
            operation,
            error = %err,
            "Stats sync failed"
        ),
    }
}

/// Synchronizer for one session.
///
/// A fresh synchronizer is created per session (see [`Self::next_session`]);
/// the ledger and the finalized flag never carry over.
pub struct StatsSynchronizer {
    store: Arc<dyn ProfileStore>,
    identity: Identity,
    profile_id: parking_lot::Mutex<Option<ProfileId>>,
    ledger: Mutex<Ledger>,
    finalized: AtomicBool,
    settings: SyncSettings,
}

impl StatsSynchronizer {
    pub fn new(store: Arc<dyn ProfileStore>, identity: Identity, settings: SyncSettings) -> Self {
        let profile_id = identity.profile_id.clone();
        Self {
            store,
            identity,
            profile_id: parking_lot::Mutex::new(profile_id),
            ledger: Mutex::new(Ledger::default()),
            finalized: AtomicBool::new(false),
            settings,
        }
    }

    /// Synchronizer for the next session of the same player.
    ///
    /// Keeps the store, identity and resolved profile id.
    pub fn next_session(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            identity: self.identity.clone(),
            profile_id: parking_lot::Mutex::new(self.cached_profile_id()),
            ledger: Mutex::new(Ledger::default()),
            finalized: AtomicBool::new(false),
            settings: self.settings,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn settings(&self) -> SyncSettings {
        self.settings
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::SeqCst)
    }

    pub fn cached_profile_id(&self) -> Option<ProfileId> {
        self.profile_id.lock().clone()
    }

    /// Resolve the profile id, looking the username up once if needed.
    pub async fn resolve_profile_id(&self) -> Option<ProfileId> {
        if let Some(id) = self.cached_profile_id() {
            return Some(id);
        }
        let username = self.identity.username.as_deref()?;
        if !self.identity.is_authenticated() {
            return None;
        }

        match self.store.list_players().await {
            Ok(players) => {
                let found = players
                    .into_iter()
                    .find(|p| p.username == username)
                    .map(|p| p.id);
                match &found {
                    Some(id) => {
                        tracing::debug!(username, profile_id = %id, "Resolved profile id");
                        *self.profile_id.lock() = Some(id.clone());
                    }
                    None => tracing::warn!(username, "No profile for username"),
                }
                found
            }
            Err(err) => {
                tracing::warn!(username, error = %err, "Failed to list players");
                None
            }
        }
    }

    /// Fetch the player's snapshot for display. `None` on any failure.
    pub async fn load_profile(&self) -> Option<StatsSnapshot> {
        let id = self.resolve_profile_id().await?;
        match self.store.fetch_profile(&id).await {
            Ok(snapshot) => {
                tracing::debug!(
                    profile_id = %id,
                    highest_score = snapshot.highest_score,
                    "Loaded profile"
                );
                Some(snapshot)
            }
            Err(err) => {
                log_failure("load_profile", &id, &err);
                None
            }
        }
    }

    /// Fetch the tile table. Empty on failure.
    pub async fn load_tiles(&self) -> Vec<TileDefinition> {
        match self.store.list_tiles().await {
            Ok(tiles) => tiles,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to load tiles, using defaults");
                Vec::new()
            }
        }
    }

    /// Write in-progress totals while the session is running.
    pub async fn periodic_sync(&self, progress: &SessionProgress) -> SyncOutcome {
        if self.is_finalized() {
            return SyncOutcome::Skipped(SkipReason::AlreadyFinalized);
        }
        if progress.status != SessionStatus::Active {
            return SyncOutcome::Skipped(SkipReason::NotActive);
        }
        if progress.elapsed_secs < self.settings.periodic_min_play_secs {
            return SyncOutcome::Skipped(SkipReason::TooShort);
        }
        let Some(id) = self.resolve_profile_id().await else {
            return SyncOutcome::Skipped(SkipReason::NoProfile);
        };

        let mut ledger = self.ledger.lock().await;
        // finalize_sync may have started while we waited for the ledger.
        if self.is_finalized() {
            return SyncOutcome::Skipped(SkipReason::AlreadyFinalized);
        }
        let delta = ledger.delta(progress.moves, progress.elapsed_secs, progress.highest_tile);
        if delta.is_empty() {
            return SyncOutcome::Skipped(SkipReason::NothingNew);
        }

        match self.write_progress(&id, &delta).await {
            Ok(()) => {
                ledger.advance(&delta);
                tracing::info!(
                    profile_id = %id,
                    moves = delta.moves,
                    play_secs = delta.play_secs,
                    "Periodic stats sync"
                );
                SyncOutcome::Written
            }
            Err(err) => {
                log_failure("periodic_sync", &id, &err);
                SyncOutcome::Failed
            }
        }
    }

    async fn write_progress(&self, id: &ProfileId, delta: &ProgressDelta) -> Result<(), SyncError> {
        let remote = self.store.fetch_profile(id).await?;
        self.store
            .update_profile(id, &remote.with_progress(delta))
            .await
    }

    /// Record the finished game. Runs at most once per synchronizer.
    pub async fn finalize_sync(&self, event: &TerminalEvent) -> SyncOutcome {
        if self.finalized.swap(true, Ordering::SeqCst) {
            return SyncOutcome::Skipped(SkipReason::AlreadyFinalized);
        }
        let Some(id) = self.resolve_profile_id().await else {
            return SyncOutcome::Skipped(SkipReason::NoProfile);
        };

        let mut ledger = self.ledger.lock().await;
        let result = GameResult {
            score: event.score,
            won: event.outcome.is_win(),
            unsynced: ledger.delta(event.moves, event.elapsed_secs, event.highest_tile),
        };

        let written = match self.store.fetch_profile(&id).await {
            Ok(remote) => {
                let merged = remote.with_outcome(&result);
                self.store
                    .update_profile(&id, &merged)
                    .await
                    .map(|()| merged)
            }
            Err(err) => Err(err),
        };

        match written {
            Ok(merged) => {
                ledger.advance(&result.unsynced);
                tracing::info!(
                    profile_id = %id,
                    outcome = ?event.outcome,
                    score = event.score,
                    games_played = merged.games_played,
                    "Game stats saved"
                );
                SyncOutcome::Written
            }
            Err(err) => {
                log_failure("finalize_sync", &id, &err);
                SyncOutcome::Failed
            }
        }
    }

    /// Blocking flush for teardown.
    ///
    /// Uses only an already-resolved profile id. Must run outside the async
    /// runtime (for example via `tokio::task::spawn_blocking`).
    pub fn flush_on_exit(&self, progress: &SessionProgress) -> SyncOutcome {
        if self.is_finalized() {
            return SyncOutcome::Skipped(SkipReason::AlreadyFinalized);
        }
        if progress.status != SessionStatus::Active {
            return SyncOutcome::Skipped(SkipReason::NotActive);
        }
        if progress.elapsed_secs < self.settings.exit_min_play_secs {
            return SyncOutcome::Skipped(SkipReason::TooShort);
        }
        let Some(id) = self.cached_profile_id() else {
            return SyncOutcome::Skipped(SkipReason::NoProfile);
        };

        let mut ledger = self.ledger.blocking_lock();
        let delta = ledger.delta(progress.moves, progress.elapsed_secs, progress.highest_tile);
        if delta.is_empty() {
            return SyncOutcome::Skipped(SkipReason::NothingNew);
        }

        match self
            .store
            .flush_blocking(&id, &|remote| remote.with_progress(&delta))
        {
            Ok(_) => {
                ledger.advance(&delta);
                tracing::info!(profile_id = %id, moves = delta.moves, "Stats flushed on exit");
                SyncOutcome::Written
            }
            Err(err) => {
                log_failure("flush_on_exit", &id, &err);
                SyncOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Outcome;
    use crate::sync::memory::MemoryProfileStore;
    use pretty_assertions::assert_eq;

    fn remote() -> StatsSnapshot {
        StatsSnapshot {
            highest_score: 1000,
            best_tile_achieved: 128,
            games_played: 4,
            average_score: 250.0,
            total_play_time_secs: 600,
            win_streak: 1,
            total_moves: 100,
            ..StatsSnapshot::default()
        }
    }

    fn setup() -> (Arc<MemoryProfileStore>, StatsSynchronizer) {
        let store = Arc::new(MemoryProfileStore::new());
        store.insert_player("7", "baker", remote());
        let identity = Identity::from_bearer_token("t", "baker").with_profile_id("7");
        let sync = StatsSynchronizer::new(store.clone(), identity, SyncSettings::default());
        (store, sync)
    }

    fn active(moves: u32, elapsed_secs: u32) -> SessionProgress {
        SessionProgress {
            status: SessionStatus::Active,
            moves,
            elapsed_secs,
            highest_tile: 64,
        }
    }

    fn event(outcome: Outcome, score: u64, moves: u32, elapsed_secs: u32) -> TerminalEvent {
        TerminalEvent {
            outcome,
            score,
            highest_tile: 256,
            moves,
            elapsed_secs,
        }
    }

    fn id() -> ProfileId {
        ProfileId::new("7")
    }

    #[tokio::test]
    async fn test_periodic_sync_gates() {
        let (store, sync) = setup();

        let idle = SessionProgress {
            status: SessionStatus::Idle,
            ..active(0, 0)
        };
        assert_eq!(
            sync.periodic_sync(&idle).await,
            SyncOutcome::Skipped(SkipReason::NotActive)
        );
        assert_eq!(
            sync.periodic_sync(&active(3, 9)).await,
            SyncOutcome::Skipped(SkipReason::TooShort)
        );
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_periodic_sync_writes_only_new_progress() {
        let (store, sync) = setup();

        assert_eq!(sync.periodic_sync(&active(10, 30)).await, SyncOutcome::Written);
        let first = store.snapshot(&id()).unwrap();
        assert_eq!(first.total_moves, 110);
        assert_eq!(first.total_play_time_secs, 630);
        assert_eq!(first.games_played, 4);

        assert_eq!(sync.periodic_sync(&active(15, 60)).await, SyncOutcome::Written);
        let second = store.snapshot(&id()).unwrap();
        assert_eq!(second.total_moves, 115);
        assert_eq!(second.total_play_time_secs, 660);
        assert_eq!(second.games_played, 4);
        assert_eq!(second.average_score, 250.0);

        assert_eq!(
            sync.periodic_sync(&active(15, 60)).await,
            SyncOutcome::Skipped(SkipReason::NothingNew)
        );
    }

    #[tokio::test]
    async fn test_failed_periodic_sync_retries_with_accumulated_delta() {
        let (store, sync) = setup();

        store.fail_next_writes(1);
        assert_eq!(sync.periodic_sync(&active(10, 30)).await, SyncOutcome::Failed);
        assert_eq!(store.snapshot(&id()).unwrap().total_moves, 100);

        assert_eq!(sync.periodic_sync(&active(20, 60)).await, SyncOutcome::Written);
        let snapshot = store.snapshot(&id()).unwrap();
        assert_eq!(snapshot.total_moves, 120);
        assert_eq!(snapshot.total_play_time_secs, 660);
    }

    #[tokio::test]
    async fn test_finalize_sync_merges_outcome() {
        let (store, sync) = setup();

        let outcome = sync.finalize_sync(&event(Outcome::Won, 1500, 40, 120)).await;
        assert_eq!(outcome, SyncOutcome::Written);

        let snapshot = store.snapshot(&id()).unwrap();
        assert_eq!(snapshot.current_score, 1500);
        assert_eq!(snapshot.highest_score, 1500);
        assert_eq!(snapshot.best_tile_achieved, 256);
        assert_eq!(snapshot.games_played, 5);
        assert_eq!(snapshot.average_score, 500.0);
        assert_eq!(snapshot.win_streak, 2);
        assert_eq!(snapshot.total_moves, 140);
        assert_eq!(snapshot.total_play_time_secs, 720);
    }

    #[tokio::test]
    async fn test_finalize_twice_counts_one_game() {
        let (store, sync) = setup();
        let ended = event(Outcome::Lost, 100, 10, 20);

        assert_eq!(sync.finalize_sync(&ended).await, SyncOutcome::Written);
        assert_eq!(
            sync.finalize_sync(&ended).await,
            SyncOutcome::Skipped(SkipReason::AlreadyFinalized)
        );

        let snapshot = store.snapshot(&id()).unwrap();
        assert_eq!(snapshot.games_played, 5);
        assert_eq!(snapshot.win_streak, 0);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_finalize_counts_one_game() {
        let (store, sync) = setup();
        let ended = event(Outcome::TimedOut, 300, 10, 420);

        let (a, b) = tokio::join!(sync.finalize_sync(&ended), sync.finalize_sync(&ended));
        assert!(a.is_written() ^ b.is_written());
        assert_eq!(store.snapshot(&id()).unwrap().games_played, 5);
    }

    #[tokio::test]
    async fn test_periodic_then_finalize_does_not_double_count() {
        let (store, sync) = setup();

        sync.periodic_sync(&active(10, 30)).await;
        sync.finalize_sync(&event(Outcome::Lost, 200, 12, 35)).await;
        assert_eq!(
            sync.periodic_sync(&active(12, 35)).await,
            SyncOutcome::Skipped(SkipReason::AlreadyFinalized)
        );

        let snapshot = store.snapshot(&id()).unwrap();
        assert_eq!(snapshot.total_moves, 112);
        assert_eq!(snapshot.total_play_time_secs, 635);
        assert_eq!(snapshot.games_played, 5);
    }

    #[tokio::test]
    async fn test_store_failure_is_contained() {
        let (store, sync) = setup();
        store.set_offline(true);

        assert_eq!(sync.load_profile().await, None);
        assert_eq!(sync.periodic_sync(&active(10, 30)).await, SyncOutcome::Failed);
        assert_eq!(
            sync.finalize_sync(&event(Outcome::Lost, 1, 1, 1)).await,
            SyncOutcome::Failed
        );
        assert!(sync.is_finalized());
    }

    #[tokio::test]
    async fn test_no_profile_skips() {
        let store = Arc::new(MemoryProfileStore::new());
        let sync = StatsSynchronizer::new(store, Identity::anonymous(), SyncSettings::default());

        assert_eq!(sync.load_profile().await, None);
        assert_eq!(
            sync.periodic_sync(&active(10, 30)).await,
            SyncOutcome::Skipped(SkipReason::NoProfile)
        );
        assert_eq!(
            sync.finalize_sync(&event(Outcome::Won, 1, 1, 1)).await,
            SyncOutcome::Skipped(SkipReason::NoProfile)
        );
    }

    #[tokio::test]
    async fn test_resolve_profile_id_by_username() {
        let store = Arc::new(MemoryProfileStore::new());
        store.insert_player("3", "someone", StatsSnapshot::default());
        store.insert_player("9", "baker", StatsSnapshot::default());
        let identity = Identity::from_bearer_token("t", "baker");
        let sync = StatsSynchronizer::new(store, identity, SyncSettings::default());

        assert_eq!(sync.cached_profile_id(), None);
        assert_eq!(sync.resolve_profile_id().await, Some(ProfileId::new("9")));
        assert_eq!(sync.cached_profile_id(), Some(ProfileId::new("9")));
        assert_eq!(
            sync.next_session().cached_profile_id(),
            Some(ProfileId::new("9"))
        );
    }

    #[test]
    fn test_flush_on_exit() {
        let (store, sync) = setup();

        assert_eq!(
            sync.flush_on_exit(&active(2, 4)),
            SyncOutcome::Skipped(SkipReason::TooShort)
        );
        assert_eq!(sync.flush_on_exit(&active(6, 5)), SyncOutcome::Written);

        let snapshot = store.snapshot(&id()).unwrap();
        assert_eq!(snapshot.total_moves, 106);
        assert_eq!(snapshot.total_play_time_secs, 605);
        assert_eq!(snapshot.games_played, 4);
    }

    #[tokio::test]
    async fn test_next_session_resets_finalized() {
        let (_store, sync) = setup();
        sync.finalize_sync(&event(Outcome::Lost, 1, 1, 1)).await;
        assert!(sync.is_finalized());
        assert!(!sync.next_session().is_finalized());
    }
}
