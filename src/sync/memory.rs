//! In-process profile store.
//!
//! Used for offline play and tests. Supports simple failure injection so
//! callers can exercise the store-down paths.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::error::SyncError;
use super::identity::ProfileId;
use super::store::{MergeFn, PlayerSummary, ProfileStore};
use crate::state::{StatsSnapshot, TileDefinition};

#[derive(Default)]
struct Inner {
    profiles: HashMap<ProfileId, StatsSnapshot>,
    usernames: Vec<PlayerSummary>,
    tiles: Vec<TileDefinition>,
    offline: bool,
    fail_writes: u32,
    writes: u32,
}

impl Inner {
    fn check_online(&self) -> Result<(), SyncError> {
        if self.offline {
            return Err(SyncError::Unavailable("store offline".to_string()));
        }
        Ok(())
    }

    fn fetch(&self, id: &ProfileId) -> Result<StatsSnapshot, SyncError> {
        self.check_online()?;
        self.profiles
            .get(id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(id.to_string()))
    }

    fn update(&mut self, id: &ProfileId, snapshot: &StatsSnapshot) -> Result<(), SyncError> {
        self.check_online()?;
        if self.fail_writes > 0 {
            self.fail_writes -= 1;
            return Err(SyncError::Status {
                status: 500,
                message: "injected failure".to_string(),
            });
        }
        if !self.profiles.contains_key(id) {
            return Err(SyncError::NotFound(id.to_string()));
        }
        self.profiles.insert(id.clone(), snapshot.clone());
        self.writes += 1;
        Ok(())
    }
}

/// Profile store held in memory.
#[derive(Default)]
pub struct MemoryProfileStore {
    inner: Mutex<Inner>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a player with an initial snapshot.
    pub fn insert_player(
        &self,
        id: impl Into<ProfileId>,
        username: impl Into<String>,
        snapshot: StatsSnapshot,
    ) {
        let id = id.into();
        let mut inner = self.inner.lock();
        inner.usernames.push(PlayerSummary {
            id: id.clone(),
            username: username.into(),
        });
        inner.profiles.insert(id, snapshot);
    }

    pub fn set_tiles(&self, tiles: Vec<TileDefinition>) {
        self.inner.lock().tiles = tiles;
    }

    /// Make every call fail until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.inner.lock().offline = offline;
    }

    /// Fail the next `count` writes with a 500.
    pub fn fail_next_writes(&self, count: u32) {
        self.inner.lock().fail_writes = count;
    }

    pub fn snapshot(&self, id: &ProfileId) -> Option<StatsSnapshot> {
        self.inner.lock().profiles.get(id).cloned()
    }

    /// Successful writes so far.
    pub fn write_count(&self) -> u32 {
        self.inner.lock().writes
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn fetch_profile(&self, id: &ProfileId) -> Result<StatsSnapshot, SyncError> {
        self.inner.lock().fetch(id)
    }

    async fn update_profile(
        &self,
        id: &ProfileId,
        snapshot: &StatsSnapshot,
    ) -> Result<(), SyncError> {
        self.inner.lock().update(id, snapshot)
    }

    async fn list_players(&self) -> Result<Vec<PlayerSummary>, SyncError> {
        let inner = self.inner.lock();
        inner.check_online()?;
        Ok(inner.usernames.clone())
    }

    async fn list_tiles(&self) -> Result<Vec<TileDefinition>, SyncError> {
        let inner = self.inner.lock();
        inner.check_online()?;
        Ok(inner.tiles.clone())
    }

    fn flush_blocking(
        &self,
        id: &ProfileId,
        merge: MergeFn<'_>,
    ) -> Result<StatsSnapshot, SyncError> {
        let mut inner = self.inner.lock();
        let merged = merge(&inner.fetch(id)?);
        inner.update(id, &merged)?;
        Ok(merged)
    }
}
