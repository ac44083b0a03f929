//! Session manager.
//!
//! Owns the one live session and its synchronizer. Identity changes are an
//! explicit teardown-and-recreate through [`SessionManager::replace_identity`];
//! dependents learn about it through [`SessionObserver`].

use std::sync::Arc;

use thiserror::Error;

use crate::state::{winning_tile_value, Session, SessionSettings, TileDefinition, TileRng};
use crate::sync::{Identity, ProfileStore, StatsSynchronizer, SyncSettings};

/// Session identifier, unique per manager.
pub type SessionId = u64;

/// Notified when the live session changes.
///
/// All methods default to doing nothing.
pub trait SessionObserver: Send {
    fn session_started(&mut self, _id: SessionId, _identity: &Identity) {}

    /// A new session replaced `old` (identity change).
    fn session_replaced(&mut self, _old: SessionId, _new: SessionId) {}

    fn session_closed(&mut self, _id: SessionId) {}
}

/// Manager errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManagerError {
    #[error("No session is open")]
    NoSession,
}

/// The live session with everything attached to it.
pub struct SessionHandle {
    id: SessionId,
    session: Session,
    identity: Identity,
    /// `None` when no profile store is configured
    sync: Option<Arc<StatsSynchronizer>>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn sync(&self) -> Option<&Arc<StatsSynchronizer>> {
        self.sync.as_ref()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "username": self.identity.username,
            "profile_id": self.identity.profile_id,
            "game": self.session.view().to_json(),
        })
    }
}

/// Tracks the live session.
pub struct SessionManager {
    settings: SessionSettings,
    sync_settings: SyncSettings,
    store: Option<Arc<dyn ProfileStore>>,
    current: Option<SessionHandle>,
    observers: Vec<Box<dyn SessionObserver>>,
    rng: TileRng,
    next_id: SessionId,
}

impl SessionManager {
    /// Manager without a profile store; sessions never sync.
    pub fn new(settings: SessionSettings, rng: TileRng) -> Self {
        Self {
            settings,
            sync_settings: SyncSettings::default(),
            store: None,
            current: None,
            observers: Vec::new(),
            rng,
            next_id: 1,
        }
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ProfileStore>, sync_settings: SyncSettings) -> Self {
        self.store = Some(store);
        self.sync_settings = sync_settings;
        self
    }

    pub fn add_observer(&mut self, observer: Box<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    fn create(&mut self, identity: Identity) -> SessionHandle {
        let id = self.next_id;
        self.next_id += 1;

        let sync = self.store.as_ref().map(|store| {
            Arc::new(StatsSynchronizer::new(
                Arc::clone(store),
                identity.clone(),
                self.sync_settings,
            ))
        });

        SessionHandle {
            id,
            session: Session::new(self.settings, self.rng.derive()),
            identity,
            sync,
        }
    }

    fn teardown(handle: &mut SessionHandle) {
        handle.session.stop_timer();
    }

    /// Open a session for `identity`. A session already open is closed first.
    pub fn open(&mut self, identity: Identity) -> SessionId {
        if self.current.is_some() {
            self.close();
        }
        let handle = self.create(identity);
        let id = handle.id;
        tracing::info!(session_id = id, username = ?handle.identity.username, "Session opened");
        for observer in &mut self.observers {
            observer.session_started(id, &handle.identity);
        }
        self.current = Some(handle);
        id
    }

    /// Tear down the current session and start a new one for `identity`.
    ///
    /// Returns the previous handle, timer stopped, so the caller can flush it.
    pub fn replace_identity(&mut self, identity: Identity) -> Option<SessionHandle> {
        let Some(mut previous) = self.current.take() else {
            self.open(identity);
            return None;
        };
        Self::teardown(&mut previous);

        let handle = self.create(identity);
        tracing::info!(
            old_session_id = previous.id,
            session_id = handle.id,
            username = ?handle.identity.username,
            "Identity changed, session replaced"
        );
        for observer in &mut self.observers {
            observer.session_replaced(previous.id, handle.id);
        }
        self.current = Some(handle);
        Some(previous)
    }

    /// Close the current session, returning it with its timer stopped.
    pub fn close(&mut self) -> Option<SessionHandle> {
        let mut handle = self.current.take()?;
        Self::teardown(&mut handle);
        tracing::info!(session_id = handle.id, "Session closed");
        for observer in &mut self.observers {
            observer.session_closed(handle.id);
        }
        Some(handle)
    }

    /// Start a new game in the current session.
    ///
    /// The synchronizer is replaced so the new game syncs from a clean
    /// ledger. The abandoned game is not synced.
    pub fn reset_current(&mut self) -> Result<(), ManagerError> {
        let handle = self.current.as_mut().ok_or(ManagerError::NoSession)?;
        handle.session.reset();
        handle.sync = handle.sync.as_ref().map(|s| Arc::new(s.next_session()));
        tracing::debug!(session_id = handle.id, "Session reset");
        Ok(())
    }

    /// Apply a tile table: its largest value becomes the winning tile.
    ///
    /// Affects the current game only if it has not started.
    pub fn apply_tile_catalog(&mut self, tiles: &[TileDefinition]) -> u32 {
        let winning = winning_tile_value(tiles);
        self.settings.winning_tile = winning;
        if let Some(handle) = self.current.as_mut() {
            handle.session.set_winning_tile(winning);
        }
        tracing::debug!(winning_tile = winning, "Tile table applied");
        winning
    }

    pub fn current(&self) -> Option<&SessionHandle> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut SessionHandle> {
        self.current.as_mut()
    }
}
