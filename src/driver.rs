//! Cooperative game loop.
//!
//! One task drives everything: player input, the one-second countdown, the
//! autosave interval and results of background loads. The session is only
//! touched from this task. Network work is spawned and never awaited by the
//! loop, except on exit where the final flush must finish first.
//!
//! ```text
//!   PlayerInput ─┐
//!   1s tick ─────┤                   ┌──▶ Renderer
//!   autosave ────┼──▶ GameLoop ──────┤
//!   LoopEvent ───┘      │            └──▶ spawned syncs (JoinSet)
//!        ▲              │
//!        └── loads ◀────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{self, Instant, Interval};

use crate::manager::{SessionHandle, SessionId, SessionManager};
use crate::state::{
    Direction, SessionView, StatsSnapshot, TerminalEvent, TileDefinition, TimerToken,
};
use crate::sync::{Identity, StatsSynchronizer};

const TICK: Duration = Duration::from_secs(1);

/// Requests from the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerInput {
    Move(Direction),
    Reset,
    /// A different player signed in
    IdentityChanged(Identity),
    Logout,
    /// Page/app teardown
    Exit,
}

/// Rendering collaborator.
pub trait Renderer: Send {
    /// Called after every operation that changed what is shown.
    fn render(&mut self, view: &SessionView);

    fn session_ended(&mut self, _event: &TerminalEvent) {}

    /// The player logged out; nothing is shown until a new session opens.
    fn session_closed(&mut self) {}
}

/// Results of background work, fed back into the loop.
#[derive(Debug)]
enum LoopEvent {
    ProfileLoaded {
        session_id: SessionId,
        snapshot: StatsSnapshot,
    },
    TilesLoaded(Vec<TileDefinition>),
}

pub struct GameLoop<R: Renderer> {
    manager: SessionManager,
    renderer: R,
    autosave_interval: Duration,
    events_tx: mpsc::UnboundedSender<LoopEvent>,
    events_rx: mpsc::UnboundedReceiver<LoopEvent>,
    tasks: JoinSet<()>,
}

impl<R: Renderer> GameLoop<R> {
    pub fn new(manager: SessionManager, renderer: R, autosave_interval: Duration) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            manager,
            renderer,
            autosave_interval,
            events_tx,
            events_rx,
            tasks: JoinSet::new(),
        }
    }

    /// Run until `Exit` or until the input channel closes.
    ///
    /// Returns the manager and renderer for inspection.
    pub async fn run(mut self, mut inputs: mpsc::Receiver<PlayerInput>) -> (SessionManager, R) {
        let mut ticker = time::interval_at(Instant::now() + TICK, TICK);
        let mut autosave = time::interval_at(
            Instant::now() + self.autosave_interval,
            self.autosave_interval,
        );

        self.session_opened();
        self.render();

        loop {
            let timer_token = self
                .manager
                .current()
                .and_then(|h| h.session().timer_token());

            tokio::select! {
                biased;

                input = inputs.recv() => match input {
                    Some(PlayerInput::Exit) | None => break,
                    Some(input) => self.handle_input(input, &mut ticker),
                },

                _ = ticker.tick(), if timer_token.is_some() => {
                    if let Some(token) = timer_token {
                        self.handle_tick(token);
                    }
                }

                _ = autosave.tick() => self.autosave(),

                Some(event) = self.events_rx.recv() => self.handle_event(event),

                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(err) = joined {
                        tracing::error!(error = %err, "Sync task failed");
                    }
                }
            }
        }

        self.shutdown().await;
        (self.manager, self.renderer)
    }

    fn handle_input(&mut self, input: PlayerInput, ticker: &mut Interval) {
        match input {
            PlayerInput::Move(direction) => self.handle_move(direction, ticker),
            PlayerInput::Reset => {
                if self.manager.reset_current().is_ok() {
                    self.render();
                }
            }
            PlayerInput::IdentityChanged(identity) => {
                if let Some(previous) = self.manager.replace_identity(identity) {
                    self.flush_abandoned(previous);
                }
                self.session_opened();
                self.render();
            }
            PlayerInput::Logout => {
                if let Some(previous) = self.manager.close() {
                    self.flush_abandoned(previous);
                }
                self.renderer.session_closed();
            }
            PlayerInput::Exit => {}
        }
    }

    fn handle_move(&mut self, direction: Direction, ticker: &mut Interval) {
        let Some(handle) = self.manager.current_mut() else {
            return;
        };
        let result = handle.session_mut().apply_move(direction);
        if !result.moved {
            return;
        }
        if result.timer_started.is_some() {
            ticker.reset();
        }
        if let Some(event) = result.ended {
            self.session_ended(event);
        }
        self.render();
    }

    fn handle_tick(&mut self, token: TimerToken) {
        let Some(handle) = self.manager.current_mut() else {
            return;
        };
        if let Some(event) = handle.session_mut().tick(token) {
            self.session_ended(event);
        }
        self.render();
    }

    fn handle_event(&mut self, event: LoopEvent) {
        match event {
            LoopEvent::ProfileLoaded {
                session_id,
                snapshot,
            } => {
                let Some(handle) = self.manager.current_mut() else {
                    return;
                };
                // A load for a replaced session is stale.
                if handle.id() != session_id {
                    return;
                }
                handle.session_mut().seed_best_score(snapshot.highest_score);
                self.render();
            }
            LoopEvent::TilesLoaded(tiles) => {
                if tiles.is_empty() {
                    return;
                }
                self.manager.apply_tile_catalog(&tiles);
                self.render();
            }
        }
    }

    fn current_sync(&self) -> Option<Arc<StatsSynchronizer>> {
        self.manager.current().and_then(|h| h.sync().cloned())
    }

    /// Kick off the profile and tile loads for a fresh session.
    fn session_opened(&mut self) {
        let Some(handle) = self.manager.current() else {
            return;
        };
        let session_id = handle.id();
        let Some(sync) = handle.sync().cloned() else {
            return;
        };

        let events = self.events_tx.clone();
        self.tasks.spawn(async move {
            let tiles = sync.load_tiles().await;
            let _ = events.send(LoopEvent::TilesLoaded(tiles));
            if let Some(snapshot) = sync.load_profile().await {
                let _ = events.send(LoopEvent::ProfileLoaded {
                    session_id,
                    snapshot,
                });
            }
        });
    }

    fn session_ended(&mut self, event: TerminalEvent) {
        tracing::info!(
            outcome = ?event.outcome,
            score = event.score,
            moves = event.moves,
            elapsed_secs = event.elapsed_secs,
            "Game over"
        );
        self.renderer.session_ended(&event);

        if let Some(sync) = self.current_sync() {
            self.tasks.spawn(async move {
                sync.finalize_sync(&event).await;
            });
        }
    }

    /// Write the unsynced play of a torn-down session. No game is counted.
    fn flush_abandoned(&mut self, handle: SessionHandle) {
        let progress = handle.session().progress();
        if let Some(sync) = handle.sync().cloned() {
            self.tasks.spawn(async move {
                sync.periodic_sync(&progress).await;
            });
        }
    }

    fn autosave(&mut self) {
        let Some(handle) = self.manager.current() else {
            return;
        };
        let progress = handle.session().progress();
        if let Some(sync) = handle.sync().cloned() {
            self.tasks.spawn(async move {
                sync.periodic_sync(&progress).await;
            });
        }
    }

    fn render(&mut self) {
        if let Some(handle) = self.manager.current() {
            self.renderer.render(&handle.session().view());
        }
    }

    /// Let in-flight syncs finish, then flush what is left.
    async fn shutdown(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(err) = joined {
                tracing::error!(error = %err, "Sync task failed");
            }
        }

        let pending = self.manager.current().and_then(|handle| {
            let progress = handle.session().progress();
            handle.sync().cloned().map(|sync| (sync, progress))
        });
        if let Some((sync, progress)) = pending {
            match tokio::task::spawn_blocking(move || sync.flush_on_exit(&progress)).await {
                Ok(outcome) => tracing::debug!(?outcome, "Exit flush finished"),
                Err(err) => tracing::error!(error = %err, "Exit flush task failed"),
            }
        }
        self.manager.close();
    }
}
