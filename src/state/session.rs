//! Timed game session.
//!
//! Wraps the grid engine with score, move count, countdown and the
//! win/lose/timeout lifecycle.
//!
//! # State Diagram
//!
//! ```text
//!            first move          board reaches winning tile
//! ┌──────┐ ───────────▶ ┌────────┐ ─────────────────────────▶ ┌─────┐
//! │ Idle │              │ Active │                            │ Won │
//! └──────┘              └────────┘ ──────────┐                └─────┘
//!    ▲                     │   no move left  │ countdown hits 0
//!    │                     ▼                 ▼
//!    │                 ┌──────┐        ┌──────────┐
//!    │                 │ Lost │        │ TimedOut │
//!    │                 └──────┘        └──────────┘
//!    │        reset (from any state)        │
//!    └──────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use super::board::{spawn_tile, Board, Direction, DEFAULT_GRID_SIZE};
use super::rng::TileRng;

/// Default countdown length (7 minutes).
pub const DEFAULT_TIME_LIMIT_SECS: u32 = 420;

/// Winning tile when no tile table is configured.
pub const DEFAULT_WINNING_TILE: u32 = 512;

/// Number of tiles placed on a fresh board.
pub const STARTING_TILES: usize = 2;

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Board populated, timer not started
    #[default]
    Idle,
    /// Timer running, moves accepted
    Active,
    /// Winning tile reached
    Won,
    /// No move left
    Lost,
    /// Countdown reached zero
    TimedOut,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Won => "won",
            Self::Lost => "lost",
            Self::TimedOut => "timed_out",
        }
    }

    /// Check if moves are accepted.
    pub fn accepts_moves(&self) -> bool {
        matches!(self, Self::Idle | Self::Active)
    }

    /// Check if the game is over.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Won | Self::Lost | Self::TimedOut)
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            Self::Won => Some(Outcome::Won),
            Self::Lost => Some(Outcome::Lost),
            Self::TimedOut => Some(Outcome::TimedOut),
            Self::Idle | Self::Active => None,
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Won,
    Lost,
    TimedOut,
}

impl Outcome {
    pub fn is_win(&self) -> bool {
        matches!(self, Self::Won)
    }

    fn status(&self) -> SessionStatus {
        match self {
            Self::Won => SessionStatus::Won,
            Self::Lost => SessionStatus::Lost,
            Self::TimedOut => SessionStatus::TimedOut,
        }
    }
}

/// Notification emitted exactly once when a session ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerminalEvent {
    pub outcome: Outcome,
    pub score: u64,
    pub highest_tile: u32,
    pub moves: u32,
    pub elapsed_secs: u32,
}

/// Identifies one run of the countdown.
///
/// Every start or reset of the countdown issues a new token, so a tick
/// carrying an old token is recognised as stale and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

/// One-second countdown.
#[derive(Debug, Clone)]
pub struct Countdown {
    limit_secs: u32,
    remaining_secs: u32,
    running: bool,
    generation: u64,
}

impl Countdown {
    pub fn new(limit_secs: u32) -> Self {
        Self {
            limit_secs,
            remaining_secs: limit_secs,
            running: false,
            generation: 0,
        }
    }

    fn start(&mut self) -> TimerToken {
        self.generation += 1;
        self.running = true;
        TimerToken(self.generation)
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn reset(&mut self) {
        self.generation += 1;
        self.running = false;
        self.remaining_secs = self.limit_secs;
    }

    /// Count down one second. Returns true when time ran out on this tick.
    fn tick(&mut self, token: TimerToken) -> bool {
        if !self.running || token.0 != self.generation || self.remaining_secs == 0 {
            return false;
        }
        self.remaining_secs -= 1;
        if self.remaining_secs == 0 {
            self.running = false;
            return true;
        }
        false
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Token of the current run, if the countdown is running.
    pub fn token(&self) -> Option<TimerToken> {
        self.running.then_some(TimerToken(self.generation))
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn limit_secs(&self) -> u32 {
        self.limit_secs
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.limit_secs - self.remaining_secs
    }
}

/// Format seconds as `M:SS`.
pub fn format_clock(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Parameters for new sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub grid_size: usize,
    pub time_limit_secs: u32,
    pub winning_tile: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            time_limit_secs: DEFAULT_TIME_LIMIT_SECS,
            winning_tile: DEFAULT_WINNING_TILE,
        }
    }
}

/// Result of applying a move.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MoveResult {
    /// Whether the board changed.
    pub moved: bool,
    pub score_gained: u64,
    /// Countdown token when this move started the timer.
    pub timer_started: Option<TimerToken>,
    /// Set when this move ended the game.
    pub ended: Option<TerminalEvent>,
}

/// Progress figures the stats synchronizer reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProgress {
    pub status: SessionStatus,
    pub moves: u32,
    pub elapsed_secs: u32,
    pub highest_tile: u32,
}

/// Everything the UI needs to draw the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub board: Vec<Vec<u32>>,
    pub score: u64,
    pub best_score: u64,
    pub status: SessionStatus,
    pub remaining_secs: u32,
    pub moves: u32,
    pub highest_tile: u32,
    pub winning_tile: u32,
}

impl SessionView {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "board": self.board,
            "score": self.score,
            "best_score": self.best_score,
            "status": self.status.as_str(),
            "time_remaining": format_clock(self.remaining_secs),
            "moves": self.moves,
            "highest_tile": self.highest_tile,
            "winning_tile": self.winning_tile
        })
    }
}

/// A single game instance.
#[derive(Debug, Clone)]
pub struct Session {
    board: Board,

    /// Current status
    status: SessionStatus,

    /// Cumulative merge score
    score: u64,

    /// Best score known for the player, including this session
    best_score: u64,

    /// Accepted moves
    moves: u32,

    /// Largest tile seen this session
    highest_tile: u32,

    /// Tile value that wins the game
    winning_tile: u32,

    countdown: Countdown,

    settings: SessionSettings,

    rng: TileRng,

    /// When the first move was made
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,

    /// When the session reached a terminal state
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Session {
    /// Create an idle session with two starting tiles.
    pub fn new(settings: SessionSettings, rng: TileRng) -> Self {
        let mut session = Self::with_board(settings, Board::new(settings.grid_size), rng);
        session.populate();
        session
    }

    /// Create an idle session over an existing board.
    pub fn with_board(settings: SessionSettings, board: Board, rng: TileRng) -> Self {
        let highest_tile = board.highest_tile();
        Self {
            board,
            status: SessionStatus::Idle,
            score: 0,
            best_score: 0,
            moves: 0,
            highest_tile,
            winning_tile: settings.winning_tile,
            countdown: Countdown::new(settings.time_limit_secs),
            settings,
            rng,
            started_at: None,
            ended_at: None,
        }
    }

    fn populate(&mut self) {
        for _ in 0..STARTING_TILES {
            spawn_tile(&mut self.board, &mut self.rng);
        }
        self.highest_tile = self.board.highest_tile();
    }

    /// Apply a player move.
    ///
    /// Ignored once the session is over. A move that changes nothing is
    /// ignored too and does not start the timer.
    pub fn apply_move(&mut self, direction: Direction) -> MoveResult {
        if !self.status.accepts_moves() {
            return MoveResult::default();
        }

        let outcome = self.board.shift(direction);
        if !outcome.moved {
            return MoveResult::default();
        }

        spawn_tile(&mut self.board, &mut self.rng);
        self.moves += 1;
        self.score += outcome.score;
        self.best_score = self.best_score.max(self.score);
        self.highest_tile = self.highest_tile.max(self.board.highest_tile());

        let mut result = MoveResult {
            moved: true,
            score_gained: outcome.score,
            ..MoveResult::default()
        };

        if self.status == SessionStatus::Idle {
            self.status = SessionStatus::Active;
            self.started_at = Some(chrono::Utc::now());
            result.timer_started = Some(self.countdown.start());
        }

        if self.board.has_reached_value(self.winning_tile) {
            result.ended = Some(self.finish(Outcome::Won));
        } else if self.board.is_terminal() {
            result.ended = Some(self.finish(Outcome::Lost));
        }

        result
    }

    /// Handle one countdown tick.
    ///
    /// Stale tokens (from before a reset or after the timer stopped) are
    /// ignored.
    pub fn tick(&mut self, token: TimerToken) -> Option<TerminalEvent> {
        if self.status != SessionStatus::Active {
            return None;
        }
        if self.countdown.tick(token) {
            return Some(self.finish(Outcome::TimedOut));
        }
        None
    }

    fn finish(&mut self, outcome: Outcome) -> TerminalEvent {
        self.countdown.stop();
        self.status = outcome.status();
        self.ended_at = Some(chrono::Utc::now());

        TerminalEvent {
            outcome,
            score: self.score,
            highest_tile: self.highest_tile,
            moves: self.moves,
            elapsed_secs: self.countdown.elapsed_secs(),
        }
    }

    /// Start over with a fresh board. Cancels the running countdown.
    pub fn reset(&mut self) {
        self.countdown.reset();
        self.board = Board::new(self.settings.grid_size);
        self.status = SessionStatus::Idle;
        self.score = 0;
        self.moves = 0;
        self.winning_tile = self.settings.winning_tile;
        self.started_at = None;
        self.ended_at = None;
        self.populate();
    }

    /// Stop the countdown without ending the game (session teardown).
    pub fn stop_timer(&mut self) {
        self.countdown.stop();
    }

    /// Change the winning tile. Only takes effect before the first move.
    pub fn set_winning_tile(&mut self, value: u32) -> bool {
        self.settings.winning_tile = value;
        if self.status == SessionStatus::Idle {
            self.winning_tile = value;
            return true;
        }
        false
    }

    /// Raise the best score to a previously recorded value.
    pub fn seed_best_score(&mut self, best: u64) {
        self.best_score = self.best_score.max(best);
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn best_score(&self) -> u64 {
        self.best_score
    }

    pub fn moves(&self) -> u32 {
        self.moves
    }

    pub fn highest_tile(&self) -> u32 {
        self.highest_tile
    }

    pub fn winning_tile(&self) -> u32 {
        self.winning_tile
    }

    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    pub fn timer_token(&self) -> Option<TimerToken> {
        self.countdown.token()
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.countdown.elapsed_secs()
    }

    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            status: self.status,
            moves: self.moves,
            elapsed_secs: self.elapsed_secs(),
            highest_tile: self.highest_tile,
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            board: self.board.rows(),
            score: self.score,
            best_score: self.best_score,
            status: self.status,
            remaining_secs: self.countdown.remaining_secs(),
            moves: self.moves,
            highest_tile: self.highest_tile,
            winning_tile: self.winning_tile,
        }
    }
}
