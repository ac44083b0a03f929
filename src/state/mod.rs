//! Game state module for Bakery 2048.
//!
//! - `board` - Grid engine (pure tile transformations)
//! - `session` - Timed session state machine
//! - `stats` - Durable profile statistics and their merge rules
//! - `tiles` - Tile configuration and the winning tile
//! - `rng` - Seedable RNG for tile spawns
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Session                             │
//! │                                                              │
//! │  input ──▶ apply_move ──▶ Board::shift ──▶ spawn_tile        │
//! │                               │                              │
//! │                               ▼                              │
//! │              score / moves / win-loss checks                 │
//! │                               │                              │
//! │  1s tick ──▶ Countdown ───────┤                              │
//! │                               ▼                              │
//! │                        TerminalEvent ────────────────────────┼──▶ sync
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing in this module performs I/O.

pub mod board;
pub mod rng;
pub mod session;
pub mod stats;
pub mod tiles;

pub use board::{
    is_tile_value, merge_line, spawn_tile, Board, BoardError, Direction, LineMerge, MoveOutcome,
    ParseDirectionError, Position, DEFAULT_GRID_SIZE,
};
pub use rng::TileRng;
pub use session::{
    format_clock, Countdown, MoveResult, Outcome, Session, SessionProgress, SessionSettings,
    SessionStatus, SessionView, TerminalEvent, TimerToken, DEFAULT_TIME_LIMIT_SECS,
    DEFAULT_WINNING_TILE,
};
pub use stats::{GameResult, ProgressDelta, StatsSnapshot};
pub use tiles::{parse_tile_table, winning_tile_value, TileDefinition};
