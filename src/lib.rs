//! Bakery 2048 State Library
//!
//! This crate provides the game core for Bakery 2048: a sliding-tile grid
//! engine, a timed session state machine and a synchronizer that keeps the
//! player's profile statistics in step with a remote store.
//!
//! # Overview
//!
//! - **Grid Engine** - Pure transformations over a square board: merging
//!   lines, shifting in four directions, spawning tiles, terminal detection.
//!
//! - **Session** - Idle → Active → Won / Lost / TimedOut, with score, move
//!   count and a seven minute countdown that starts on the first move.
//!
//! - **Stats Synchronizer** - Periodic, final and exit-time writes of the
//!   player's aggregate statistics. Failures are logged, never surfaced to
//!   gameplay.
//!
//! - **Session Manager / Game Loop** - One explicit session handle, replaced
//!   on identity change, driven by a single cooperative task.
//!
//! # Design Principles
//!
//! 1. **The engine never fails** - Once a `Board` exists every operation on
//!    it is total. Validation happens at the edges (`Board::from_rows`,
//!    `Direction::from_str`).
//!
//! 2. **Moves after the end are ignored** - Terminal sessions never mutate.
//!
//! 3. **Sync is best effort** - The store is re-read before every write and
//!    only unreported progress is added.
//!
//! 4. **Serialization-ready** - Views and snapshots convert to JSON.
//!
//! # Example
//!
//! ```rust
//! use bakery_state::state::{merge_line, Board, Direction, Session, SessionSettings, TileRng};
//!
//! assert_eq!(merge_line(&[2, 2, 4, 4]).tiles, vec![4, 8, 0, 0]);
//!
//! let board = Board::from_rows(vec![vec![2, 4], vec![8, 16]]).unwrap();
//! assert!(board.is_terminal());
//!
//! let mut session = Session::new(SessionSettings::default(), TileRng::new(7));
//! let moved = Direction::ALL
//!     .into_iter()
//!     .any(|direction| session.apply_move(direction).moved);
//! assert!(moved);
//! assert!(session.countdown().is_running());
//! ```

pub mod config;
pub mod driver;
pub mod manager;
pub mod state;
pub mod sync;
pub mod telemetry;

// Re-export everything from state module at crate root
pub use state::*;
