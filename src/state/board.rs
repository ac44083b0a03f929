//! Grid engine.
//!
//! Pure board transformations: sliding and merging lines, spawning tiles,
//! and detecting terminal boards. Nothing here performs I/O; the only source
//! of nondeterminism is the RNG handed to [`spawn_tile`].

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default board side.
pub const DEFAULT_GRID_SIZE: usize = 4;

/// Probability that a spawned tile is a 2 (otherwise 4).
pub const SPAWN_TWO_PROBABILITY: f64 = 0.9;

/// Check that a value may appear on the board as a tile.
pub fn is_tile_value(value: u32) -> bool {
    value >= 2 && value.is_power_of_two()
}

/// Move direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Self::Left, Self::Right, Self::Up, Self::Down];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    /// Lines run along rows for horizontal moves, along columns otherwise.
    fn is_horizontal(&self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }

    /// `Right` and `Down` mirror `Left` and `Up`.
    fn is_reversed(&self) -> bool {
        matches!(self, Self::Right | Self::Down)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an input key that does not name a direction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown direction '{0}'")]
pub struct ParseDirectionError(pub String);

impl FromStr for Direction {
    type Err = ParseDirectionError;

    /// Accepts arrow key names as well as plain direction names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ArrowLeft" | "left" | "Left" => Ok(Self::Left),
            "ArrowRight" | "right" | "Right" => Ok(Self::Right),
            "ArrowUp" | "up" | "Up" => Ok(Self::Up),
            "ArrowDown" | "down" | "Down" => Ok(Self::Down),
            other => Err(ParseDirectionError(other.to_string())),
        }
    }
}

/// Board cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Errors building a board from external rows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("board must have at least one row")]
    Empty,

    #[error("row {row} has {len} cells, expected {expected}")]
    NotSquare {
        row: usize,
        len: usize,
        expected: usize,
    },

    #[error("value {value} at ({row}, {col}) is not a tile value")]
    InvalidValue { row: usize, col: usize, value: u32 },
}

/// Result of merging a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMerge {
    pub tiles: Vec<u32>,
    /// Sum of the tiles produced by merges.
    pub score: u64,
}

/// Merge one line towards its start.
///
/// Compacts out zeros, merges each adjacent equal pair once (left to right),
/// compacts again and pads with zeros back to the input length. A tile
/// produced by a merge never merges again in the same pass, so `[2, 2, 2, 0]`
/// becomes `[4, 2, 0, 0]`.
pub fn merge_line(line: &[u32]) -> LineMerge {
    let mut tiles: Vec<u32> = line.iter().copied().filter(|&v| v != 0).collect();
    let mut score = 0u64;

    let mut i = 0;
    while i + 1 < tiles.len() {
        if tiles[i] == tiles[i + 1] {
            tiles[i] *= 2;
            tiles[i + 1] = 0;
            score += u64::from(tiles[i]);
            i += 2;
        } else {
            i += 1;
        }
    }

    tiles.retain(|&v| v != 0);
    tiles.resize(line.len(), 0);

    LineMerge { tiles, score }
}

/// Result of shifting a whole board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MoveOutcome {
    /// Whether any cell changed value.
    pub moved: bool,
    /// Score gained from merges.
    pub score: u64,
}

/// Square grid of tile values, row-major. Zero is an empty cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Board {
    size: usize,
    cells: Vec<u32>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_SIZE)
    }
}

impl Board {
    /// Create an empty board with the given side.
    pub fn new(size: usize) -> Self {
        debug_assert!(size > 0, "board side must be positive");
        Self {
            size,
            cells: vec![0; size * size],
        }
    }

    /// Build a board from rows, validating shape and tile values.
    pub fn from_rows(rows: Vec<Vec<u32>>) -> Result<Self, BoardError> {
        let size = rows.len();
        if size == 0 {
            return Err(BoardError::Empty);
        }

        let mut cells = Vec::with_capacity(size * size);
        for (row, values) in rows.into_iter().enumerate() {
            if values.len() != size {
                return Err(BoardError::NotSquare {
                    row,
                    len: values.len(),
                    expected: size,
                });
            }
            for (col, value) in values.into_iter().enumerate() {
                if value != 0 && !is_tile_value(value) {
                    return Err(BoardError::InvalidValue { row, col, value });
                }
                cells.push(value);
            }
        }

        Ok(Self { size, cells })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Row-major cell values.
    pub fn cells(&self) -> &[u32] {
        &self.cells
    }

    /// Get the value at a position.
    pub fn get(&self, pos: Position) -> Option<u32> {
        if pos.row < self.size && pos.col < self.size {
            Some(self.cells[pos.row * self.size + pos.col])
        } else {
            None
        }
    }

    fn set(&mut self, pos: Position, value: u32) {
        debug_assert!(value == 0 || is_tile_value(value));
        self.cells[pos.row * self.size + pos.col] = value;
    }

    /// Copy of the board as nested rows, for rendering.
    pub fn rows(&self) -> Vec<Vec<u32>> {
        self.cells.chunks(self.size).map(<[u32]>::to_vec).collect()
    }

    /// All empty cells in row-major order.
    pub fn empty_cells(&self) -> Vec<Position> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, &v)| v == 0)
            .map(|(i, _)| Position::new(i / self.size, i % self.size))
            .collect()
    }

    pub fn count_empty(&self) -> usize {
        self.cells.iter().filter(|&&v| v == 0).count()
    }

    pub fn count_tiles(&self) -> usize {
        self.cells.len() - self.count_empty()
    }

    /// Largest tile on the board (0 if empty).
    pub fn highest_tile(&self) -> u32 {
        self.cells.iter().copied().max().unwrap_or(0)
    }

    /// Check if any cell holds exactly `target`.
    pub fn has_reached_value(&self, target: u32) -> bool {
        self.cells.iter().any(|&v| v == target)
    }

    /// Check if no move is left: board full and no equal neighbours.
    pub fn is_terminal(&self) -> bool {
        if self.cells.contains(&0) {
            return false;
        }

        for row in 0..self.size {
            for col in 0..self.size {
                let value = self.cells[row * self.size + col];
                if col + 1 < self.size && value == self.cells[row * self.size + col + 1] {
                    return false;
                }
                if row + 1 < self.size && value == self.cells[(row + 1) * self.size + col] {
                    return false;
                }
            }
        }

        true
    }

    /// Positions of line `index`, ordered in the direction tiles slide towards.
    fn line_positions(&self, direction: Direction, index: usize) -> Vec<Position> {
        let mut positions: Vec<Position> = (0..self.size)
            .map(|k| {
                if direction.is_horizontal() {
                    Position::new(index, k)
                } else {
                    Position::new(k, index)
                }
            })
            .collect();
        if direction.is_reversed() {
            positions.reverse();
        }
        positions
    }

    /// Slide and merge every line in the given direction.
    pub fn shift(&mut self, direction: Direction) -> MoveOutcome {
        let mut outcome = MoveOutcome::default();

        for index in 0..self.size {
            let positions = self.line_positions(direction, index);
            let line: Vec<u32> = positions
                .iter()
                .map(|p| self.cells[p.row * self.size + p.col])
                .collect();

            let merged = merge_line(&line);
            if merged.tiles != line {
                outcome.moved = true;
            }
            outcome.score += merged.score;

            for (pos, value) in positions.into_iter().zip(merged.tiles) {
                self.set(pos, value);
            }
        }

        outcome
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(self.size) {
            let cells: Vec<String> = row
                .iter()
                .map(|&v| {
                    if v == 0 {
                        format!("{:>5}", ".")
                    } else {
                        format!("{:>5}", v)
                    }
                })
                .collect();
            writeln!(f, "{}", cells.join(""))?;
        }
        Ok(())
    }
}

/// Place a 2 (90%) or 4 (10%) on a uniformly chosen empty cell.
///
/// Returns the filled position, or `None` when the board is full.
pub fn spawn_tile<R: Rng + ?Sized>(board: &mut Board, rng: &mut R) -> Option<Position> {
    let empty = board.empty_cells();
    if empty.is_empty() {
        return None;
    }

    let pos = empty[rng.gen_range(0..empty.len())];
    let value = if rng.gen_bool(SPAWN_TWO_PROBABILITY) { 2 } else { 4 };
    board.set(pos, value);
    Some(pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn board(rows: Vec<Vec<u32>>) -> Board {
        Board::from_rows(rows).unwrap()
    }

    #[test]
    fn test_merge_line_examples() {
        assert_eq!(merge_line(&[2, 2, 0, 0]).tiles, vec![4, 0, 0, 0]);
        assert_eq!(merge_line(&[2, 2, 4, 4]).tiles, vec![4, 8, 0, 0]);
        assert_eq!(merge_line(&[2, 2, 2, 0]).tiles, vec![4, 2, 0, 0]);
        assert_eq!(merge_line(&[2, 4, 8, 16]).tiles, vec![2, 4, 8, 16]);
        assert_eq!(merge_line(&[2, 0, 2, 0]).tiles, vec![4, 0, 0, 0]);
        assert_eq!(merge_line(&[0, 0, 0, 0]).tiles, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_merge_line_pairs_left_to_right() {
        let merged = merge_line(&[2, 2, 2, 2]);
        assert_eq!(merged.tiles, vec![4, 4, 0, 0]);
        assert_eq!(merged.score, 8);
    }

    #[test]
    fn test_merge_line_score() {
        assert_eq!(merge_line(&[2, 2, 4, 4]).score, 12);
        assert_eq!(merge_line(&[2, 4, 8, 16]).score, 0);
        assert_eq!(merge_line(&[0, 8, 0, 8]).score, 16);
    }

    #[test]
    fn test_shift_left_and_right() {
        let mut b = board(vec![
            vec![2, 2, 0, 0],
            vec![0, 0, 0, 0],
            vec![4, 0, 4, 8],
            vec![2, 4, 8, 16],
        ]);
        let outcome = b.shift(Direction::Right);
        assert!(outcome.moved);
        assert_eq!(outcome.score, 12);
        assert_eq!(
            b.rows(),
            vec![
                vec![0, 0, 0, 4],
                vec![0, 0, 0, 0],
                vec![0, 0, 8, 8],
                vec![2, 4, 8, 16],
            ]
        );

        let outcome = b.shift(Direction::Left);
        assert!(outcome.moved);
        assert_eq!(outcome.score, 16);
        assert_eq!(b.rows()[2], vec![16, 0, 0, 0]);
    }

    #[test]
    fn test_shift_up_and_down() {
        let mut b = board(vec![
            vec![2, 0, 0, 0],
            vec![2, 0, 0, 0],
            vec![2, 0, 0, 4],
            vec![0, 0, 0, 4],
        ]);
        let outcome = b.shift(Direction::Down);
        assert!(outcome.moved);
        assert_eq!(
            b.rows(),
            vec![
                vec![0, 0, 0, 0],
                vec![0, 0, 0, 0],
                vec![2, 0, 0, 0],
                vec![4, 0, 0, 8],
            ]
        );

        b.shift(Direction::Up);
        assert_eq!(b.rows()[0], vec![2, 0, 0, 8]);
        assert_eq!(b.rows()[1], vec![4, 0, 0, 0]);
    }

    #[test]
    fn test_shift_without_change() {
        let mut b = board(vec![
            vec![2, 4, 8, 16],
            vec![0, 0, 0, 0],
            vec![0, 0, 0, 0],
            vec![0, 0, 0, 0],
        ]);
        let before = b.clone();
        let outcome = b.shift(Direction::Left);
        assert!(!outcome.moved);
        assert_eq!(outcome.score, 0);
        assert_eq!(b, before);
    }

    #[test]
    fn test_is_terminal() {
        assert!(board(vec![vec![2, 4], vec![8, 16]]).is_terminal());
        assert!(!board(vec![vec![2, 2], vec![8, 16]]).is_terminal());
        assert!(!board(vec![vec![2, 4], vec![2, 16]]).is_terminal());
        assert!(!board(vec![vec![2, 0], vec![8, 16]]).is_terminal());
        assert!(!Board::new(4).is_terminal());
    }

    #[test]
    fn test_has_reached_value() {
        let b = board(vec![vec![2, 4], vec![8, 512]]);
        assert!(b.has_reached_value(512));
        assert!(!b.has_reached_value(1024));
        assert_eq!(b.highest_tile(), 512);
    }

    #[test]
    fn test_from_rows_validation() {
        assert_eq!(Board::from_rows(vec![]), Err(BoardError::Empty));
        assert_eq!(
            Board::from_rows(vec![vec![2, 4], vec![2]]),
            Err(BoardError::NotSquare {
                row: 1,
                len: 1,
                expected: 2
            })
        );
        assert_eq!(
            Board::from_rows(vec![vec![2, 3], vec![0, 0]]),
            Err(BoardError::InvalidValue {
                row: 0,
                col: 1,
                value: 3
            })
        );
        assert!(Board::from_rows(vec![vec![1, 0], vec![0, 0]]).is_err());
    }

    #[test]
    fn test_spawn_tile() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut b = Board::new(4);

        for filled in 1..=16 {
            let pos = spawn_tile(&mut b, &mut rng).unwrap();
            let value = b.get(pos).unwrap();
            assert!(value == 2 || value == 4);
            assert_eq!(b.count_tiles(), filled);
        }

        let full = b.clone();
        assert_eq!(spawn_tile(&mut b, &mut rng), None);
        assert_eq!(b, full);
    }

    #[test]
    fn test_spawn_tile_is_reproducible() {
        let mut a = Board::new(4);
        let mut b = Board::new(4);
        let mut rng_a = ChaCha8Rng::seed_from_u64(99);
        let mut rng_b = ChaCha8Rng::seed_from_u64(99);

        for _ in 0..6 {
            spawn_tile(&mut a, &mut rng_a);
            spawn_tile(&mut b, &mut rng_b);
        }
        assert_eq!(a, b);
    }

    #[test]
    fn test_spawn_tile_mostly_twos() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut twos = 0;
        for _ in 0..1000 {
            let mut b = Board::new(2);
            let pos = spawn_tile(&mut b, &mut rng).unwrap();
            if b.get(pos) == Some(2) {
                twos += 1;
            }
        }
        assert!((850..=950).contains(&twos), "got {} twos", twos);
    }

    #[test]
    fn test_parse_direction() {
        assert_eq!("ArrowLeft".parse(), Ok(Direction::Left));
        assert_eq!("down".parse(), Ok(Direction::Down));
        assert_eq!(
            "Space".parse::<Direction>(),
            Err(ParseDirectionError("Space".to_string()))
        );
    }

    fn tile_line() -> impl Strategy<Value = Vec<u32>> {
        prop::collection::vec(prop_oneof![Just(0u32), (1u32..12).prop_map(|e| 1 << e)], 1..8)
    }

    proptest! {
        #[test]
        fn prop_merge_line_conserves_length_and_sum(line in tile_line()) {
            let merged = merge_line(&line);
            prop_assert_eq!(merged.tiles.len(), line.len());
            let before: u64 = line.iter().map(|&v| u64::from(v)).sum();
            let after: u64 = merged.tiles.iter().map(|&v| u64::from(v)).sum();
            prop_assert_eq!(before, after);
        }

        #[test]
        fn prop_merge_line_is_compacted(line in tile_line()) {
            let merged = merge_line(&line);
            let first_zero = merged.tiles.iter().position(|&v| v == 0).unwrap_or(merged.tiles.len());
            prop_assert!(merged.tiles[first_zero..].iter().all(|&v| v == 0));
        }
    }
}
