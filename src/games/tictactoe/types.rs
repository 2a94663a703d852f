//! Core domain types for tic-tac-toe.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::instrument;

/// Character used for an empty cell in the board record string.
pub const EMPTY_SENTINEL: char = '-';

/// A player's marker.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Mark {
    /// Marker X (always moves first).
    X,
    /// Marker O.
    O,
}

impl Mark {
    /// Returns the opposing marker.
    pub fn opponent(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }

    fn to_char(self) -> char {
        match self {
            Mark::X => 'X',
            Mark::O => 'O',
        }
    }
}

/// A cell on the tic-tac-toe board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Square {
    /// Empty cell.
    Empty,
    /// Cell holding a marker.
    Occupied(Mark),
}

/// Error raised by board mutation or parsing.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum BoardError {
    /// The target cell already holds a marker.
    #[display("Cell {} is already occupied", _0)]
    CellOccupied(usize),

    /// The index is not one of the nine cells.
    #[display("Cell {} is out of range (0-8)", _0)]
    OutOfRange(usize),

    /// A record string could not be parsed.
    #[display("Malformed board record: {}", _0)]
    Malformed(String),
}

impl std::error::Error for BoardError {}

/// 3x3 tic-tac-toe board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Board {
    /// Squares in row-major order (0-8).
    squares: [Square; 9],
}

impl Board {
    /// Creates a new empty board.
    pub fn new() -> Self {
        Self {
            squares: [Square::Empty; 9],
        }
    }

    /// Gets the square at the given index (0-8).
    pub fn get(&self, index: usize) -> Option<Square> {
        self.squares.get(index).copied()
    }

    /// Checks if a cell is empty. Out-of-range indices are never empty.
    pub fn is_empty(&self, index: usize) -> bool {
        matches!(self.get(index), Some(Square::Empty))
    }

    /// Places `mark` at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::CellOccupied`] if the cell holds a marker and
    /// [`BoardError::OutOfRange`] if `index` is not a cell.
    pub fn place(&mut self, index: usize, mark: Mark) -> Result<(), BoardError> {
        match self.squares.get_mut(index) {
            None => Err(BoardError::OutOfRange(index)),
            Some(Square::Occupied(_)) => Err(BoardError::CellOccupied(index)),
            Some(cell) => {
                *cell = Square::Occupied(mark);
                Ok(())
            }
        }
    }

    /// Returns a copy of the board with `mark` placed at `index`.
    ///
    /// The caller must have checked that the cell is empty.
    pub(crate) fn with(mut self, index: usize, mark: Mark) -> Self {
        self.squares[index] = Square::Occupied(mark);
        self
    }

    /// Returns all squares as a slice.
    pub fn squares(&self) -> &[Square; 9] {
        &self.squares
    }

    /// Returns the indices of empty cells in ascending order.
    pub fn empty_cells(&self) -> Vec<usize> {
        self.squares
            .iter()
            .enumerate()
            .filter(|(_, sq)| **sq == Square::Empty)
            .map(|(i, _)| i)
            .collect()
    }

    /// Counts the markers placed so far.
    pub fn occupied_count(&self) -> usize {
        9 - self.empty_cells().len()
    }

    /// Encodes the board as its 9-character record form.
    pub fn to_record_string(&self) -> String {
        self.squares
            .iter()
            .map(|sq| match sq {
                Square::Empty => EMPTY_SENTINEL,
                Square::Occupied(mark) => mark.to_char(),
            })
            .collect()
    }

    /// Formats the board as a human-readable string.
    pub fn display(&self) -> String {
        let mut result = String::new();
        for row in 0..3 {
            for col in 0..3 {
                let pos = row * 3 + col;
                let symbol = match self.squares[pos] {
                    Square::Empty => pos.to_string(),
                    Square::Occupied(mark) => mark.to_string(),
                };
                result.push_str(&symbol);
                if col < 2 {
                    result.push('|');
                }
            }
            if row < 2 {
                result.push_str("\n-+-+-\n");
            }
        }
        result
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for Board {
    type Err = BoardError;

    #[instrument]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != 9 {
            return Err(BoardError::Malformed(format!(
                "expected 9 cells, got {}",
                chars.len()
            )));
        }

        let mut board = Board::new();
        for (i, c) in chars.into_iter().enumerate() {
            board.squares[i] = match c {
                EMPTY_SENTINEL => Square::Empty,
                'X' => Square::Occupied(Mark::X),
                'O' => Square::Occupied(Mark::O),
                other => {
                    return Err(BoardError::Malformed(format!(
                        "unknown cell '{}' at {}",
                        other, i
                    )));
                }
            };
        }
        Ok(board)
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_record_string())
    }
}
