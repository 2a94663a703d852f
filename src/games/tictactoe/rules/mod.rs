//! Game rules for tic-tac-toe.
//!
//! Pure functions for evaluating a board. Rules are kept apart from board
//! storage so the oracle and the session share one definition of a win.

pub mod draw;
pub mod win;

pub use draw::{is_draw, is_full};
pub use win::check_winner;

use super::{Board, Mark};

impl Board {
    /// Returns the marker of the first completed line, if any.
    pub fn winner(&self) -> Option<Mark> {
        check_winner(self)
    }

    /// True iff no empty cell remains.
    pub fn is_full(&self) -> bool {
        is_full(self)
    }

    /// True iff the board is won or full.
    pub fn is_terminal(&self) -> bool {
        self.winner().is_some() || self.is_full()
    }
}
