//! Tic-tac-toe board, rules and move oracle.

mod oracle;
mod position;
pub mod rules;
mod types;

pub use oracle::{Difficulty, MoveOracle, MovePolicy, best_move, random_move};
pub use position::Position;
pub use types::{Board, BoardError, EMPTY_SENTINEL, Mark, Square};
