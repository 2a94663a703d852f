//! Move selection for the automated opponent.
//!
//! The oracle runs a plain minimax search over the remaining empty cells.
//! Difficulty never weakens the search itself; it only decides, per turn,
//! whether to play the searched move or a uniformly random legal one.

use super::{Board, Mark};
use derive_getters::Getters;
use rand::Rng;
use rand::prelude::IndexedRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Score of a position where the acting marker has completed a line.
const WIN_SCORE: i32 = 10;

/// Strength of the automated opponent.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Difficulty {
    /// Random move 70% of the time by default.
    Easy,
    /// Random move 50% of the time by default.
    Medium,
    /// Always the searched move.
    #[default]
    Hard,
}

/// How a single oracle turn picks its move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MovePolicy {
    /// Full-depth minimax every turn.
    Optimal,
    /// A random legal move with probability `random_chance`, otherwise
    /// minimax bounded by `max_depth` (unbounded when `None`).
    Mixed {
        /// Probability of playing a random legal move.
        random_chance: f64,
        /// Search depth bound for the non-random branch.
        max_depth: Option<usize>,
    },
}

/// Minimax move oracle with a difficulty policy layer.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
pub struct MoveOracle {
    /// Chance of a random move on [`Difficulty::Easy`].
    easy_random_chance: f64,
    /// Chance of a random move on [`Difficulty::Medium`].
    medium_random_chance: f64,
    /// Optional depth bound applied to easy and medium searches.
    max_depth: Option<usize>,
}

impl Default for MoveOracle {
    fn default() -> Self {
        Self::new(0.7, 0.5, None)
    }
}

impl MoveOracle {
    /// Creates an oracle. Chances are clamped to `0.0..=1.0`; NaN counts as 0.
    pub fn new(easy_random_chance: f64, medium_random_chance: f64, max_depth: Option<usize>) -> Self {
        Self {
            easy_random_chance: clamp_chance(easy_random_chance),
            medium_random_chance: clamp_chance(medium_random_chance),
            max_depth,
        }
    }

    /// Maps a difficulty level to its move policy.
    pub fn policy(&self, difficulty: Difficulty) -> MovePolicy {
        match difficulty {
            Difficulty::Hard => MovePolicy::Optimal,
            Difficulty::Medium => MovePolicy::Mixed {
                random_chance: self.medium_random_chance,
                max_depth: self.max_depth,
            },
            Difficulty::Easy => MovePolicy::Mixed {
                random_chance: self.easy_random_chance,
                max_depth: self.max_depth,
            },
        }
    }

    /// Picks the cell `mark` should play at the given difficulty.
    ///
    /// Returns `None` only when the board has no empty cell. The board is
    /// never modified.
    #[instrument(skip(self, board, rng), fields(board = %board))]
    pub fn select_move<R: Rng + ?Sized>(
        &self,
        board: &Board,
        mark: Mark,
        difficulty: Difficulty,
        rng: &mut R,
    ) -> Option<usize> {
        let choice = match self.policy(difficulty) {
            MovePolicy::Optimal => best_move(board, mark, None),
            MovePolicy::Mixed {
                random_chance,
                max_depth,
            } => {
                if rng.random_bool(random_chance) {
                    debug!("Playing a random move");
                    random_move(board, rng)
                } else {
                    best_move(board, mark, max_depth)
                }
            }
        };

        debug!(?choice, "Oracle selected move");
        choice
    }
}

fn clamp_chance(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}

/// Returns a uniformly random empty cell, or `None` on a full board.
pub fn random_move<R: Rng + ?Sized>(board: &Board, rng: &mut R) -> Option<usize> {
    board.empty_cells().choose(rng).copied()
}

/// Returns the minimax-optimal cell for `mark`.
///
/// Cells are tried in ascending order and a later cell only replaces the
/// current best when its score is strictly greater, so ties resolve to the
/// lowest index.
pub fn best_move(board: &Board, mark: Mark, max_depth: Option<usize>) -> Option<usize> {
    let mut best: Option<(usize, i32)> = None;

    for index in board.empty_cells() {
        let score = minimax(&board.with(index, mark), mark.opponent(), mark, 1, max_depth);
        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((index, score));
        }
    }

    best.map(|(index, _)| index)
}

/// Scores `board` from `me`'s point of view with `to_move` about to play.
fn minimax(board: &Board, to_move: Mark, me: Mark, depth: usize, max_depth: Option<usize>) -> i32 {
    if let Some(winner) = board.winner() {
        return if winner == me { WIN_SCORE } else { -WIN_SCORE };
    }
    if board.is_full() {
        return 0;
    }
    if max_depth.is_some_and(|limit| depth >= limit) {
        return 0;
    }

    let scores = board
        .empty_cells()
        .into_iter()
        .map(|index| minimax(&board.with(index, to_move), to_move.opponent(), me, depth + 1, max_depth));

    let best = if to_move == me { scores.max() } else { scores.min() };
    best.unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn board(record: &str) -> Board {
        record.parse().expect("valid record")
    }

    /// Plays every possible opposing line against the hard oracle and
    /// returns the worst result seen for the oracle's side.
    fn worst_outcome(board: Board, to_move: Mark, oracle_mark: Mark) -> i32 {
        if let Some(winner) = board.winner() {
            return if winner == oracle_mark { 1 } else { -1 };
        }
        if board.is_full() {
            return 0;
        }

        if to_move == oracle_mark {
            let index = best_move(&board, oracle_mark, None).expect("board has an empty cell");
            worst_outcome(board.with(index, oracle_mark), to_move.opponent(), oracle_mark)
        } else {
            board
                .empty_cells()
                .into_iter()
                .map(|index| worst_outcome(board.with(index, to_move), to_move.opponent(), oracle_mark))
                .min()
                .unwrap_or(0)
        }
    }

    #[test]
    fn test_hard_never_loses_as_o() {
        assert!(worst_outcome(Board::new(), Mark::X, Mark::O) >= 0);
    }

    #[test]
    fn test_hard_never_loses_as_x() {
        assert!(worst_outcome(Board::new(), Mark::X, Mark::X) >= 0);
    }

    #[test]
    fn test_center_opening_answered_with_corner() {
        let b = board("----X----");
        let reply = best_move(&b, Mark::O, None).unwrap();
        assert!([0, 2, 6, 8].contains(&reply), "got edge reply {}", reply);
    }

    #[test]
    fn test_lowest_index_wins_ties() {
        // Both 2 and 5 win for O; 2 comes first.
        let b = board("XX-OO----");
        assert_eq!(best_move(&b, Mark::O, None), Some(2));
    }

    #[test]
    fn test_blocks_immediate_loss() {
        // X threatens 0-1-2; O has no win of its own.
        let b = board("XX--O----");
        assert_eq!(best_move(&b, Mark::O, None), Some(2));
    }

    #[test]
    fn test_takes_immediate_win() {
        let b = board("OO-XX-X--");
        assert_eq!(best_move(&b, Mark::O, None), Some(2));
    }

    #[test]
    fn test_full_board_yields_no_move() {
        let b = board("XOXOXXOXO");
        let mut rng = StdRng::seed_from_u64(7);
        let oracle = MoveOracle::default();
        for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            assert_eq!(oracle.select_move(&b, Mark::O, difficulty, &mut rng), None);
        }
    }

    #[test]
    fn test_search_leaves_board_untouched() {
        let b = board("X---O---X");
        let before = b;
        let mut rng = StdRng::seed_from_u64(1);
        let oracle = MoveOracle::default();
        let _ = oracle.select_move(&b, Mark::O, Difficulty::Hard, &mut rng);
        let _ = oracle.select_move(&b, Mark::O, Difficulty::Easy, &mut rng);
        assert_eq!(b, before);
    }

    #[test]
    fn test_easy_and_medium_always_play_legal_moves() {
        let b = board("XO-OX----");
        let empties = b.empty_cells();
        let mut rng = StdRng::seed_from_u64(42);
        let oracle = MoveOracle::default();
        for _ in 0..200 {
            for difficulty in [Difficulty::Easy, Difficulty::Medium] {
                let choice = oracle.select_move(&b, Mark::X, difficulty, &mut rng).unwrap();
                assert!(empties.contains(&choice));
            }
        }
    }

    #[test]
    fn test_zero_chance_behaves_optimally() {
        let oracle = MoveOracle::new(0.0, 0.0, None);
        let b = board("XX--O----");
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            assert_eq!(oracle.select_move(&b, Mark::O, Difficulty::Easy, &mut rng), Some(2));
        }
    }

    #[test]
    fn test_full_chance_sometimes_misses_the_block() {
        let oracle = MoveOracle::new(1.0, 1.0, None);
        let b = board("XX--O----");
        let mut rng = StdRng::seed_from_u64(11);
        let picks: Vec<_> = (0..50)
            .map(|_| oracle.select_move(&b, Mark::O, Difficulty::Easy, &mut rng).unwrap())
            .collect();
        assert!(picks.iter().any(|&p| p != 2));
    }

    #[test]
    fn test_policy_mapping() {
        let oracle = MoveOracle::new(0.7, 0.5, Some(2));
        assert_eq!(oracle.policy(Difficulty::Hard), MovePolicy::Optimal);
        assert_eq!(
            oracle.policy(Difficulty::Easy),
            MovePolicy::Mixed {
                random_chance: 0.7,
                max_depth: Some(2)
            }
        );
        assert_eq!(
            oracle.policy(Difficulty::Medium),
            MovePolicy::Mixed {
                random_chance: 0.5,
                max_depth: Some(2)
            }
        );
    }

    #[test]
    fn test_chances_are_clamped() {
        let oracle = MoveOracle::new(1.5, f64::NAN, None);
        assert_eq!(*oracle.easy_random_chance(), 1.0);
        assert_eq!(*oracle.medium_random_chance(), 0.0);
    }

    #[test]
    fn test_difficulty_parses_from_text() {
        assert_eq!("EASY".parse::<Difficulty>().unwrap(), Difficulty::Easy);
        assert_eq!("medium".parse::<Difficulty>().unwrap(), Difficulty::Medium);
        assert!("impossible".parse::<Difficulty>().is_err());
        assert_eq!(Difficulty::Hard.to_string(), "hard");
    }
}
