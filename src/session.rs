//! One match of tic-tac-toe and its turn/endgame state machine.

use crate::games::tictactoe::{Board, BoardError, Difficulty, Mark, MoveOracle, Square};
use derive_getters::Getters;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

/// Opaque identifier binding a session to its originating conversation.
pub type SessionKey = String;

/// Identity of a participant as known to the surrounding platform.
pub type Identity = String;

/// Partition under which statistics are aggregated.
pub type Scope = String;

/// Who is playing.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum GameMode {
    /// Two humans take turns.
    HumanVsHuman,
    /// A human plays the automated opponent.
    HumanVsBot,
}

/// The `marker → identity` mapping of a session.
///
/// Serializes as a JSON object keyed by marker, e.g. `{"X":"alice","O":"bot"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct Participants {
    /// Identity holding X.
    #[serde(rename = "X")]
    x: Identity,
    /// Identity holding O.
    #[serde(rename = "O")]
    o: Identity,
}

impl Participants {
    /// Creates the mapping.
    pub fn new(x: impl Into<Identity>, o: impl Into<Identity>) -> Self {
        Self {
            x: x.into(),
            o: o.into(),
        }
    }

    /// Identity holding `mark`.
    pub fn get(&self, mark: Mark) -> &str {
        match mark {
            Mark::X => &self.x,
            Mark::O => &self.o,
        }
    }
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Waiting for the holder of this marker to move.
    WaitingForMove(Mark),
    /// The holder of this marker completed a line.
    Decided(Mark),
    /// The board filled up without a line.
    Drawn,
}

/// Result payload of a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchResult {
    /// One winner, one loser.
    Decisive {
        /// Winning identity.
        winner: Identity,
        /// Losing identity.
        loser: Identity,
        /// Marker that completed the line.
        mark: Mark,
    },
    /// Both participants drew.
    Draw {
        /// Identity that held X.
        x: Identity,
        /// Identity that held O.
        o: Identity,
    },
}

impl MatchResult {
    /// Winning identity, if decisive.
    pub fn winner(&self) -> Option<&str> {
        match self {
            MatchResult::Decisive { winner, .. } => Some(winner),
            MatchResult::Draw { .. } => None,
        }
    }

    /// Losing identity, if decisive.
    pub fn loser(&self) -> Option<&str> {
        match self {
            MatchResult::Decisive { loser, .. } => Some(loser),
            MatchResult::Draw { .. } => None,
        }
    }

    /// True for a draw.
    pub fn is_draw(&self) -> bool {
        matches!(self, MatchResult::Draw { .. })
    }
}

/// A single marker placed during a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct Placement {
    /// Marker placed.
    mark: Mark,
    /// Cell index (0-8).
    index: usize,
    /// Identity that owns the marker.
    identity: Identity,
    /// True when the oracle chose the cell.
    by_bot: bool,
}

/// Everything that happened while handling one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct MoveReport {
    /// Placements in the order they were made.
    placements: Vec<Placement>,
    /// Board after the last placement.
    board: Board,
    /// State after the last placement.
    state: SessionState,
    /// Present once the session has finished.
    result: Option<MatchResult>,
}

/// Why a session rejected a request.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum SessionError {
    /// The session has ended or never existed.
    #[display("No game is in progress")]
    NotActive,

    /// The actor does not hold the marker whose turn it is.
    #[display("It is not your turn ({} to move)", expected)]
    WrongTurn {
        /// Marker whose turn it is.
        expected: Mark,
    },

    /// The target cell already holds a marker.
    #[display("Cell {} is already occupied", _0)]
    CellOccupied(usize),

    /// The target index is not a cell.
    #[display("Cell {} does not exist (0-8)", _0)]
    InvalidCell(usize),

    /// A difficulty name was not one of easy, medium, hard.
    #[display("Unknown difficulty '{}' (expected easy, medium or hard)", _0)]
    InvalidDifficulty(String),

    /// Participants or bot marker do not fit the game mode.
    #[display("Invalid participants: {}", _0)]
    InvalidParticipants(String),
}

impl std::error::Error for SessionError {}

impl From<BoardError> for SessionError {
    fn from(err: BoardError) -> Self {
        match err {
            BoardError::CellOccupied(index) => SessionError::CellOccupied(index),
            BoardError::OutOfRange(index) => SessionError::InvalidCell(index),
            BoardError::Malformed(message) => SessionError::InvalidParticipants(message),
        }
    }
}

/// One match: board, turn, participants, mode and difficulty.
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct Session {
    /// Session key.
    key: SessionKey,
    /// Statistics scope the session belongs to.
    scope: Scope,
    /// The board.
    board: Board,
    /// Lifecycle state.
    state: SessionState,
    /// Game mode.
    mode: GameMode,
    /// Marker to identity mapping.
    participants: Participants,
    /// Marker held by the automated opponent.
    bot_marker: Option<Mark>,
    /// Oracle difficulty.
    difficulty: Difficulty,
    /// Cleared once the session has finished or been abandoned.
    active: bool,
}

impl Session {
    /// Creates a fresh session waiting for X.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidParticipants`] when an identity is
    /// blank or holds both markers, or when the bot marker does not fit the
    /// mode.
    #[instrument(skip(participants), fields(x = %participants.x, o = %participants.o))]
    pub fn new(
        key: SessionKey,
        scope: Scope,
        mode: GameMode,
        participants: Participants,
        bot_marker: Option<Mark>,
        difficulty: Difficulty,
    ) -> Result<Self, SessionError> {
        validate_participants(mode, &participants, bot_marker)?;

        info!(session_key = %key, "Creating new session");
        Ok(Self {
            key,
            scope,
            board: Board::new(),
            state: SessionState::WaitingForMove(Mark::X),
            mode,
            participants,
            bot_marker,
            difficulty,
            active: true,
        })
    }

    /// Rebuilds an in-flight session from persisted parts.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidParticipants`] when the parts do not
    /// describe a consistent in-flight session: a finished board, a turn
    /// that disagrees with the marker counts, or a turn owed to the bot.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        key: SessionKey,
        scope: Scope,
        board: Board,
        turn: Mark,
        mode: GameMode,
        participants: Participants,
        bot_marker: Option<Mark>,
        difficulty: Difficulty,
    ) -> Result<Self, SessionError> {
        validate_participants(mode, &participants, bot_marker)?;
        if board.is_terminal() {
            return Err(SessionError::InvalidParticipants(format!(
                "stored board {} is already finished",
                board
            )));
        }

        let count = |mark: Mark| {
            board
                .squares()
                .iter()
                .filter(|sq| **sq == Square::Occupied(mark))
                .count()
        };
        let expected = match count(Mark::X).checked_sub(count(Mark::O)) {
            Some(0) => Mark::X,
            Some(1) => Mark::O,
            _ => {
                return Err(SessionError::InvalidParticipants(format!(
                    "stored board {} has unbalanced markers",
                    board
                )));
            }
        };
        if turn != expected {
            return Err(SessionError::InvalidParticipants(format!(
                "stored turn {} does not match board {}",
                turn, board
            )));
        }
        if bot_marker == Some(turn) {
            return Err(SessionError::InvalidParticipants(format!(
                "stored turn {} belongs to the bot",
                turn
            )));
        }

        Ok(Self {
            key,
            scope,
            board,
            state: SessionState::WaitingForMove(turn),
            mode,
            participants,
            bot_marker,
            difficulty,
            active: true,
        })
    }

    /// Marker whose turn it is, `None` once finished.
    pub fn turn(&self) -> Option<Mark> {
        match self.state {
            SessionState::WaitingForMove(mark) if self.active => Some(mark),
            _ => None,
        }
    }

    /// True while moves are accepted.
    pub fn is_active(&self) -> bool {
        self.active && matches!(self.state, SessionState::WaitingForMove(_))
    }

    /// True iff `identity` is this session's automated opponent.
    pub fn is_bot(&self, identity: &str) -> bool {
        self.bot_marker
            .is_some_and(|mark| self.participants.get(mark) == identity)
    }

    /// Marks the session as no longer accepting moves.
    pub(crate) fn deactivate(&mut self) {
        self.active = false;
    }

    /// Plays the bot's opening move when the bot holds X.
    ///
    /// Returns a report with no placements when a human moves first.
    #[instrument(skip(self, oracle, rng), fields(session_key = %self.key))]
    pub fn start<R: Rng + ?Sized>(&mut self, oracle: &MoveOracle, rng: &mut R) -> MoveReport {
        let mut report = self.report(Vec::new());
        self.play_bot_turns(oracle, rng, &mut report);
        report
    }

    /// Applies `actor`'s move at `index`, then the bot's reply if it is the
    /// bot's turn next.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotActive`] if the session has finished.
    /// - [`SessionError::WrongTurn`] if `actor` does not hold the marker to move.
    /// - [`SessionError::CellOccupied`] / [`SessionError::InvalidCell`] from the board.
    ///
    /// On error the session is unchanged.
    #[instrument(skip(self, oracle, rng), fields(session_key = %self.key))]
    pub fn submit_move<R: Rng + ?Sized>(
        &mut self,
        actor: &str,
        index: usize,
        oracle: &MoveOracle,
        rng: &mut R,
    ) -> Result<MoveReport, SessionError> {
        let turn = self.turn().ok_or_else(|| {
            debug!("Move on finished session");
            SessionError::NotActive
        })?;

        if self.participants.get(turn) != actor {
            warn!(actor, expected = %turn, "Actor tried to move out of turn");
            return Err(SessionError::WrongTurn { expected: turn });
        }

        let mut report = self.report(Vec::new());
        self.place(index, false, &mut report)?;
        self.play_bot_turns(oracle, rng, &mut report);

        info!(
            placements = report.placements.len(),
            state = ?report.state,
            board = %self.board,
            "Move accepted"
        );
        Ok(report)
    }

    /// Lets the oracle move for as long as the bot holds the turn.
    fn play_bot_turns<R: Rng + ?Sized>(
        &mut self,
        oracle: &MoveOracle,
        rng: &mut R,
        report: &mut MoveReport,
    ) {
        while let Some(turn) = self.turn() {
            if self.bot_marker != Some(turn) {
                break;
            }

            let Some(index) = oracle.select_move(&self.board, turn, self.difficulty, rng) else {
                error!(board = %self.board, "Oracle found no move on an unfinished board");
                break;
            };

            if let Err(e) = self.place(index, true, report) {
                error!(index, error = %e, "Oracle chose an unplayable cell");
                break;
            }
        }
    }

    /// Places the current turn's marker and evaluates the board.
    fn place(&mut self, index: usize, by_bot: bool, report: &mut MoveReport) -> Result<(), SessionError> {
        let Some(mark) = self.turn() else {
            return Err(SessionError::NotActive);
        };

        self.board.place(index, mark)?;
        report.placements.push(Placement {
            mark,
            index,
            identity: self.participants.get(mark).to_string(),
            by_bot,
        });
        debug!(index, mark = %mark, by_bot, "Marker placed");

        if self.board.winner() == Some(mark) {
            self.state = SessionState::Decided(mark);
            self.active = false;
            report.result = Some(MatchResult::Decisive {
                winner: self.participants.get(mark).to_string(),
                loser: self.participants.get(mark.opponent()).to_string(),
                mark,
            });
            info!(winner = %mark, "Session decided");
        } else if self.board.is_full() {
            self.state = SessionState::Drawn;
            self.active = false;
            report.result = Some(MatchResult::Draw {
                x: self.participants.x.clone(),
                o: self.participants.o.clone(),
            });
            info!("Session drawn");
        } else {
            self.state = SessionState::WaitingForMove(mark.opponent());
        }

        report.board = self.board;
        report.state = self.state;
        Ok(())
    }

    fn report(&self, placements: Vec<Placement>) -> MoveReport {
        MoveReport {
            placements,
            board: self.board,
            state: self.state,
            result: None,
        }
    }
}

fn validate_participants(
    mode: GameMode,
    participants: &Participants,
    bot_marker: Option<Mark>,
) -> Result<(), SessionError> {
    if participants.x.trim().is_empty() || participants.o.trim().is_empty() {
        return Err(SessionError::InvalidParticipants(
            "identities must not be blank".to_string(),
        ));
    }
    if participants.x == participants.o {
        return Err(SessionError::InvalidParticipants(format!(
            "'{}' cannot hold both markers",
            participants.x
        )));
    }

    match (mode, bot_marker) {
        (GameMode::HumanVsBot, None) => Err(SessionError::InvalidParticipants(
            "a bot game needs a bot marker".to_string(),
        )),
        (GameMode::HumanVsHuman, Some(mark)) => Err(SessionError::InvalidParticipants(format!(
            "a human game cannot assign {} to a bot",
            mark
        ))),
        _ => Ok(()),
    }
}
