//! Inbound request surface: starts games, applies moves, answers queries.

use crate::config::EngineConfig;
use crate::db::{DbError, GameRepository, PlayerStats};
use crate::games::tictactoe::{Difficulty, Mark, MoveOracle};
use crate::ledger::StatsLedger;
use crate::session::{
    GameMode, Identity, MoveReport, Participants, Scope, Session, SessionError, SessionKey,
};
use crate::store::{SessionStore, StoreError, lock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Every error a request can produce.
#[derive(Debug, Clone, derive_more::Display)]
pub enum GameError {
    /// No game is in progress under the key.
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

    /// A game is already in progress under the key.
    #[display("A game is already in progress for '{}'", _0)]
    AlreadyActive(SessionKey),

    /// A difficulty name was not one of easy, medium, hard.
    #[display("Unknown difficulty '{}' (expected easy, medium or hard)", _0)]
    InvalidDifficulty(String),

    /// Participants or bot marker do not fit the game mode.
    #[display("Invalid participants: {}", _0)]
    InvalidParticipants(String),

    /// The durable store failed; nothing was changed.
    #[display("Storage failure: {}", _0)]
    Storage(DbError),
}

impl std::error::Error for GameError {}

impl From<SessionError> for GameError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotActive => GameError::NotActive,
            SessionError::WrongTurn { expected } => GameError::WrongTurn { expected },
            SessionError::CellOccupied(index) => GameError::CellOccupied(index),
            SessionError::InvalidCell(index) => GameError::InvalidCell(index),
            SessionError::InvalidDifficulty(name) => GameError::InvalidDifficulty(name),
            SessionError::InvalidParticipants(reason) => GameError::InvalidParticipants(reason),
        }
    }
}

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyActive(key) => GameError::AlreadyActive(key),
            StoreError::Db(e) => GameError::Storage(e),
        }
    }
}

impl From<DbError> for GameError {
    fn from(err: DbError) -> Self {
        GameError::Storage(err)
    }
}

/// Request to start a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGame {
    /// Statistics scope.
    pub scope: Scope,
    /// Key of the originating conversation.
    pub session_key: SessionKey,
    /// Game mode.
    pub mode: GameMode,
    /// Identity holding X.
    pub player_x: Identity,
    /// Identity holding O.
    pub player_o: Identity,
    /// Marker held by the bot; defaults to O in bot games.
    #[serde(default)]
    pub bot_marker: Option<Mark>,
    /// Difficulty name; defaults to the configured difficulty.
    #[serde(default)]
    pub difficulty: Option<String>,
}

impl NewGame {
    /// A game between two humans.
    pub fn human_vs_human(
        scope: impl Into<Scope>,
        session_key: impl Into<SessionKey>,
        player_x: impl Into<Identity>,
        player_o: impl Into<Identity>,
    ) -> Self {
        Self {
            scope: scope.into(),
            session_key: session_key.into(),
            mode: GameMode::HumanVsHuman,
            player_x: player_x.into(),
            player_o: player_o.into(),
            bot_marker: None,
            difficulty: None,
        }
    }

    /// A game of `human` against `bot`, with the bot holding O.
    pub fn human_vs_bot(
        scope: impl Into<Scope>,
        session_key: impl Into<SessionKey>,
        human: impl Into<Identity>,
        bot: impl Into<Identity>,
    ) -> Self {
        Self {
            scope: scope.into(),
            session_key: session_key.into(),
            mode: GameMode::HumanVsBot,
            player_x: human.into(),
            player_o: bot.into(),
            bot_marker: Some(Mark::O),
            difficulty: None,
        }
    }

    /// Sets the difficulty name.
    pub fn with_difficulty(mut self, difficulty: impl Into<String>) -> Self {
        self.difficulty = Some(difficulty.into());
        self
    }

    /// Hands the bot the X marker and swaps the identities accordingly.
    pub fn bot_moves_first(mut self) -> Self {
        if self.mode == GameMode::HumanVsBot && self.bot_marker != Some(Mark::X) {
            std::mem::swap(&mut self.player_x, &mut self.player_o);
            self.bot_marker = Some(Mark::X);
        }
        self
    }
}

/// The game engine. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct GameEngine {
    store: SessionStore,
    ledger: StatsLedger,
    oracle: MoveOracle,
    default_difficulty: Difficulty,
}

impl GameEngine {
    /// Assembles an engine from its parts.
    pub fn new(
        store: SessionStore,
        ledger: StatsLedger,
        oracle: MoveOracle,
        default_difficulty: Difficulty,
    ) -> Self {
        Self {
            store,
            ledger,
            oracle,
            default_difficulty,
        }
    }

    /// Opens the configured database, migrates it and reloads every
    /// in-flight session.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the database cannot be opened, migrated or read.
    #[instrument(skip(config), fields(database = %config.database_path()))]
    pub fn open(config: &EngineConfig) -> Result<Self, DbError> {
        let repository = GameRepository::new(config.database_path().clone())?;
        repository.run_migrations()?;

        let store = SessionStore::load(repository.clone())?;
        let ledger = StatsLedger::new(repository, Some(config.bot_identity().clone()));

        info!(sessions = store.len(), "Engine ready");
        Ok(Self::new(
            store,
            ledger,
            config.move_oracle(),
            *config.default_difficulty(),
        ))
    }

    /// The session store.
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// The statistics ledger.
    pub fn ledger(&self) -> &StatsLedger {
        &self.ledger
    }

    /// Starts a game. When the bot holds X its opening move is part of the
    /// returned report.
    ///
    /// # Errors
    ///
    /// - [`GameError::AlreadyActive`] if a game runs under the key.
    /// - [`GameError::InvalidDifficulty`] for an unknown difficulty name.
    /// - [`GameError::InvalidParticipants`] for a malformed line-up.
    /// - [`GameError::Storage`] if the row cannot be written.
    #[instrument(skip(self, request), fields(session_key = %request.session_key, mode = %request.mode))]
    pub fn start_game(&self, request: NewGame) -> Result<MoveReport, GameError> {
        let difficulty = match request.difficulty.as_deref() {
            Some(name) => name
                .trim()
                .parse::<Difficulty>()
                .map_err(|_| GameError::InvalidDifficulty(name.to_string()))?,
            None => self.default_difficulty,
        };

        let bot_marker = match request.mode {
            GameMode::HumanVsBot => Some(request.bot_marker.unwrap_or(Mark::O)),
            GameMode::HumanVsHuman => request.bot_marker,
        };

        if self.store.contains(&request.session_key) {
            warn!("Game already in progress");
            return Err(GameError::AlreadyActive(request.session_key));
        }

        let mut session = Session::new(
            request.session_key,
            request.scope,
            request.mode,
            Participants::new(request.player_x, request.player_o),
            bot_marker,
            difficulty,
        )?;

        let report = session.start(&self.oracle, &mut rand::rng());
        self.store.create(session)?;

        info!(difficulty = %difficulty, opening = report.placements().len(), "Game started");
        Ok(report)
    }

    /// Applies `actor`'s move at `index` and the bot's reply, if any.
    ///
    /// A finished game is removed and credited before this returns.
    ///
    /// # Errors
    ///
    /// - [`GameError::NotActive`] if no game runs under the key.
    /// - [`GameError::WrongTurn`] if `actor` does not hold the marker to move.
    /// - [`GameError::CellOccupied`] / [`GameError::InvalidCell`] for a bad cell.
    /// - [`GameError::Storage`] if persistence fails; the game is unchanged.
    #[instrument(skip(self))]
    pub fn submit_move(&self, key: &str, actor: &str, index: usize) -> Result<MoveReport, GameError> {
        let handle = self.store.get(key).ok_or(GameError::NotActive)?;
        let mut live = lock(&handle);

        if !live.is_active() {
            debug!("Session ended while waiting for its lock");
            return Err(GameError::NotActive);
        }

        let mut next = live.clone();
        let report = next.submit_move(actor, index, &self.oracle, &mut rand::rng())?;

        match report.result() {
            Some(result) => {
                self.ledger.settle(next.key(), next.scope(), result)?;
                *live = next;
                self.store.forget(key);
            }
            None => {
                self.store.persist(&next)?;
                *live = next;
            }
        }

        Ok(report)
    }

    /// Ends a game without crediting anyone.
    ///
    /// # Errors
    ///
    /// - [`GameError::NotActive`] if no game runs under the key.
    /// - [`GameError::Storage`] if the row cannot be deleted.
    #[instrument(skip(self))]
    pub fn abandon(&self, key: &str) -> Result<Session, GameError> {
        let handle = self.store.get(key).ok_or(GameError::NotActive)?;
        let mut live = lock(&handle);

        if !live.is_active() {
            return Err(GameError::NotActive);
        }

        self.store.remove(key)?;
        live.deactivate();

        info!("Game abandoned");
        Ok(live.clone())
    }

    /// Snapshot of the game under `key`.
    pub fn session(&self, key: &str) -> Option<Session> {
        self.store.get(key).map(|handle| lock(&handle).clone())
    }

    /// Snapshots of every game in progress, ordered by key.
    pub fn sessions(&self) -> Vec<Session> {
        self.store.list_all()
    }

    /// Counters for one identity.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Storage`] if the read fails.
    pub fn stats(&self, scope: &str, identity: &str) -> Result<PlayerStats, GameError> {
        Ok(self.ledger.query(scope, identity)?)
    }

    /// Top `limit` identities of a scope. The configured bot identity is
    /// always left out, and `exclude` as well when given.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Storage`] if the read fails.
    pub fn leaderboard(
        &self,
        scope: &str,
        limit: usize,
        exclude: Option<&str>,
    ) -> Result<Vec<PlayerStats>, GameError> {
        Ok(self.ledger.top_n_excluding(scope, limit, exclude)?)
    }
}
