//! Tic-tac-toe session engine.
//!
//! Runs turn-based tic-tac-toe matches driven by asynchronous requests, with
//! an optional automated opponent and per-scope win/loss/draw statistics that
//! survive restarts.
//!
//! # Architecture
//!
//! - **Games**: board, rules and the minimax move oracle
//! - **Session**: one match and its turn/endgame state machine
//! - **Store**: keyed registry of in-flight sessions, backed by SQLite
//! - **Ledger**: per-scope statistics and leaderboards
//! - **Engine**: the request surface tying the above together
//!
//! # Example
//!
//! ```no_run
//! use tictactoe_sessions::{EngineConfig, GameEngine, NewGame};
//!
//! # fn example() -> anyhow::Result<()> {
//! let engine = GameEngine::open(&EngineConfig::default())?;
//! engine.start_game(NewGame::human_vs_bot("guild", "channel-1", "alice", "bot"))?;
//! let report = engine.submit_move("channel-1", "alice", 4)?;
//! println!("{}", report.board().display());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod config;
mod db;
mod engine;
mod games;
mod ledger;
mod session;
mod store;

// Crate-level exports - Configuration
pub use config::{ConfigError, DATABASE_ENV, EngineConfig, OracleConfig};

// Crate-level exports - Persistence
pub use db::{
    DbError, GameOutcome, GameRepository, MIGRATIONS, NewSessionRecord, PlayerStats,
    SessionRecord, StatDelta,
};

// Crate-level exports - Engine
pub use engine::{GameEngine, GameError, NewGame};

// Crate-level exports - Game types (tic-tac-toe)
pub use games::tictactoe::{
    Board, BoardError, Difficulty, EMPTY_SENTINEL, Mark, MoveOracle, MovePolicy, Position, Square,
    best_move, random_move, rules,
};

// Crate-level exports - Statistics
pub use ledger::StatsLedger;

// Crate-level exports - Sessions
pub use session::{
    GameMode, Identity, MatchResult, MoveReport, Participants, Placement, Scope, Session,
    SessionError, SessionKey, SessionState,
};
pub use store::{SessionHandle, SessionStore, StoreError};
