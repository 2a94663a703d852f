//! Per-scope win/loss/draw statistics.

use tracing::{debug, info, instrument};

use crate::db::{DbError, GameOutcome, GameRepository, PlayerStats};
use crate::session::{Identity, MatchResult};

/// Service layer over the statistics tables.
///
/// Counters are only ever incremented, and every increment is committed
/// before the call returns.
#[derive(Debug, Clone)]
pub struct StatsLedger {
    repository: GameRepository,
    excluded_identity: Option<Identity>,
}

impl StatsLedger {
    /// Creates a ledger. `excluded_identity` (usually the bot) is left out
    /// of leaderboards by default.
    #[instrument(skip(repository))]
    pub fn new(repository: GameRepository, excluded_identity: Option<Identity>) -> Self {
        info!("Creating StatsLedger");
        Self {
            repository,
            excluded_identity,
        }
    }

    /// Returns the underlying repository.
    pub fn repository(&self) -> &GameRepository {
        &self.repository
    }

    /// Identity left out of leaderboards by default.
    pub fn excluded_identity(&self) -> Option<&str> {
        self.excluded_identity.as_deref()
    }

    /// Credits a win to `winner` and a loss to `loser`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails; neither counter changes.
    #[instrument(skip(self))]
    pub fn record_decisive(&self, scope: &str, winner: &str, loser: &str) -> Result<(), DbError> {
        self.repository
            .record_outcomes(scope, &[(winner, GameOutcome::Win), (loser, GameOutcome::Loss)])
    }

    /// Credits a draw to both participants.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails; neither counter changes.
    #[instrument(skip(self))]
    pub fn record_draw(&self, scope: &str, a: &str, b: &str) -> Result<(), DbError> {
        self.repository
            .record_outcomes(scope, &[(a, GameOutcome::Draw), (b, GameOutcome::Draw)])
    }

    /// Credits a finished match.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails.
    #[instrument(skip(self))]
    pub fn record(&self, scope: &str, result: &MatchResult) -> Result<(), DbError> {
        match result {
            MatchResult::Decisive { winner, loser, .. } => self.record_decisive(scope, winner, loser),
            MatchResult::Draw { x, o } => self.record_draw(scope, x, o),
        }
    }

    /// Deletes the session's row and credits its result atomically.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the transaction fails; nothing is changed.
    #[instrument(skip(self))]
    pub fn settle(&self, session_key: &str, scope: &str, result: &MatchResult) -> Result<(), DbError> {
        let outcomes = match result {
            MatchResult::Decisive { winner, loser, .. } => {
                [(winner.as_str(), GameOutcome::Win), (loser.as_str(), GameOutcome::Loss)]
            }
            MatchResult::Draw { x, o } => [(x.as_str(), GameOutcome::Draw), (o.as_str(), GameOutcome::Draw)],
        };

        self.repository.close_session(session_key, scope, &outcomes)?;
        info!(draw = result.is_draw(), "Match settled");
        Ok(())
    }

    /// Returns the counters for one identity, zeros if it has none.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the read fails.
    #[instrument(skip(self))]
    pub fn query(&self, scope: &str, identity: &str) -> Result<PlayerStats, DbError> {
        debug!("Getting player stats");
        Ok(self
            .repository
            .get_stats(scope, identity)?
            .unwrap_or_else(|| PlayerStats::empty(scope, identity)))
    }

    /// Top `n` identities of a scope, leaving out the configured identity.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the read fails.
    #[instrument(skip(self))]
    pub fn top_n(&self, scope: &str, n: usize) -> Result<Vec<PlayerStats>, DbError> {
        self.top_n_excluding(scope, n, None)
    }

    /// Top `n` identities of a scope, leaving out the configured identity
    /// and `exclude` if given.
    ///
    /// Ordered by wins descending, then losses ascending, then identity.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the read fails.
    #[instrument(skip(self))]
    pub fn top_n_excluding(
        &self,
        scope: &str,
        n: usize,
        exclude: Option<&str>,
    ) -> Result<Vec<PlayerStats>, DbError> {
        let excluded: Vec<&str> = self.excluded_identity().into_iter().chain(exclude).collect();
        self.repository.leaderboard(scope, n, &excluded)
    }
}
