//! Database repository for sessions and player statistics.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::{debug, info, instrument};

use crate::db::models::NewPlayerStats;
use crate::db::{DbError, GameOutcome, NewSessionRecord, PlayerStats, SessionRecord, schema};

/// Schema migrations compiled into the binary.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Milliseconds SQLite waits on a locked database before failing.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Database repository for session and statistics operations.
#[derive(Debug, Clone)]
pub struct GameRepository {
    db_path: String,
}

impl GameRepository {
    /// Creates a new repository for the database file at the given path.
    ///
    /// Every operation opens its own connection, so the path must name a
    /// file; `":memory:"` would give each call a fresh empty database.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the path is empty.
    #[instrument(skip(db_path), fields(db_path = %db_path))]
    pub fn new(db_path: String) -> Result<Self, DbError> {
        if db_path.trim().is_empty() {
            return Err(DbError::new("Database path is empty"));
        }
        info!(path = %db_path, "Creating GameRepository");
        Ok(Self { db_path })
    }

    /// Returns the database path.
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// Establishes a database connection.
    #[instrument(skip(self))]
    fn connection(&self) -> Result<SqliteConnection, DbError> {
        debug!(path = %self.db_path, "Establishing connection");
        let mut conn = SqliteConnection::establish(&self.db_path)
            .map_err(|e| DbError::new(format!("Failed to connect to '{}': {}", self.db_path, e)))?;
        conn.batch_execute(&format!("PRAGMA busy_timeout = {};", BUSY_TIMEOUT_MS))?;
        Ok(conn)
    }

    /// Applies any pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a migration fails.
    #[instrument(skip(self))]
    pub fn run_migrations(&self) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| DbError::new(format!("Migrations failed: {}", e)))?;
        info!(count = applied.len(), "Migrations applied");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    //  Sessions
    // ─────────────────────────────────────────────────────────────

    /// Inserts a new session row.
    ///
    /// Returns `false` without writing anything if a row already exists for
    /// the session key.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on any other database failure.
    #[instrument(skip(self, record), fields(session_key = %record.session_key()))]
    pub fn insert_session(&self, record: &NewSessionRecord) -> Result<bool, DbError> {
        let mut conn = self.connection()?;

        match diesel::insert_into(schema::sessions::table)
            .values(record)
            .execute(&mut conn)
        {
            Ok(_) => {
                info!("Session row inserted");
                Ok(true)
            }
            Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                debug!("Session key already taken");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrites an existing session row.
    ///
    /// Returns `false` if no row exists for the session key.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self, record), fields(session_key = %record.session_key(), board = %record.board()))]
    pub fn update_session(&self, record: &NewSessionRecord) -> Result<bool, DbError> {
        use schema::sessions::dsl;

        let mut conn = self.connection()?;
        let updated = diesel::update(dsl::sessions.filter(dsl::session_key.eq(record.session_key())))
            .set((record, dsl::updated_at.eq(diesel::dsl::now)))
            .execute(&mut conn)?;

        debug!(updated, "Session row updated");
        Ok(updated == 1)
    }

    /// Deletes a session row. Returns `true` if a row was removed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn delete_session(&self, session_key: &str) -> Result<bool, DbError> {
        use schema::sessions::dsl;

        let mut conn = self.connection()?;
        let deleted =
            diesel::delete(dsl::sessions.filter(dsl::session_key.eq(session_key))).execute(&mut conn)?;

        info!(deleted, "Session row deleted");
        Ok(deleted > 0)
    }

    /// Gets a session row by key.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn get_session(&self, session_key: &str) -> Result<Option<SessionRecord>, DbError> {
        use schema::sessions::dsl;

        let mut conn = self.connection()?;
        let record = dsl::sessions
            .filter(dsl::session_key.eq(session_key))
            .select(SessionRecord::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(record)
    }

    /// Lists all persisted session rows, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn list_sessions(&self) -> Result<Vec<SessionRecord>, DbError> {
        use schema::sessions::dsl;

        let mut conn = self.connection()?;
        let records = dsl::sessions
            .order((dsl::created_at.asc(), dsl::session_key.asc()))
            .select(SessionRecord::as_select())
            .load(&mut conn)?;

        info!(count = records.len(), "Sessions loaded");
        Ok(records)
    }

    // ─────────────────────────────────────────────────────────────
    //  Statistics
    // ─────────────────────────────────────────────────────────────

    /// Credits each `(identity, outcome)` pair in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs; no counter changes.
    #[instrument(skip(self, outcomes), fields(count = outcomes.len()))]
    pub fn record_outcomes(&self, scope: &str, outcomes: &[(&str, GameOutcome)]) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        conn.transaction::<_, DbError, _>(|conn| credit_all(conn, scope, outcomes))?;
        info!("Outcomes recorded");
        Ok(())
    }

    /// Deletes a session row and credits its outcomes in one transaction.
    ///
    /// Either both happen or neither does, so a finished game can never be
    /// credited twice nor linger as an in-flight session.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs or the session row is
    /// missing.
    #[instrument(skip(self, outcomes), fields(count = outcomes.len()))]
    pub fn close_session(
        &self,
        session_key: &str,
        scope: &str,
        outcomes: &[(&str, GameOutcome)],
    ) -> Result<(), DbError> {
        use schema::sessions::dsl;

        let mut conn = self.connection()?;
        conn.transaction::<_, DbError, _>(|conn| {
            let deleted =
                diesel::delete(dsl::sessions.filter(dsl::session_key.eq(session_key))).execute(conn)?;
            if deleted == 0 {
                return Err(DbError::new(format!("Session '{}' has no stored row", session_key)));
            }
            credit_all(conn, scope, outcomes)
        })?;

        info!("Session closed and outcomes recorded");
        Ok(())
    }

    /// Gets the counters for one identity, `None` if it has no row yet.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn get_stats(&self, scope: &str, identity: &str) -> Result<Option<PlayerStats>, DbError> {
        use schema::player_stats::dsl;

        let mut conn = self.connection()?;
        let stats = dsl::player_stats
            .filter(dsl::scope.eq(scope))
            .filter(dsl::identity.eq(identity))
            .select(PlayerStats::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(stats)
    }

    /// Top rows of a scope: wins descending, then losses ascending, then
    /// identity ascending. Identities in `exclude` are left out.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn leaderboard(
        &self,
        scope: &str,
        limit: usize,
        exclude: &[&str],
    ) -> Result<Vec<PlayerStats>, DbError> {
        use schema::player_stats::dsl;

        let mut conn = self.connection()?;
        let mut query = dsl::player_stats
            .filter(dsl::scope.eq(scope))
            .select(PlayerStats::as_select())
            .into_boxed();
        if !exclude.is_empty() {
            query = query.filter(dsl::identity.ne_all(exclude.to_vec()));
        }

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = query
            .order((dsl::wins.desc(), dsl::losses.asc(), dsl::identity.asc()))
            .limit(limit)
            .load(&mut conn)?;

        debug!(count = rows.len(), "Leaderboard loaded");
        Ok(rows)
    }
}

/// Upserts every outcome on an open connection.
fn credit_all(
    conn: &mut SqliteConnection,
    scope: &str,
    outcomes: &[(&str, GameOutcome)],
) -> Result<(), DbError> {
    use schema::player_stats::dsl;

    for (identity, outcome) in outcomes {
        let delta = outcome.delta();
        let seed = NewPlayerStats::new(
            scope.to_string(),
            identity.to_string(),
            *delta.wins(),
            *delta.losses(),
            *delta.draws(),
        );

        diesel::insert_into(dsl::player_stats)
            .values(&seed)
            .on_conflict((dsl::scope, dsl::identity))
            .do_update()
            .set((
                dsl::wins.eq(dsl::wins + *delta.wins()),
                dsl::losses.eq(dsl::losses + *delta.losses()),
                dsl::draws.eq(dsl::draws + *delta.draws()),
                dsl::updated_at.eq(diesel::dsl::now),
            ))
            .execute(conn)?;

        debug!(identity = %identity, outcome = %outcome, "Counter incremented");
    }
    Ok(())
}
