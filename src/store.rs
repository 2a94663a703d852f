//! Keyed registry of in-flight sessions with durable backing.

use crate::db::{DbError, GameRepository, NewSessionRecord, SessionRecord};
use crate::games::tictactoe::{Board, Difficulty, Mark};
use crate::session::{GameMode, Participants, Session, SessionKey};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument, warn};

/// Shared handle to one live session. Lock it to read or mutate.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Why the store rejected an operation.
#[derive(Debug, Clone, derive_more::Display)]
pub enum StoreError {
    /// A session already occupies the key.
    #[display("A game is already in progress for '{}'", _0)]
    AlreadyActive(SessionKey),

    /// The durable store failed.
    #[display("{}", _0)]
    Db(DbError),
}

impl std::error::Error for StoreError {}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        StoreError::Db(err)
    }
}

/// Locks a mutex, recovering the guard if a previous holder panicked.
///
/// Sessions are only replaced wholesale after a successful commit, so a
/// poisoned guard still holds a consistent value.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Manages all live sessions.
///
/// At most one session exists per key, both in memory and in the
/// `sessions` table.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<SessionKey, SessionHandle>>>,
    repository: GameRepository,
}

impl SessionStore {
    /// Creates an empty store backed by `repository`.
    #[instrument(skip(repository))]
    pub fn new(repository: GameRepository) -> Self {
        info!("Creating session store");
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            repository,
        }
    }

    /// Creates a store and reloads every persisted in-flight session.
    ///
    /// Rows that cannot be rebuilt are skipped with a warning and left in
    /// the database untouched.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the rows cannot be read.
    #[instrument(skip(repository))]
    pub fn load(repository: GameRepository) -> Result<Self, DbError> {
        let store = Self::new(repository);

        let records = store.repository.list_sessions()?;
        let mut sessions = lock(&store.sessions);
        for record in records {
            match session_from_record(&record) {
                Ok(session) => {
                    debug!(session_key = %record.session_key(), "Session restored");
                    sessions.insert(record.session_key().clone(), Arc::new(Mutex::new(session)));
                }
                Err(e) => {
                    warn!(session_key = %record.session_key(), error = %e, "Skipping unreadable session row");
                }
            }
        }

        info!(count = sessions.len(), "Sessions reloaded");
        drop(sessions);
        Ok(store)
    }

    /// Returns the backing repository.
    pub fn repository(&self) -> &GameRepository {
        &self.repository
    }

    /// Registers and persists a new session.
    ///
    /// # Errors
    ///
    /// - [`StoreError::AlreadyActive`] if the key is taken; the existing
    ///   session is untouched.
    /// - [`StoreError::Db`] if the row cannot be written.
    #[instrument(skip(self, session), fields(session_key = %session.key()))]
    pub fn create(&self, session: Session) -> Result<SessionHandle, StoreError> {
        let mut sessions = lock(&self.sessions);

        if sessions.contains_key(session.key()) {
            warn!("Session already exists");
            return Err(StoreError::AlreadyActive(session.key().clone()));
        }

        let record = session_to_record(&session)?;
        if !self.repository.insert_session(&record)? {
            warn!("Session row already exists");
            return Err(StoreError::AlreadyActive(session.key().clone()));
        }

        let key = session.key().clone();
        let handle = Arc::new(Mutex::new(session));
        sessions.insert(key, Arc::clone(&handle));

        info!(count = sessions.len(), "Session created");
        Ok(handle)
    }

    /// Gets the handle for a live session.
    #[instrument(skip(self))]
    pub fn get(&self, key: &str) -> Option<SessionHandle> {
        let handle = lock(&self.sessions).get(key).cloned();
        if handle.is_none() {
            debug!("Session not found");
        }
        handle
    }

    /// True if a session occupies `key`.
    pub fn contains(&self, key: &str) -> bool {
        lock(&self.sessions).contains_key(key)
    }

    /// Writes the current state of `session` to its row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails or the row no longer exists.
    #[instrument(skip(self, session), fields(session_key = %session.key()))]
    pub fn persist(&self, session: &Session) -> Result<(), DbError> {
        let record = session_to_record(session)?;
        if !self.repository.update_session(&record)? {
            return Err(DbError::new(format!(
                "Session '{}' has no stored row",
                session.key()
            )));
        }
        Ok(())
    }

    /// Removes a session from memory and from the database.
    ///
    /// Returns the removed handle, if there was one.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the row cannot be deleted; memory is untouched.
    #[instrument(skip(self))]
    pub fn remove(&self, key: &str) -> Result<Option<SessionHandle>, DbError> {
        let mut sessions = lock(&self.sessions);
        self.repository.delete_session(key)?;
        let removed = sessions.remove(key);
        info!(removed = removed.is_some(), "Session removed");
        Ok(removed)
    }

    /// Drops a session from memory only, after its row was deleted elsewhere.
    #[instrument(skip(self))]
    pub(crate) fn forget(&self, key: &str) {
        lock(&self.sessions).remove(key);
    }

    /// Snapshots of all live sessions, ordered by key.
    #[instrument(skip(self))]
    pub fn list_all(&self) -> Vec<Session> {
        let handles: Vec<SessionHandle> = lock(&self.sessions).values().cloned().collect();
        let mut snapshots: Vec<Session> = handles.iter().map(|h| lock(h).clone()).collect();
        snapshots.sort_by(|a, b| a.key().cmp(b.key()));
        debug!(count = snapshots.len(), "Listed sessions");
        snapshots
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    /// True if no session is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Encodes a session as its persisted row.
pub(crate) fn session_to_record(session: &Session) -> Result<NewSessionRecord, DbError> {
    let turn = session.turn().ok_or_else(|| {
        DbError::new(format!("Session '{}' has finished and cannot be stored", session.key()))
    })?;

    Ok(NewSessionRecord::new(
        session.key().clone(),
        session.scope().clone(),
        session.board().to_record_string(),
        turn.to_string(),
        session.mode().to_string(),
        session.is_active(),
        serde_json::to_string(session.participants())?,
        session.difficulty().to_string(),
        session.bot_marker().map(|mark| mark.to_string()),
    ))
}

/// Rebuilds a session from its persisted row.
pub(crate) fn session_from_record(record: &SessionRecord) -> Result<Session, DbError> {
    if !record.active() {
        return Err(DbError::new("Row is marked inactive"));
    }

    let board: Board = record
        .board()
        .parse()
        .map_err(|e| DbError::new(format!("Bad board: {}", e)))?;
    let turn: Mark = record
        .current_turn()
        .parse()
        .map_err(|e| DbError::new(format!("Bad turn '{}': {}", record.current_turn(), e)))?;
    let mode: GameMode = record
        .mode()
        .parse()
        .map_err(|e| DbError::new(format!("Bad mode '{}': {}", record.mode(), e)))?;
    let difficulty: Difficulty = record
        .difficulty()
        .parse()
        .map_err(|e| DbError::new(format!("Bad difficulty '{}': {}", record.difficulty(), e)))?;
    let bot_marker = record
        .bot_marker()
        .as_deref()
        .map(str::parse::<Mark>)
        .transpose()
        .map_err(|e| DbError::new(format!("Bad bot marker: {}", e)))?;
    let participants: Participants = serde_json::from_str(record.participants())?;

    Session::restore(
        record.session_key().clone(),
        record.scope().clone(),
        board,
        turn,
        mode,
        participants,
        bot_marker,
        difficulty,
    )
    .map_err(|e| DbError::new(format!("Inconsistent session row: {}", e)))
}
