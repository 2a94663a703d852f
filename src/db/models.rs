//! Database models and domain types.

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use diesel::prelude::*;
use serde::Serialize;

use crate::db::schema;

/// Persisted row for an in-flight session.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::sessions)]
#[diesel(primary_key(session_key))]
pub struct SessionRecord {
    session_key: String,
    scope: String,
    board: String,
    current_turn: String,
    mode: String,
    active: bool,
    participants: String,
    difficulty: String,
    bot_marker: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

/// Insertable and updatable session row.
///
/// `board` is the 9-character record string, `participants` a JSON object
/// mapping marker to identity.
#[derive(Debug, Clone, Insertable, AsChangeset, new, Getters)]
#[diesel(table_name = schema::sessions)]
#[diesel(treat_none_as_null = true)]
pub struct NewSessionRecord {
    session_key: String,
    scope: String,
    board: String,
    current_turn: String,
    mode: String,
    active: bool,
    participants: String,
    difficulty: String,
    bot_marker: Option<String>,
}

/// Win/loss/draw counters for one identity within one scope.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Getters, Serialize)]
#[diesel(table_name = schema::player_stats)]
pub struct PlayerStats {
    scope: String,
    identity: String,
    wins: i32,
    losses: i32,
    draws: i32,
}

impl PlayerStats {
    /// All-zero counters for an identity that has not finished a game yet.
    pub fn empty(scope: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            identity: identity.into(),
            wins: 0,
            losses: 0,
            draws: 0,
        }
    }

    /// Total finished games.
    pub fn games_played(&self) -> i32 {
        self.wins + self.losses + self.draws
    }

    /// Calculates win rate as a percentage (0.0-100.0).
    pub fn win_rate(&self) -> f64 {
        let total = self.games_played();
        if total == 0 {
            0.0
        } else {
            (self.wins as f64 / total as f64) * 100.0
        }
    }
}

/// Insertable counters, used as the seed row of an upsert.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::player_stats)]
pub(crate) struct NewPlayerStats {
    scope: String,
    identity: String,
    wins: i32,
    losses: i32,
    draws: i32,
}

/// Game outcome from one participant's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum GameOutcome {
    /// The participant won.
    Win,
    /// The participant lost.
    Loss,
    /// The game ended in a draw.
    Draw,
}

impl GameOutcome {
    /// Counter increments this outcome applies.
    pub fn delta(self) -> StatDelta {
        match self {
            Self::Win => StatDelta::new(1, 0, 0),
            Self::Loss => StatDelta::new(0, 1, 0),
            Self::Draw => StatDelta::new(0, 0, 1),
        }
    }
}

/// Increments applied to a statistics row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new, Getters)]
pub struct StatDelta {
    wins: i32,
    losses: i32,
    draws: i32,
}
