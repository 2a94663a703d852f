//! Database persistence for in-flight sessions and player statistics.

mod error;
mod models;
mod repository;
mod schema; // Diesel generated schema - internal use only

pub use error::DbError;
pub use models::{GameOutcome, NewSessionRecord, PlayerStats, SessionRecord, StatDelta};
pub use repository::{GameRepository, MIGRATIONS};
