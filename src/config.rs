//! Engine configuration.

use crate::games::tictactoe::{Difficulty, MoveOracle};
use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Environment variable overriding [`EngineConfig::database_path`].
pub const DATABASE_ENV: &str = "TICTACTOE_DATABASE";

/// Configuration for the session engine.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
pub struct EngineConfig {
    /// SQLite database file holding sessions and statistics.
    #[serde(default = "default_database_path")]
    database_path: String,

    /// Scope used when a request names none.
    #[serde(default = "default_scope")]
    default_scope: String,

    /// Identity of the automated opponent; excluded from leaderboards.
    #[serde(default = "default_bot_identity")]
    bot_identity: String,

    /// Difficulty used when a new game names none.
    #[serde(default)]
    default_difficulty: Difficulty,

    /// Oracle tuning.
    #[serde(default)]
    oracle: OracleConfig,
}

/// Oracle tuning knobs.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Chance of a random move on easy.
    #[serde(default = "default_easy_random_chance")]
    easy_random_chance: f64,

    /// Chance of a random move on medium.
    #[serde(default = "default_medium_random_chance")]
    medium_random_chance: f64,

    /// Search depth bound for easy and medium; unbounded when absent.
    #[serde(default)]
    max_depth: Option<usize>,
}

fn default_database_path() -> String {
    "tictactoe.db".to_string()
}

fn default_scope() -> String {
    "global".to_string()
}

fn default_bot_identity() -> String {
    "bot".to_string()
}

fn default_easy_random_chance() -> f64 {
    0.7
}

fn default_medium_random_chance() -> f64 {
    0.5
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            easy_random_chance: default_easy_random_chance(),
            medium_random_chance: default_medium_random_chance(),
            max_depth: None,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            default_scope: default_scope(),
            bot_identity: default_bot_identity(),
            default_difficulty: Difficulty::default(),
            oracle: OracleConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config = Self::from_toml(&content)?;
        info!(database = %config.database_path, "Config loaded successfully");
        Ok(config)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text is not valid TOML or fails
    /// validation.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] describing the first invalid value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.trim().is_empty() {
            return Err(ConfigError::new("database_path must not be empty"));
        }
        if self.bot_identity.trim().is_empty() {
            return Err(ConfigError::new("bot_identity must not be empty"));
        }
        for (name, chance) in [
            ("easy_random_chance", self.oracle.easy_random_chance),
            ("medium_random_chance", self.oracle.medium_random_chance),
        ] {
            if !(0.0..=1.0).contains(&chance) {
                return Err(ConfigError::new(format!(
                    "{} must be between 0 and 1, got {}",
                    name, chance
                )));
            }
        }
        Ok(())
    }

    /// Overrides the database path from [`DATABASE_ENV`] when it is set.
    #[instrument(skip(self))]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var(DATABASE_ENV) {
            if !path.trim().is_empty() {
                debug!(path = %path, "Database path taken from environment");
                self.database_path = path;
            }
        }
        self
    }

    /// Replaces the database path.
    pub fn with_database_path(mut self, path: impl Into<String>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Replaces the default difficulty.
    pub fn with_default_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.default_difficulty = difficulty;
        self
    }

    /// Builds the oracle described by the `[oracle]` table.
    pub fn move_oracle(&self) -> MoveOracle {
        MoveOracle::new(
            self.oracle.easy_random_chance,
            self.oracle.medium_random_chance,
            self.oracle.max_depth,
        )
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}
