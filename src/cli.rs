//! Command-line interface for tictactoe_sessions.

use clap::{Parser, Subcommand};

/// Tic-tac-toe session engine - play and inspect games from the terminal
#[derive(Parser, Debug)]
#[command(name = "tictactoe_sessions")]
#[command(about = "Turn-based tic-tac-toe with persistent statistics", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to an engine config file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Database file, overriding config and environment
    #[arg(long, global = true)]
    pub db_path: Option<String>,

    /// Statistics scope, overriding the configured default
    #[arg(long, global = true)]
    pub scope: Option<String>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a game
    New {
        /// Session key (one game per key)
        key: String,

        /// Identity holding X
        #[arg(short = 'x', long)]
        player_x: String,

        /// Identity holding O; omit to play the bot
        #[arg(short = 'o', long)]
        player_o: Option<String>,

        /// Let the bot hold X and open the game
        #[arg(long, conflicts_with = "player_o")]
        bot_first: bool,

        /// Bot difficulty (easy, medium, hard)
        #[arg(short, long)]
        difficulty: Option<String>,
    },

    /// Place a marker
    Play {
        /// Session key
        key: String,

        /// Identity making the move
        actor: String,

        /// Cell index (0-8) or label such as top-left
        cell: String,
    },

    /// Show one game in progress
    Show {
        /// Session key
        key: String,
    },

    /// List every game in progress
    List,

    /// End a game without crediting anyone
    Abandon {
        /// Session key
        key: String,
    },

    /// Show statistics for one identity
    Stats {
        /// Identity to look up
        identity: String,
    },

    /// Show the top identities of the scope
    Leaderboard {
        /// Number of rows
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Another identity to leave out; the bot is always left out
        #[arg(long)]
        exclude: Option<String>,
    },
}
