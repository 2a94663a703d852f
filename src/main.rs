//! tictactoe_sessions - command-line front end
//!
//! Plays and inspects games stored in the engine's SQLite database.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{Cli, Command};
use tictactoe_sessions::{
    EngineConfig, GameEngine, MoveReport, NewGame, PlayerStats, Position, Session,
};
use tracing::{debug, info, instrument};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let scope = cli
        .scope
        .clone()
        .unwrap_or_else(|| config.default_scope().clone());

    let engine = GameEngine::open(&config).context("Failed to open game database")?;

    match cli.command {
        Command::New {
            key,
            player_x,
            player_o,
            bot_first,
            difficulty,
        } => {
            let mut request = match player_o {
                Some(player_o) => NewGame::human_vs_human(scope, key, player_x, player_o),
                None => {
                    let request =
                        NewGame::human_vs_bot(scope, key, player_x, config.bot_identity().clone());
                    if bot_first {
                        request.bot_moves_first()
                    } else {
                        request
                    }
                }
            };
            request.difficulty = difficulty;

            let report = engine.start_game(request)?;
            print_report(&report);
        }
        Command::Play { key, actor, cell } => {
            let index = parse_cell(&cell)?;
            let report = engine.submit_move(&key, &actor, index)?;
            print_report(&report);
        }
        Command::Show { key } => match engine.session(&key) {
            Some(session) => print_session(&session),
            None => bail!("No game is in progress for '{}'", key),
        },
        Command::List => {
            let sessions = engine.sessions();
            if sessions.is_empty() {
                println!("No games in progress");
            }
            for session in &sessions {
                print_session(session);
                println!();
            }
        }
        Command::Abandon { key } => {
            let session = engine.abandon(&key)?;
            println!("Abandoned game '{}'", session.key());
        }
        Command::Stats { identity } => {
            let stats = engine.stats(&scope, &identity)?;
            print_stats(&stats);
        }
        Command::Leaderboard { limit, exclude } => {
            let rows = engine.leaderboard(&scope, limit, exclude.as_deref())?;
            if rows.is_empty() {
                println!("No games recorded in '{}'", scope);
            }
            for (rank, stats) in rows.iter().enumerate() {
                print!("{:>3}. ", rank + 1);
                print_stats(stats);
            }
        }
    }

    Ok(())
}

/// Resolves configuration: file, then environment, then flags.
#[instrument(skip(cli))]
fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };

    let mut config = config.with_env_overrides();
    if let Some(db_path) = &cli.db_path {
        config = config.with_database_path(db_path.clone());
    }
    config.validate()?;

    info!(database = %config.database_path(), "Configuration resolved");
    Ok(config)
}

/// Accepts a raw index, passed through unchecked, or a cell label.
fn parse_cell(cell: &str) -> Result<usize> {
    if let Ok(index) = cell.trim().parse::<usize>() {
        return Ok(index);
    }
    match Position::from_label_or_number(cell) {
        Some(position) => {
            debug!(position = %position, "Parsed cell label");
            Ok(position.to_index())
        }
        None => bail!("'{}' is not a cell (use 0-8 or a label such as top-left)", cell),
    }
}

fn print_report(report: &MoveReport) {
    for placement in report.placements() {
        let who = if *placement.by_bot() { " (bot)" } else { "" };
        println!(
            "{}{} placed {} at {}",
            placement.identity(),
            who,
            placement.mark(),
            placement.index()
        );
    }
    println!("{}", report.board().display());

    match report.result() {
        Some(result) => match result.winner() {
            Some(winner) => println!("{} wins!", winner),
            None => println!("It's a draw."),
        },
        None => println!("State: {:?}", report.state()),
    }
}

fn print_session(session: &Session) {
    println!(
        "{} [{}] {} as X vs {} as O ({}, {})",
        session.key(),
        session.scope(),
        session.participants().x(),
        session.participants().o(),
        session.mode(),
        session.difficulty()
    );
    println!("{}", session.board().display());
    if let Some(turn) = session.turn() {
        println!("{} to move ({})", turn, session.participants().get(turn));
    }
}

fn print_stats(stats: &PlayerStats) {
    println!(
        "{}: {} wins, {} losses, {} draws ({:.0}% won)",
        stats.identity(),
        stats.wins(),
        stats.losses(),
        stats.draws(),
        stats.win_rate()
    );
}
