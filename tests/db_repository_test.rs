//! Tests for database repository operations.

use diesel::Connection;
use diesel::SqliteConnection;
use diesel_migrations::MigrationHarness;
use tempfile::NamedTempFile;

use tictactoe_sessions::{GameOutcome, GameRepository, MIGRATIONS, NewSessionRecord};

/// Creates a temporary database file with schema applied, returns the file
/// handle (must stay in scope to keep the file alive) and a ready repository.
fn setup_test_db() -> (NamedTempFile, GameRepository) {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();

    let mut conn = SqliteConnection::establish(&db_path).expect("Failed to connect");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("Migrations failed");

    let repo = GameRepository::new(db_path).expect("Failed to create repository");
    (db_file, repo)
}

fn session_row(key: &str, board: &str, turn: &str) -> NewSessionRecord {
    NewSessionRecord::new(
        key.to_string(),
        "guild".to_string(),
        board.to_string(),
        turn.to_string(),
        "human_vs_human".to_string(),
        true,
        r#"{"X":"alice","O":"bob"}"#.to_string(),
        "hard".to_string(),
        None,
    )
}

#[test]
fn test_empty_path_rejected() {
    assert!(GameRepository::new("  ".to_string()).is_err());
}

#[test]
fn test_run_migrations_is_idempotent() {
    let (_db, repo) = setup_test_db();
    repo.run_migrations().expect("Second migration run failed");
}

#[test]
fn test_insert_and_get_session() {
    let (_db, repo) = setup_test_db();
    assert!(repo.insert_session(&session_row("chan-1", "---------", "X")).expect("Insert failed"));

    let row = repo
        .get_session("chan-1")
        .expect("Query failed")
        .expect("Row missing");
    assert_eq!(row.board(), "---------");
    assert_eq!(row.current_turn(), "X");
    assert_eq!(row.mode(), "human_vs_human");
    assert!(*row.active());
    assert_eq!(row.bot_marker(), &None);
}

#[test]
fn test_insert_duplicate_key_returns_false() {
    let (_db, repo) = setup_test_db();
    assert!(repo.insert_session(&session_row("chan-1", "---------", "X")).expect("Insert failed"));
    assert!(!repo.insert_session(&session_row("chan-1", "X--------", "O")).expect("Insert failed"));

    let row = repo.get_session("chan-1").expect("Query failed").expect("Row missing");
    assert_eq!(row.board(), "---------", "Existing row must be untouched");
}

#[test]
fn test_update_session() {
    let (_db, repo) = setup_test_db();
    repo.insert_session(&session_row("chan-1", "---------", "X")).expect("Insert failed");

    assert!(repo.update_session(&session_row("chan-1", "----X----", "O")).expect("Update failed"));
    let row = repo.get_session("chan-1").expect("Query failed").expect("Row missing");
    assert_eq!(row.board(), "----X----");
    assert_eq!(row.current_turn(), "O");
}

#[test]
fn test_update_missing_session_returns_false() {
    let (_db, repo) = setup_test_db();
    assert!(!repo.update_session(&session_row("ghost", "---------", "X")).expect("Update failed"));
}

#[test]
fn test_delete_session() {
    let (_db, repo) = setup_test_db();
    repo.insert_session(&session_row("chan-1", "---------", "X")).expect("Insert failed");

    assert!(repo.delete_session("chan-1").expect("Delete failed"));
    assert!(!repo.delete_session("chan-1").expect("Delete failed"));
    assert!(repo.get_session("chan-1").expect("Query failed").is_none());
}

#[test]
fn test_list_sessions() {
    let (_db, repo) = setup_test_db();
    for key in ["b", "a", "c"] {
        repo.insert_session(&session_row(key, "---------", "X")).expect("Insert failed");
    }

    let rows = repo.list_sessions().expect("List failed");
    let mut keys: Vec<&str> = rows.iter().map(|r| r.session_key().as_str()).collect();
    keys.sort();
    assert_eq!(keys, ["a", "b", "c"]);
}

#[test]
fn test_get_stats_absent() {
    let (_db, repo) = setup_test_db();
    assert!(repo.get_stats("guild", "nobody").expect("Query failed").is_none());
}

#[test]
fn test_record_outcomes_accumulates() {
    let (_db, repo) = setup_test_db();
    repo.record_outcomes("guild", &[("alice", GameOutcome::Win), ("bob", GameOutcome::Loss)])
        .expect("Record failed");
    repo.record_outcomes("guild", &[("alice", GameOutcome::Draw), ("bob", GameOutcome::Draw)])
        .expect("Record failed");
    repo.record_outcomes("guild", &[("bob", GameOutcome::Win), ("alice", GameOutcome::Loss)])
        .expect("Record failed");

    let alice = repo.get_stats("guild", "alice").expect("Query failed").expect("Row missing");
    assert_eq!((*alice.wins(), *alice.losses(), *alice.draws()), (1, 1, 1));
    assert_eq!(alice.games_played(), 3);

    let bob = repo.get_stats("guild", "bob").expect("Query failed").expect("Row missing");
    assert_eq!((*bob.wins(), *bob.losses(), *bob.draws()), (1, 1, 1));
}

#[test]
fn test_stats_are_scoped() {
    let (_db, repo) = setup_test_db();
    repo.record_outcomes("guild-a", &[("alice", GameOutcome::Win)])
        .expect("Record failed");

    assert!(repo.get_stats("guild-b", "alice").expect("Query failed").is_none());
    let stats = repo.get_stats("guild-a", "alice").expect("Query failed").expect("Row missing");
    assert_eq!(*stats.wins(), 1);
}

#[test]
fn test_close_session_deletes_and_credits() {
    let (_db, repo) = setup_test_db();
    repo.insert_session(&session_row("chan-1", "XXX-OO---", "O")).expect("Insert failed");

    repo.close_session(
        "chan-1",
        "guild",
        &[("alice", GameOutcome::Win), ("bob", GameOutcome::Loss)],
    )
    .expect("Close failed");

    assert!(repo.get_session("chan-1").expect("Query failed").is_none());
    let alice = repo.get_stats("guild", "alice").expect("Query failed").expect("Row missing");
    assert_eq!(*alice.wins(), 1);
}

#[test]
fn test_close_missing_session_credits_nothing() {
    let (_db, repo) = setup_test_db();
    let result = repo.close_session(
        "ghost",
        "guild",
        &[("alice", GameOutcome::Win), ("bob", GameOutcome::Loss)],
    );

    assert!(result.is_err());
    assert!(repo.get_stats("guild", "alice").expect("Query failed").is_none());
    assert!(repo.get_stats("guild", "bob").expect("Query failed").is_none());
}

#[test]
fn test_leaderboard_ordering() {
    let (_db, repo) = setup_test_db();
    // carol: 2-0, alice: 1-0, bob: 1-1, dave: 1-0 (ties alice, sorts after)
    let games = [
        ("carol", "x1"),
        ("carol", "x2"),
        ("alice", "x3"),
        ("bob", "x4"),
        ("dave", "x5"),
        ("x6", "bob"),
    ];
    for (winner, loser) in games {
        repo.record_outcomes("guild", &[(winner, GameOutcome::Win), (loser, GameOutcome::Loss)])
            .expect("Record failed");
    }

    let rows = repo.leaderboard("guild", 4, &[]).expect("Leaderboard failed");
    let names: Vec<&str> = rows.iter().map(|r| r.identity().as_str()).collect();
    assert_eq!(names, ["carol", "alice", "dave", "x6"]);
}

#[test]
fn test_leaderboard_excludes_identity() {
    let (_db, repo) = setup_test_db();
    repo.record_outcomes("guild", &[("bot", GameOutcome::Win), ("alice", GameOutcome::Loss)])
        .expect("Record failed");
    repo.record_outcomes("guild", &[("bot", GameOutcome::Win), ("bob", GameOutcome::Loss)])
        .expect("Record failed");

    let rows = repo.leaderboard("guild", 10, &["bot"]).expect("Leaderboard failed");
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.identity() != "bot"));

    let rows = repo.leaderboard("guild", 10, &["bot", "alice"]).expect("Leaderboard failed");
    let names: Vec<&str> = rows.iter().map(|r| r.identity().as_str()).collect();
    assert_eq!(names, ["bob"]);

    let rows = repo.leaderboard("guild", 10, &[]).expect("Leaderboard failed");
    assert_eq!(rows[0].identity(), "bot");
}

#[test]
fn test_win_rate() {
    let (_db, repo) = setup_test_db();
    for outcome in [GameOutcome::Win, GameOutcome::Win, GameOutcome::Loss, GameOutcome::Draw] {
        repo.record_outcomes("guild", &[("frank", outcome)]).expect("Record failed");
    }

    let stats = repo.get_stats("guild", "frank").expect("Query failed").expect("Row missing");
    assert!((stats.win_rate() - 50.0).abs() < 0.001);
}

#[test]
fn test_game_outcome_display() {
    assert_eq!(GameOutcome::Win.to_string(), "win");
    assert_eq!(GameOutcome::Loss.to_string(), "loss");
    assert_eq!(GameOutcome::Draw.to_string(), "draw");
}
