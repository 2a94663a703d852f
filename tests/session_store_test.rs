//! Tests for the in-memory session registry and its SQLite backing.

use rand::SeedableRng;
use rand::rngs::StdRng;
use tempfile::NamedTempFile;

use tictactoe_sessions::{
    Difficulty, GameMode, GameRepository, Mark, MoveOracle, NewSessionRecord, Participants,
    Session, SessionStore, StoreError,
};

fn setup_store() -> (NamedTempFile, GameRepository, SessionStore) {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();

    let repo = GameRepository::new(db_path).expect("Failed to create repository");
    repo.run_migrations().expect("Migrations failed");
    let store = SessionStore::new(repo.clone());
    (db_file, repo, store)
}

fn human_session(key: &str) -> Session {
    Session::new(
        key.to_string(),
        "guild".to_string(),
        GameMode::HumanVsHuman,
        Participants::new("alice", "bob"),
        None,
        Difficulty::Hard,
    )
    .expect("Valid session")
}

fn bot_session(key: &str) -> Session {
    Session::new(
        key.to_string(),
        "guild".to_string(),
        GameMode::HumanVsBot,
        Participants::new("alice", "bot"),
        Some(Mark::O),
        Difficulty::Easy,
    )
    .expect("Valid session")
}

#[test]
fn test_create_and_get() {
    let (_db, repo, store) = setup_store();
    store.create(human_session("chan-1")).expect("Create failed");

    assert!(store.contains("chan-1"));
    assert_eq!(store.len(), 1);
    let handle = store.get("chan-1").expect("Session missing");
    assert_eq!(handle.lock().unwrap().key(), "chan-1");
    assert!(store.get("chan-2").is_none());
    assert!(repo.get_session("chan-1").expect("Query failed").is_some());
}

#[test]
fn test_duplicate_key_is_already_active() {
    let (_db, repo, store) = setup_store();
    store.create(human_session("chan-1")).expect("Create failed");

    let err = store.create(bot_session("chan-1")).unwrap_err();
    assert!(matches!(err, StoreError::AlreadyActive(ref key) if key == "chan-1"));

    let original = store.get("chan-1").expect("Session missing");
    assert_eq!(*original.lock().unwrap().mode(), GameMode::HumanVsHuman);
    let row = repo.get_session("chan-1").expect("Query failed").expect("Row missing");
    assert_eq!(row.mode(), "human_vs_human");
}

#[test]
fn test_existing_row_blocks_create() {
    let (_db, repo, store) = setup_store();
    let row = NewSessionRecord::new(
        "chan-1".to_string(),
        "guild".to_string(),
        "---------".to_string(),
        "X".to_string(),
        "human_vs_human".to_string(),
        true,
        r#"{"X":"carol","O":"dave"}"#.to_string(),
        "hard".to_string(),
        None,
    );
    repo.insert_session(&row).expect("Insert failed");

    let err = store.create(human_session("chan-1")).unwrap_err();
    assert!(matches!(err, StoreError::AlreadyActive(_)));
    assert!(store.is_empty());
}

#[test]
fn test_persist_then_reload() {
    let (_db, repo, store) = setup_store();
    let handle = store.create(bot_session("chan-1")).expect("Create failed");
    store.create(human_session("chan-2")).expect("Create failed");

    {
        let mut session = handle.lock().unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        session
            .submit_move("alice", 4, &MoveOracle::default(), &mut rng)
            .expect("Move failed");
        store.persist(&session).expect("Persist failed");
    }
    let expected = handle.lock().unwrap().clone();
    drop(store);

    let reloaded = SessionStore::load(repo).expect("Reload failed");
    assert_eq!(reloaded.len(), 2);

    let restored = reloaded.get("chan-1").expect("Session missing");
    let restored = restored.lock().unwrap();
    assert_eq!(*restored, expected);
    assert_eq!(restored.board().occupied_count(), 2);
    assert_eq!(restored.turn(), Some(Mark::X));
    assert_eq!(*restored.difficulty(), Difficulty::Easy);
    assert_eq!(*restored.bot_marker(), Some(Mark::O));
    assert!(restored.is_bot("bot"));
}

#[test]
fn test_load_skips_unreadable_rows() {
    let (_db, repo, store) = setup_store();
    store.create(human_session("good")).expect("Create failed");

    let broken = NewSessionRecord::new(
        "broken".to_string(),
        "guild".to_string(),
        "XX".to_string(),
        "O".to_string(),
        "human_vs_human".to_string(),
        true,
        r#"{"X":"carol","O":"dave"}"#.to_string(),
        "hard".to_string(),
        None,
    );
    repo.insert_session(&broken).expect("Insert failed");

    let reloaded = SessionStore::load(repo.clone()).expect("Reload failed");
    assert!(reloaded.contains("good"));
    assert!(!reloaded.contains("broken"));
    assert!(repo.get_session("broken").expect("Query failed").is_some());
}

#[test]
fn test_load_skips_rows_with_inconsistent_turn() {
    let (_db, repo, store) = setup_store();
    let row = |key: &str, board: &str, turn: &str, mode: &str, bot: Option<&str>| {
        NewSessionRecord::new(
            key.to_string(),
            "guild".to_string(),
            board.to_string(),
            turn.to_string(),
            mode.to_string(),
            true,
            r#"{"X":"alice","O":"bot"}"#.to_string(),
            "hard".to_string(),
            bot.map(str::to_string),
        )
    };
    repo.insert_session(&row("mismatch", "----X----", "X", "human_vs_human", None))
        .expect("Insert failed");
    repo.insert_session(&row("bot-turn", "----X----", "O", "human_vs_bot", Some("O")))
        .expect("Insert failed");
    repo.insert_session(&row("fine", "X---O----", "X", "human_vs_bot", Some("O")))
        .expect("Insert failed");
    drop(store);

    let reloaded = SessionStore::load(repo).expect("Reload failed");
    assert!(!reloaded.contains("mismatch"));
    assert!(!reloaded.contains("bot-turn"));
    assert!(reloaded.contains("fine"));
}

#[test]
fn test_persist_without_row_fails() {
    let (_db, _repo, store) = setup_store();
    assert!(store.persist(&human_session("ghost")).is_err());
}

#[test]
fn test_remove_deletes_row() {
    let (_db, repo, store) = setup_store();
    store.create(human_session("chan-1")).expect("Create failed");

    let removed = store.remove("chan-1").expect("Remove failed");
    assert!(removed.is_some());
    assert!(!store.contains("chan-1"));
    assert!(repo.get_session("chan-1").expect("Query failed").is_none());

    assert!(store.remove("chan-1").expect("Remove failed").is_none());
}

#[test]
fn test_key_is_reusable_after_remove() {
    let (_db, _repo, store) = setup_store();
    store.create(human_session("chan-1")).expect("Create failed");
    store.remove("chan-1").expect("Remove failed");

    store.create(bot_session("chan-1")).expect("Recreate failed");
    let handle = store.get("chan-1").expect("Session missing");
    assert_eq!(*handle.lock().unwrap().mode(), GameMode::HumanVsBot);
}

#[test]
fn test_list_all_sorted_by_key() {
    let (_db, _repo, store) = setup_store();
    for key in ["c", "a", "b"] {
        store.create(human_session(key)).expect("Create failed");
    }

    let keys: Vec<String> = store.list_all().iter().map(|s| s.key().clone()).collect();
    assert_eq!(keys, ["a", "b", "c"]);
}
