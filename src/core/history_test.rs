//! On-disk integration tests for the history store.

use std::path::PathBuf;

use crate::core::history::HistoryStore;

fn history_path() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    (dir, path)
}

#[test]
fn entries_survive_reload() {
    let (_dir, path) = history_path();

    let mut store = HistoryStore::load(&path);
    store.upsert(
        "vid001",
        "First Song",
        "First Song.vid001.opus",
        Some("An Album".to_string()),
        Some("An Artist".to_string()),
    );
    drop(store);

    let reloaded = HistoryStore::load(&path);
    assert!(reloaded.is_present("vid001"));
    assert_eq!(reloaded.artifact_for("vid001"), Some("First Song.vid001.opus"));

    let entry = reloaded.entry_for("vid001").unwrap();
    assert_eq!(entry.title, "First Song");
    assert_eq!(entry.album.as_deref(), Some("An Album"));
    assert_eq!(entry.artist.as_deref(), Some("An Artist"));
}

#[test]
fn upsert_is_idempotent_per_id() {
    let (_dir, path) = history_path();

    let mut store = HistoryStore::load(&path);
    store.upsert("vid001", "Old Title", "Old Title.vid001.opus", None, None);
    store.upsert(
        "vid001",
        "New Title",
        "New Title.vid001.opus",
        Some("Album".to_string()),
        None,
    );

    assert_eq!(store.len(), 1);
    assert_eq!(store.artifact_for("vid001"), Some("New Title.vid001.opus"));

    let reloaded = HistoryStore::load(&path);
    assert_eq!(reloaded.len(), 1);
    assert_eq!(
        reloaded.entry_for("vid001").unwrap().album.as_deref(),
        Some("Album")
    );
}

#[test]
fn corrupt_file_degrades_to_empty_and_is_overwritten() {
    let (_dir, path) = history_path();
    std::fs::write(&path, "{ this is not json").unwrap();

    let mut store = HistoryStore::load(&path);
    assert!(store.is_empty());

    store.upsert("vid002", "Recovered", "Recovered.vid002.opus", None, None);

    // The store rewrote the file with valid JSON.
    let content = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(value["downloaded_videos"].as_array().unwrap().len(), 1);

    let reloaded = HistoryStore::load(&path);
    assert!(reloaded.is_present("vid002"));
}

#[test]
fn wrong_shape_degrades_to_empty() {
    let (_dir, path) = history_path();
    std::fs::write(&path, r#"{"downloaded_videos": 42}"#).unwrap();

    let store = HistoryStore::load(&path);
    assert!(store.is_empty());
}

#[test]
fn legacy_map_schema_is_readable() {
    let (_dir, path) = history_path();
    std::fs::write(
        &path,
        r#"{"downloaded_videos": {"vid003": "Old One.vid003.opus"}}"#,
    )
    .unwrap();

    let store = HistoryStore::load(&path);
    assert!(store.is_present("vid003"));
    assert_eq!(store.artifact_for("vid003"), Some("Old One.vid003.opus"));
    assert_eq!(store.entry_for("vid003").unwrap().title, "Old One");
}

#[test]
fn all_entries_is_a_defensive_copy() {
    let (_dir, path) = history_path();

    let mut store = HistoryStore::load(&path);
    store.upsert("vid004", "Kept", "Kept.vid004.opus", None, None);

    let mut copy = store.all_entries();
    copy.clear();

    assert_eq!(store.len(), 1);
    assert!(store.is_present("vid004"));
}

#[test]
fn save_failure_keeps_in_memory_state() {
    // Point the store at a path whose parent cannot be created.
    let (_dir, base) = history_path();
    std::fs::write(&base, "").unwrap();
    let unwritable = base.join("nested").join("history.json");

    let mut store = HistoryStore::load(&unwritable);
    store.upsert("vid005", "Unsaved", "Unsaved.vid005.opus", None, None);

    assert!(store.is_present("vid005"));
}
