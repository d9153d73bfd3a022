//! Pipeline tests with a scripted in-process engine.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::core::engine::MediaEngine;
use crate::core::fetcher::Fetcher;
use crate::core::history::HistoryStore;
use crate::core::models::{
    AppError, AppResult, CollectionEntry, ItemMetadata, Probe,
};

/// Engine double: `probe` replays a fixed result, `fetch_audio` stages
/// predictable fake artifacts.
struct FakeEngine {
    probe_result: Probe,
    /// Ids whose download returns an error
    fail_fetch: HashSet<String>,
    /// Ids whose download succeeds but stages nothing
    silent_fetch: HashSet<String>,
    /// Ids whose download stages two artifacts instead of one
    double_fetch: HashSet<String>,
}

impl FakeEngine {
    fn new(probe_result: Probe) -> Self {
        Self {
            probe_result,
            fail_fetch: HashSet::new(),
            silent_fetch: HashSet::new(),
            double_fetch: HashSet::new(),
        }
    }

    fn single(video_id: Option<&str>) -> Self {
        Self::new(Probe::Single {
            video_id: video_id.map(str::to_string),
            title: video_id.map(|id| format!("Title {id}")),
        })
    }

    fn collection(title: &str, ids: &[Option<&str>]) -> Self {
        Self::new(Probe::Collection {
            title: title.to_string(),
            entries: ids
                .iter()
                .map(|id| CollectionEntry {
                    video_id: id.map(str::to_string),
                    title: id.map(|id| format!("Title {id}")),
                })
                .collect(),
        })
    }
}

#[async_trait]
impl MediaEngine for FakeEngine {
    async fn probe(&self, _url: &str) -> AppResult<Probe> {
        Ok(self.probe_result.clone())
    }

    async fn item_metadata(&self, video_id: &str) -> AppResult<ItemMetadata> {
        Ok(ItemMetadata {
            title: format!("Title {video_id}"),
            album: None,
            artist: Some("Fake Artist".to_string()),
        })
    }

    async fn fetch_audio(
        &self,
        video_id: &str,
        dest_dir: &Path,
        _album: Option<&str>,
    ) -> AppResult<()> {
        if self.fail_fetch.contains(video_id) {
            return Err(AppError::Download(format!("scripted failure for {video_id}")));
        }
        if self.silent_fetch.contains(video_id) {
            return Ok(());
        }
        if self.double_fetch.contains(video_id) {
            std::fs::write(dest_dir.join("alpha.opus"), "alpha")?;
            std::fs::write(dest_dir.join("beta.opus"), "beta")?;
            return Ok(());
        }
        std::fs::write(
            dest_dir.join(format!("{video_id} - staged.opus")),
            format!("opus data {video_id}"),
        )?;
        Ok(())
    }
}

struct Sandbox {
    _dir: tempfile::TempDir,
    output_dir: PathBuf,
    history_path: PathBuf,
}

fn sandbox() -> Sandbox {
    let dir = tempfile::tempdir().unwrap();
    let output_dir = dir.path().join("library");
    let history_path = dir.path().join("history.json");
    Sandbox {
        _dir: dir,
        output_dir,
        history_path,
    }
}

#[tokio::test]
async fn single_item_is_downloaded_and_recorded() {
    let sandbox = sandbox();
    let engine = FakeEngine::single(Some("vid001"));
    let history = HistoryStore::load(&sandbox.history_path);
    let mut fetcher = Fetcher::new(engine, history, sandbox.output_dir.clone()).unwrap();

    let report = fetcher.process("https://example.com/watch").await.unwrap();
    assert_eq!(report.downloaded, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.failed, 0);

    let dest = sandbox.output_dir.join("Title vid001.vid001.opus");
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "opus data vid001");

    let reloaded = HistoryStore::load(&sandbox.history_path);
    assert!(reloaded.is_present("vid001"));
    assert_eq!(
        reloaded.entry_for("vid001").unwrap().artist.as_deref(),
        Some("Fake Artist")
    );
}

#[tokio::test]
async fn collection_skips_items_already_in_history() {
    let sandbox = sandbox();
    let mut history = HistoryStore::load(&sandbox.history_path);
    history.upsert("a1", "Old Title", "Old Title.a1.opus", None, None);

    let engine = FakeEngine::collection("Mix", &[Some("a1"), Some("b2")]);
    let mut fetcher = Fetcher::new(engine, history, sandbox.output_dir.clone()).unwrap();

    let report = fetcher.process("https://example.com/playlist").await.unwrap();
    assert_eq!(report.downloaded, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);

    // The skipped item was not re-downloaded.
    assert!(!sandbox.output_dir.join("Title a1.a1.opus").exists());
    assert!(sandbox.output_dir.join("Title b2.b2.opus").exists());

    let store = fetcher.history();
    assert_eq!(store.len(), 2);
    assert_eq!(store.artifact_for("a1"), Some("Old Title.a1.opus"));
}

#[tokio::test]
async fn collection_title_becomes_album_tag() {
    let sandbox = sandbox();
    let engine = FakeEngine::collection("Road Trip Mix", &[Some("c3")]);
    let history = HistoryStore::load(&sandbox.history_path);
    let mut fetcher = Fetcher::new(engine, history, sandbox.output_dir.clone()).unwrap();

    fetcher.process("https://example.com/playlist").await.unwrap();

    let entry = fetcher.history().entry_for("c3").unwrap().clone();
    assert_eq!(entry.album.as_deref(), Some("Road Trip Mix"));
}

#[tokio::test]
async fn entry_without_id_counts_as_failed() {
    let sandbox = sandbox();
    let engine = FakeEngine::collection("Mix", &[None, Some("d4")]);
    let history = HistoryStore::load(&sandbox.history_path);
    let mut fetcher = Fetcher::new(engine, history, sandbox.output_dir.clone()).unwrap();

    let report = fetcher.process("https://example.com/playlist").await.unwrap();
    assert_eq!(report.downloaded, 1);
    assert_eq!(report.failed, 1);
}

#[tokio::test]
async fn single_without_id_is_an_error() {
    let sandbox = sandbox();
    let engine = FakeEngine::single(None);
    let history = HistoryStore::load(&sandbox.history_path);
    let mut fetcher = Fetcher::new(engine, history, sandbox.output_dir.clone()).unwrap();

    let err = fetcher.process("https://example.com/watch").await.unwrap_err();
    assert!(matches!(err, AppError::Resolution(_)));
}

#[tokio::test]
async fn fetch_error_is_counted_not_fatal() {
    let sandbox = sandbox();
    let mut engine = FakeEngine::collection("Mix", &[Some("e5"), Some("f6")]);
    engine.fail_fetch.insert("e5".to_string());
    let history = HistoryStore::load(&sandbox.history_path);
    let mut fetcher = Fetcher::new(engine, history, sandbox.output_dir.clone()).unwrap();

    let report = fetcher.process("https://example.com/playlist").await.unwrap();
    assert_eq!(report.downloaded, 1);
    assert_eq!(report.failed, 1);
    assert!(!fetcher.history().is_present("e5"));
    assert!(fetcher.history().is_present("f6"));
}

#[tokio::test]
async fn missing_artifact_is_a_failure_and_leaves_no_trace() {
    let sandbox = sandbox();
    let mut engine = FakeEngine::single(Some("g7"));
    engine.silent_fetch.insert("g7".to_string());
    let history = HistoryStore::load(&sandbox.history_path);
    let mut fetcher = Fetcher::new(engine, history, sandbox.output_dir.clone()).unwrap();

    let report = fetcher.process("https://example.com/watch").await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.downloaded, 0);
    assert!(!fetcher.history().is_present("g7"));
    assert!(!sandbox.output_dir.join("Title g7.g7.opus").exists());
}

#[tokio::test]
async fn stale_destination_file_is_replaced() {
    let sandbox = sandbox();
    std::fs::create_dir_all(&sandbox.output_dir).unwrap();
    let dest = sandbox.output_dir.join("Title h8.h8.opus");
    std::fs::write(&dest, "stale bytes").unwrap();

    let engine = FakeEngine::single(Some("h8"));
    let history = HistoryStore::load(&sandbox.history_path);
    let mut fetcher = Fetcher::new(engine, history, sandbox.output_dir.clone()).unwrap();

    let report = fetcher.process("https://example.com/watch").await.unwrap();
    assert_eq!(report.downloaded, 1);
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "opus data h8");
}

#[tokio::test]
async fn extra_artifacts_keep_first_in_name_order() {
    let sandbox = sandbox();
    let mut engine = FakeEngine::single(Some("i9"));
    engine.double_fetch.insert("i9".to_string());
    let history = HistoryStore::load(&sandbox.history_path);
    let mut fetcher = Fetcher::new(engine, history, sandbox.output_dir.clone()).unwrap();

    let report = fetcher.process("https://example.com/watch").await.unwrap();
    assert_eq!(report.downloaded, 1);

    let dest = sandbox.output_dir.join("Title i9.i9.opus");
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "alpha");
}
