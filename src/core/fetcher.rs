//! Download orchestration
//!
//! The fetcher drives one URL through the full pipeline: probe, dedupe
//! against history, stage into a scratch subdirectory, validate the single
//! `.opus` artifact, relocate it into the library and record the result.
//! Per-item faults are counted and logged; only malformed input for a whole
//! URL propagates as an error.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{error, info, warn};

use crate::core::engine::MediaEngine;
use crate::core::history::HistoryStore;
use crate::core::models::{AppError, AppResult, Probe, PullReport};
use crate::utils::file_utils::{ensure_dir_exists, move_file};

/// Sanitized title prefix is capped so the full filename stays well under
/// common filesystem limits.
pub const MAX_TITLE_LEN: usize = 200;

enum ItemOutcome {
    Downloaded(String),
    AlreadyPresent(String),
    Failed,
}

/// Sequential download pipeline over one engine and one history store.
pub struct Fetcher<E> {
    engine: E,
    history: HistoryStore,
    output_dir: PathBuf,
    scratch_root: Option<tempfile::TempDir>,
}

impl<E: MediaEngine> Fetcher<E> {
    pub fn new(engine: E, history: HistoryStore, output_dir: PathBuf) -> AppResult<Self> {
        ensure_dir_exists(&output_dir)?;
        Ok(Self {
            engine,
            history,
            output_dir,
            scratch_root: None,
        })
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Process one input URL: probe it, then download whatever it names.
    pub async fn process(&mut self, url: &str) -> AppResult<PullReport> {
        let mut report = PullReport::default();
        match self.engine.probe(url).await? {
            Probe::Single { video_id, title } => {
                let video_id = video_id.ok_or_else(|| {
                    AppError::Resolution(format!("no video id in metadata for {url}"))
                })?;
                match self.download_one(&video_id, title.as_deref(), None).await {
                    ItemOutcome::Downloaded(filename) => {
                        info!("downloaded {filename}");
                        report.downloaded += 1;
                    }
                    ItemOutcome::AlreadyPresent(filename) => {
                        info!("already in library, skipping: {filename}");
                        report.skipped += 1;
                    }
                    ItemOutcome::Failed => report.failed += 1,
                }
            }
            Probe::Collection { title, entries } => {
                if entries.is_empty() {
                    info!("collection '{title}' has no entries, nothing to do");
                    return Ok(report);
                }
                info!("collection '{title}': {} entries", entries.len());
                let total = entries.len();
                for (index, entry) in entries.iter().enumerate() {
                    let position = index + 1;
                    let Some(video_id) = entry.video_id.as_deref() else {
                        warn!("[{position}/{total}] entry has no video id, skipping");
                        report.failed += 1;
                        continue;
                    };
                    info!(
                        "[{position}/{total}] {} ({video_id})",
                        entry.title.as_deref().unwrap_or(video_id)
                    );
                    match self
                        .download_one(video_id, entry.title.as_deref(), Some(title.as_str()))
                        .await
                    {
                        ItemOutcome::Downloaded(filename) => {
                            info!("[{position}/{total}] downloaded {filename}");
                            report.downloaded += 1;
                        }
                        ItemOutcome::AlreadyPresent(filename) => {
                            info!("[{position}/{total}] already in library: {filename}");
                            report.skipped += 1;
                        }
                        ItemOutcome::Failed => report.failed += 1,
                    }
                }
            }
        }
        Ok(report)
    }

    /// Download a single item unless the history already has it. Never
    /// returns an error: every fault is logged and folded into the outcome.
    async fn download_one(
        &mut self,
        video_id: &str,
        fallback_title: Option<&str>,
        collection_title: Option<&str>,
    ) -> ItemOutcome {
        if let Some(existing) = self.history.artifact_for(video_id) {
            return ItemOutcome::AlreadyPresent(existing.to_string());
        }

        let metadata = match self.engine.item_metadata(video_id).await {
            Ok(metadata) => metadata,
            Err(err) => {
                error!("metadata fetch failed for {video_id}: {err}");
                return ItemOutcome::Failed;
            }
        };

        let raw_title = if metadata.title.trim().is_empty() {
            fallback_title.unwrap_or("Unknown")
        } else {
            metadata.title.as_str()
        };
        let base = sanitize_title(raw_title);
        let filename = format!("{base}.{video_id}.opus");
        let dest = self.output_dir.join(&filename);
        let album = metadata
            .album
            .clone()
            .or_else(|| collection_title.map(str::to_string));

        let scratch = match self.item_scratch_dir(&base, video_id).await {
            Ok(scratch) => scratch,
            Err(err) => {
                error!("could not create scratch directory for {video_id}: {err}");
                return ItemOutcome::Failed;
            }
        };

        let result = self
            .stage_and_relocate(video_id, &scratch, &dest, album.as_deref())
            .await;

        // Scratch contents are per-item; never let a leftover pollute the
        // next download's artifact scan.
        if let Err(err) = fs::remove_dir_all(&scratch).await {
            warn!("could not clean scratch {}: {}", scratch.display(), err);
        }

        match result {
            Ok(()) => {
                self.history.upsert(
                    video_id,
                    raw_title,
                    &filename,
                    album,
                    metadata.artist.clone(),
                );
                ItemOutcome::Downloaded(filename)
            }
            Err(err) => {
                error!("download failed for {video_id}: {err}");
                // A half-moved artifact must not shadow a future retry.
                if dest.exists() {
                    if let Err(err) = fs::remove_file(&dest).await {
                        warn!("could not remove partial file {}: {}", dest.display(), err);
                    }
                }
                ItemOutcome::Failed
            }
        }
    }

    async fn stage_and_relocate(
        &self,
        video_id: &str,
        scratch: &Path,
        dest: &Path,
        album: Option<&str>,
    ) -> AppResult<()> {
        self.engine.fetch_audio(video_id, scratch, album).await?;

        let artifact = select_artifact(scratch, video_id).await?;

        if dest.exists() {
            fs::remove_file(dest).await?;
        }
        move_file(&artifact, dest)?;

        if !dest.exists() {
            return Err(AppError::Download(format!(
                "artifact did not land at {}",
                dest.display()
            )));
        }
        Ok(())
    }

    /// Per-item staging subdirectory under a process-lifetime scratch root.
    /// The root is a temp directory, removed when the fetcher drops, so an
    /// interrupted run leaves no partial files in the library.
    async fn item_scratch_dir(&mut self, base: &str, video_id: &str) -> AppResult<PathBuf> {
        if self.scratch_root.is_none() {
            let root = tempfile::Builder::new()
                .prefix("yt-audio-archiver-")
                .tempdir()?;
            self.scratch_root = Some(root);
        }
        let root = self
            .scratch_root
            .as_ref()
            .ok_or_else(|| AppError::Download("scratch root unavailable".to_string()))?;
        let dir = root.path().join(format!("{base}.{video_id}"));
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }
}

/// Find the one `.opus` file the engine staged. Zero artifacts is a failed
/// download; more than one means the engine behaved unexpectedly, so the
/// first in name order is kept and the rest are reported.
async fn select_artifact(scratch: &Path, video_id: &str) -> AppResult<PathBuf> {
    let mut candidates = Vec::new();
    let mut dir = fs::read_dir(scratch).await?;
    while let Some(entry) = dir.next_entry().await? {
        let path = entry.path();
        let is_opus = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("opus"));
        if is_opus {
            candidates.push(path);
        }
    }

    if candidates.is_empty() {
        return Err(AppError::Download(format!(
            "no .opus artifact produced for {video_id}"
        )));
    }
    candidates.sort();
    if candidates.len() > 1 {
        warn!(
            "{} .opus artifacts staged for {video_id}, keeping {}",
            candidates.len(),
            candidates[0].display()
        );
    }
    Ok(candidates.remove(0))
}

/// Replace filesystem-hostile characters with underscores, trim surrounding
/// whitespace and cap the length. Truncation never leaves trailing
/// whitespace behind.
pub fn sanitize_title(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            other => other,
        })
        .collect();
    let trimmed = replaced.trim();
    let capped: String = trimmed.chars().take(MAX_TITLE_LEN).collect();
    capped.trim_end().to_string()
}
