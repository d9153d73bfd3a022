//! Persistent download history
//!
//! Maps content identifiers to previously produced artifacts so a run never
//! re-downloads what the library already holds. The store is a single JSON
//! document, loaded once at startup and flushed synchronously after every
//! mutation; the process may be interrupted between items, so durability
//! wins over write batching.
//!
//! Load never aborts the run: a missing file is an empty store, a corrupt
//! file degrades to an empty store with a warning. A failed save is also a
//! warning only, because it must not discard the download that just
//! succeeded; the in-memory state stays authoritative for the rest of the
//! run.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::models::HistoryEntry;

#[derive(Serialize)]
struct HistoryDocumentRef<'a> {
    downloaded_videos: &'a [HistoryEntry],
}

#[derive(Deserialize)]
struct HistoryDocument {
    #[serde(default)]
    downloaded_videos: HistoryPayload,
}

/// Both history schema generations: the rich record list and the legacy
/// `id -> filename` map.
#[derive(Deserialize)]
#[serde(untagged)]
enum HistoryPayload {
    Entries(Vec<HistoryEntry>),
    Legacy(HashMap<String, String>),
}

impl Default for HistoryPayload {
    fn default() -> Self {
        Self::Entries(Vec::new())
    }
}

/// Exclusively owned download history, keyed by video id.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    entries: Vec<HistoryEntry>,
}

impl HistoryStore {
    /// Load the history from `path`. Never fails: missing and corrupt
    /// backing files both produce an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::read_entries(&path);
        debug!(
            "loaded {} history entries from {}",
            entries.len(),
            path.display()
        );
        Self { path, entries }
    }

    fn read_entries(path: &Path) -> Vec<HistoryEntry> {
        if !path.exists() {
            return Vec::new();
        }
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                warn!("could not read history from {}: {}", path.display(), err);
                return Vec::new();
            }
        };
        match serde_json::from_str::<HistoryDocument>(&content) {
            Ok(document) => match document.downloaded_videos {
                HistoryPayload::Entries(entries) => entries,
                HistoryPayload::Legacy(map) => {
                    debug!("converting legacy history schema ({} entries)", map.len());
                    map.into_iter().map(entry_from_legacy).collect()
                }
            },
            Err(err) => {
                warn!("could not parse history from {}: {}", path.display(), err);
                Vec::new()
            }
        }
    }

    /// True when `video_id` already has a recorded artifact.
    pub fn is_present(&self, video_id: &str) -> bool {
        self.entries.iter().any(|entry| entry.video_id == video_id)
    }

    /// Recorded artifact filename for `video_id`, if any.
    pub fn artifact_for(&self, video_id: &str) -> Option<&str> {
        self.entry_for(video_id).map(|entry| entry.filename.as_str())
    }

    pub fn entry_for(&self, video_id: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(|entry| entry.video_id == video_id)
    }

    /// Record a finished download, replacing any prior entry for the same
    /// id, and flush to disk. A failed flush is reported but never unwinds:
    /// the in-memory entry stays.
    pub fn upsert(
        &mut self,
        video_id: &str,
        title: &str,
        filename: &str,
        album: Option<String>,
        artist: Option<String>,
    ) {
        self.entries.retain(|entry| entry.video_id != video_id);
        self.entries.push(HistoryEntry {
            video_id: video_id.to_string(),
            title: title.to_string(),
            filename: filename.to_string(),
            download_date: Utc::now(),
            album,
            artist,
        });
        if let Err(err) = self.save() {
            warn!("could not save history to {}: {}", self.path.display(), err);
        }
    }

    /// Defensive copy of every entry.
    pub fn all_entries(&self) -> Vec<HistoryEntry> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn save(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let document = HistoryDocumentRef {
            downloaded_videos: &self.entries,
        };
        let content = serde_json::to_string_pretty(&document)?;
        fs::write(&self.path, content)
    }
}

fn entry_from_legacy((video_id, filename): (String, String)) -> HistoryEntry {
    let suffix = format!(".{video_id}.opus");
    let title = filename
        .strip_suffix(&suffix)
        .unwrap_or_else(|| filename.trim_end_matches(".opus"))
        .to_string();
    HistoryEntry {
        video_id,
        title,
        filename,
        download_date: Utc::now(),
        album: None,
        artist: None,
    }
}
