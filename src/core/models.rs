//! Core data models for the audio archiver

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One successfully archived item, as recorded in the history file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Opaque content identifier (the YouTube video id)
    pub video_id: String,

    /// Original item title, before filename sanitization
    pub title: String,

    /// Filename of the produced artifact, relative to the output directory
    pub filename: String,

    #[serde(with = "flexible_timestamp", default = "Utc::now")]
    pub download_date: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
}

/// Result of a metadata-only probe of one input URL.
#[derive(Debug, Clone, PartialEq)]
pub enum Probe {
    /// A single downloadable item. The id can be absent when the engine
    /// returned metadata without one (malformed input, not a crash).
    Single {
        video_id: Option<String>,
        title: Option<String>,
    },

    /// A playlist-like collection with a shallow member listing.
    Collection {
        title: String,
        entries: Vec<CollectionEntry>,
    },
}

/// Shallow playlist member as reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionEntry {
    pub video_id: Option<String>,
    pub title: Option<String>,
}

/// Full metadata for a single item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemMetadata {
    pub title: String,
    pub album: Option<String>,
    pub artist: Option<String>,
}

/// Per-URL outcome counts, accumulated over a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PullReport {
    /// Items newly downloaded and recorded
    pub downloaded: usize,

    /// Items skipped because the history already had them
    pub skipped: usize,

    /// Items that failed at any pipeline step (reported, never fatal)
    pub failed: usize,
}

impl PullReport {
    pub fn merge(&mut self, other: &PullReport) {
        self.downloaded += other.downloaded;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("resolution error: {0}")]
    Resolution(String),

    #[error("download error: {0}")]
    Download(String),
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

/// Timestamp (de)serialization that stays readable across history schema
/// generations: the writer emits RFC 3339, the reader also accepts the naive
/// local timestamps older history files carry, and anything unparseable
/// degrades to "now" instead of rejecting the whole document.
pub(crate) mod flexible_timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(parse_timestamp(&raw).unwrap_or_else(Utc::now))
    }

    pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
    }
}
