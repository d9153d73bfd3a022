//! External media engine integration
//!
//! All media extraction, format negotiation, transcoding and tag embedding
//! is delegated to the yt-dlp binary. This module owns the subprocess
//! plumbing: metadata-only probes via `--dump-single-json`, shallow playlist
//! listings via `--flat-playlist`, and the audio download with its
//! postprocessing flags. Engine faults never crash the run; they surface as
//! per-item errors translated from the last diagnostic yt-dlp printed.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use crate::core::models::{AppError, AppResult, CollectionEntry, ItemMetadata, Probe};

/// Browser-like user agent; YouTube throttles the default one aggressively.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const REFERER: &str = "https://www.youtube.com/";

/// Staged artifacts are written as `<id> - <title>.opus`; the final library
/// name is derived separately by the fetcher.
const OUTPUT_TEMPLATE: &str = "%(id)s - %(title)s.%(ext)s";

/// Canonical watch URL for a video id.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

/// Contract with the external download/extraction engine.
///
/// The archiver treats the engine as opaque: any network or extraction
/// fault comes back as an error value, caught once at the per-item boundary.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Metadata-only probe of one URL, with a shallow member listing when
    /// the URL names a collection. Nothing is downloaded.
    async fn probe(&self, url: &str) -> AppResult<Probe>;

    /// Full metadata for one item: title plus best-effort album/artist.
    async fn item_metadata(&self, video_id: &str) -> AppResult<ItemMetadata>;

    /// Download best-available audio for `video_id` into `dest_dir` as an
    /// `.opus` file with thumbnail and tags embedded; `album` forces an
    /// album tag when the collection supplied one.
    async fn fetch_audio(
        &self,
        video_id: &str,
        dest_dir: &Path,
        album: Option<&str>,
    ) -> AppResult<()>;
}

/// `MediaEngine` implementation shelling out to the yt-dlp binary.
pub struct YtDlpEngine {
    bin: PathBuf,
    probe_timeout: Duration,
    download_timeout: Duration,
}

impl YtDlpEngine {
    pub fn new(
        bin: impl Into<PathBuf>,
        probe_timeout_secs: u64,
        download_timeout_secs: u64,
    ) -> Self {
        Self {
            bin: bin.into(),
            probe_timeout: Duration::from_secs(probe_timeout_secs),
            download_timeout: Duration::from_secs(download_timeout_secs),
        }
    }

    /// Startup check that the engine binary is actually runnable.
    pub async fn ensure_available(&self) -> AppResult<()> {
        let status = Command::new(&self.bin)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|err| {
                AppError::Config(format!("cannot execute {}: {err}", self.bin.display()))
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(AppError::Config(format!(
                "{} --version exited with {status}",
                self.bin.display()
            )))
        }
    }

    async fn probe_json(&self, url: &str, extra_args: &[&str]) -> AppResult<Value> {
        let mut cmd = Command::new(&self.bin);
        cmd.args(["--dump-single-json", "--skip-download", "--no-warnings"])
            .args(["--socket-timeout", "30", "--retries", "5"])
            .args(["--sleep-requests", "1"])
            .args(["--user-agent", USER_AGENT, "--referer", REFERER])
            .args(extra_args)
            .arg(url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("probing {url}");
        let output = tokio::time::timeout(self.probe_timeout, cmd.output())
            .await
            .map_err(|_| {
                AppError::Resolution(format!(
                    "metadata probe timed out after {}s for {url}",
                    self.probe_timeout.as_secs()
                ))
            })?
            .map_err(|err| {
                AppError::Resolution(format!("failed to run {}: {err}", self.bin.display()))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Resolution(format!(
                "{url}: {}",
                translate_engine_error(&stderr)
            )));
        }

        serde_json::from_slice(&output.stdout).map_err(|err| {
            AppError::Resolution(format!("engine returned invalid JSON for {url}: {err}"))
        })
    }
}

#[async_trait]
impl MediaEngine for YtDlpEngine {
    async fn probe(&self, url: &str) -> AppResult<Probe> {
        let json = self.probe_json(url, &["--flat-playlist"]).await?;
        Ok(classify_probe(&json))
    }

    async fn item_metadata(&self, video_id: &str) -> AppResult<ItemMetadata> {
        let url = watch_url(video_id);
        let json = self.probe_json(&url, &["--no-playlist"]).await?;
        Ok(parse_item_metadata(&json))
    }

    async fn fetch_audio(
        &self,
        video_id: &str,
        dest_dir: &Path,
        album: Option<&str>,
    ) -> AppResult<()> {
        let url = watch_url(video_id);
        let mut cmd = Command::new(&self.bin);
        cmd.arg("-P")
            .arg(dest_dir)
            .args(["-o", OUTPUT_TEMPLATE])
            .args(["-f", "bestaudio/best"])
            .args(["--extract-audio", "--audio-format", "opus"])
            .args(["--audio-quality", "0"])
            .args(["--embed-thumbnail", "--embed-metadata"])
            .args(["--no-playlist", "--no-warnings", "--newline"])
            .args(["--socket-timeout", "30", "--retries", "5"])
            .args(["--sleep-interval", "1", "--max-sleep-interval", "5"])
            .args(["--sleep-requests", "1"])
            .args(["--user-agent", USER_AGENT, "--referer", REFERER]);
        if let Some(album) = album {
            cmd.arg("--postprocessor-args")
                .arg(album_postprocessor_arg(album));
        }
        cmd.arg(&url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the in-flight future (interrupt) must not leave a
            // stray yt-dlp process behind.
            .kill_on_drop(true);

        debug!("downloading audio for {video_id} into {}", dest_dir.display());
        let output = tokio::time::timeout(self.download_timeout, cmd.output())
            .await
            .map_err(|_| {
                AppError::Download(format!(
                    "download timed out after {}s for {video_id}",
                    self.download_timeout.as_secs()
                ))
            })?
            .map_err(|err| {
                AppError::Download(format!("failed to run {}: {err}", self.bin.display()))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Download(translate_engine_error(&stderr)));
        }
        Ok(())
    }
}

/// Forced album tag for the metadata postprocessor. yt-dlp shlex-splits the
/// args portion before handing it to ffmpeg, so the value must stay quoted
/// to survive as a single token.
fn album_postprocessor_arg(album: &str) -> String {
    format!(r#"Metadata:-metadata "album={}""#, album.replace('"', "\\\""))
}

/// Classify a probe document: collection marker or a non-empty member list
/// means collection, anything else is a single item.
fn classify_probe(json: &Value) -> Probe {
    let has_marker = json.get("_type").and_then(Value::as_str) == Some("playlist");
    let entries = json.get("entries").and_then(Value::as_array);
    if has_marker || entries.map_or(false, |list| !list.is_empty()) {
        let title = json
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("Unknown Playlist")
            .to_string();
        let members = entries
            .map(|list| {
                list.iter()
                    .filter(|entry| !entry.is_null())
                    .map(|entry| CollectionEntry {
                        video_id: entry.get("id").and_then(Value::as_str).map(str::to_string),
                        title: entry.get("title").and_then(Value::as_str).map(str::to_string),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Probe::Collection {
            title,
            entries: members,
        }
    } else {
        Probe::Single {
            video_id: json.get("id").and_then(Value::as_str).map(str::to_string),
            title: json.get("title").and_then(Value::as_str).map(str::to_string),
        }
    }
}

/// Title is always present (falling back to "Unknown"); artist prefers an
/// explicit tag over the uploader/creator fallbacks.
fn parse_item_metadata(json: &Value) -> ItemMetadata {
    let title = json
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or("Unknown")
        .to_string();
    let album = json.get("album").and_then(Value::as_str).map(str::to_string);
    let artist = ["artist", "uploader", "creator"]
        .iter()
        .find_map(|key| json.get(*key).and_then(Value::as_str))
        .map(str::to_string);
    ItemMetadata {
        title,
        album,
        artist,
    }
}

/// Reduce a yt-dlp stderr dump to one actionable line.
fn translate_engine_error(stderr: &str) -> String {
    let lower = stderr.to_lowercase();
    if lower.contains("http error 429") {
        return "rate limited by the server (HTTP 429), try again later".to_string();
    }
    if lower.contains("private video") {
        return "video is private".to_string();
    }
    if lower.contains("video unavailable") {
        return "video unavailable or removed".to_string();
    }
    if lower.contains("sign in") || lower.contains("login required") {
        return "video requires login".to_string();
    }
    if lower.contains("unsupported url") {
        return "unsupported URL".to_string();
    }

    stderr
        .lines()
        .rev()
        .find(|line| line.trim_start().to_lowercase().starts_with("error"))
        .map(|line| {
            let trimmed = line.trim();
            trimmed
                .strip_prefix("ERROR:")
                .unwrap_or(trimmed)
                .trim()
                .to_string()
        })
        .unwrap_or_else(|| {
            let trimmed = stderr.trim();
            if trimmed.is_empty() {
                "engine failed without diagnostics".to_string()
            } else {
                trimmed.chars().take(300).collect()
            }
        })
}
