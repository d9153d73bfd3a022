//! Application configuration management
//!
//! The configuration document (YAML, JSON or TOML, detected by extension)
//! must provide at least `output_dir` and `history_file`; a missing file or
//! missing keys are fatal startup errors, reported before any download work.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Engine binary used when the config does not name one.
pub const DEFAULT_YTDLP_BIN: &str = "yt-dlp";

const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 120;
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 1800;

/// Validated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Final library directory for downloaded artifacts
    pub output_dir: PathBuf,
    /// Path of the persistent JSON download history
    pub history_file: PathBuf,
    /// yt-dlp binary name or path
    pub ytdlp_bin: String,
    /// Timeout for metadata-only probes
    pub probe_timeout_secs: u64,
    /// Timeout for one full item download
    pub download_timeout_secs: u64,
}

/// Raw on-disk shape, before required-key validation.
#[derive(Debug, Deserialize)]
struct RawConfig {
    output_dir: Option<String>,
    history_file: Option<String>,
    ytdlp_bin: Option<String>,
    probe_timeout_secs: Option<u64>,
    download_timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Load and validate configuration from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw: RawConfig = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .with_context(|| format!("failed to read config file: {}", path.display()))?
            .try_deserialize()
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;

        let mut missing = Vec::new();
        if raw.output_dir.is_none() {
            missing.push("output_dir");
        }
        if raw.history_file.is_none() {
            missing.push("history_file");
        }
        match (raw.output_dir.as_deref(), raw.history_file.as_deref()) {
            (Some(output_dir), Some(history_file)) => {
                let config = Self {
                    output_dir: expand_home(output_dir),
                    history_file: expand_home(history_file),
                    ytdlp_bin: raw
                        .ytdlp_bin
                        .unwrap_or_else(|| DEFAULT_YTDLP_BIN.to_string()),
                    probe_timeout_secs: raw
                        .probe_timeout_secs
                        .unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS),
                    download_timeout_secs: raw
                        .download_timeout_secs
                        .unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
                };
                config.validate()?;
                Ok(config)
            }
            _ => anyhow::bail!(
                "missing required configuration keys: {} (required keys: output_dir, history_file)",
                missing.join(", ")
            ),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.ytdlp_bin.trim().is_empty() {
            anyhow::bail!("ytdlp_bin must not be empty");
        }
        if self.probe_timeout_secs == 0 {
            anyhow::bail!("probe_timeout_secs must be greater than 0");
        }
        if self.download_timeout_secs == 0 {
            anyhow::bail!("download_timeout_secs must be greater than 0");
        }
        Ok(())
    }
}

/// Expand a leading `~/` to the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = directories::UserDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}
