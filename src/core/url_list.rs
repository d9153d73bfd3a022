//! Input URL list parsing

use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use crate::utils::validation::is_http_url;

/// Read the newline-separated URL list at `path`. Blank lines and `#`
/// comments are skipped silently; lines that do not parse as http(s) URLs
/// are skipped with a warning.
pub fn read_url_list(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read URL list: {}", path.display()))?;

    let mut urls = Vec::new();
    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if !is_http_url(line) {
            warn!(
                "line {} does not look like a URL, skipping: {line}",
                index + 1
            );
            continue;
        }
        urls.push(line.to_string());
    }
    Ok(urls)
}
