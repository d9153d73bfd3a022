//! Filesystem helpers

use std::io;
use std::path::Path;

/// Create `dir` and its parents if they do not exist yet.
pub fn ensure_dir_exists(dir: &Path) -> io::Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Move a file, falling back to copy-and-remove when `from` and `to` are on
/// different filesystems and a plain rename fails.
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            std::fs::copy(from, to)?;
            std::fs::remove_file(from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_dir_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_dir_exists(&nested).unwrap();
        ensure_dir_exists(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn move_file_relocates_content() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("from.opus");
        let to = dir.path().join("to.opus");
        std::fs::write(&from, "payload").unwrap();

        move_file(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(std::fs::read_to_string(&to).unwrap(), "payload");
    }
}
