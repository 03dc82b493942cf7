//! Candidate discovery
//!
//! Recursive walk of the watched root collecting files with a supported
//! audio extension. Extension matching is case-insensitive; anything carrying
//! the partial-download marker is excluded unconditionally, as is the ledger
//! record itself. Entry-level errors are logged and skipped so one unreadable
//! directory never aborts a cycle.

use crate::config::Policy;
use crate::services::ledger::LEDGER_FILE;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

/// Discovery errors; only meaningful at startup, where they are fatal
#[derive(Debug, Error)]
pub enum ScanError {
    /// Watched root does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Watched root exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Recursive audio file discovery
pub struct Scanner {
    policy: Policy,
}

impl Scanner {
    pub fn new(policy: &Policy) -> Self {
        Self {
            policy: policy.clone(),
        }
    }

    /// Collect every candidate audio file under `root`, sorted for a
    /// deterministic processing order.
    pub fn scan(&self, root: &Path) -> Result<Vec<PathBuf>, ScanError> {
        if !root.exists() {
            return Err(ScanError::PathNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "error accessing entry during scan");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.file_name().map(|n| n == LEDGER_FILE).unwrap_or(false) {
                continue;
            }
            if self.policy.is_candidate(path) {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        std::fs::write(path, b"x").unwrap();
    }

    fn scanner() -> Scanner {
        Scanner::new(&Policy::default())
    }

    #[test]
    fn finds_supported_files_recursively() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("a.mp3"));
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        touch(&dir.path().join("sub/b.flac"));
        touch(&dir.path().join("sub/readme.txt"));

        let files = scanner().scan(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn extension_match_ignores_case() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("LOUD.MP3"));
        let files = scanner().scan(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn partial_downloads_and_ledger_are_excluded() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("INCOMPLETE~song.mp3"));
        touch(&dir.path().join(LEDGER_FILE));
        let files = scanner().scan(dir.path()).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempdir().unwrap();
        let gone = dir.path().join("nope");
        assert!(matches!(
            scanner().scan(&gone),
            Err(ScanError::PathNotFound(_))
        ));
    }
}
