//! Dedup ledger
//!
//! Newline-delimited UTF-8 record of every source path that completed the
//! full pipeline, stored at a fixed name inside the watched root. The whole
//! file is loaded at startup; the in-memory set is a write-through cache and
//! is the single source of truth for idempotence. There is no removal
//! operation.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Fixed ledger filename inside the watched root
pub const LEDGER_FILE: &str = "copiedList.txt";

/// Persisted set of already-processed source paths
pub struct Ledger {
    path: PathBuf,
    seen: Mutex<HashSet<String>>,
}

impl Ledger {
    /// Load the ledger from the watched root, creating an empty record if
    /// none exists yet.
    pub fn open(watched_root: &Path) -> std::io::Result<Self> {
        let path = watched_root.join(LEDGER_FILE);
        let seen = if path.exists() {
            std::fs::read_to_string(&path)?
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()
        } else {
            std::fs::File::create(&path)?;
            HashSet::new()
        };
        debug!(ledger = %path.display(), entries = seen.len(), "ledger loaded");
        Ok(Self {
            path,
            seen: Mutex::new(seen),
        })
    }

    /// True if this source path already completed processing
    pub fn contains(&self, path: &Path) -> bool {
        self.seen
            .lock()
            .unwrap()
            .contains(path.to_string_lossy().as_ref())
    }

    /// Record a fully processed path: one atomic line append to disk, then
    /// the in-memory set. Interleaved appends from concurrent handlers are
    /// safe because each entry is a single `write` of one newline-terminated
    /// line.
    pub fn record(&self, path: &Path) -> std::io::Result<()> {
        let line = format!("{}\n", path.display());
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        self.seen
            .lock()
            .unwrap()
            .insert(path.to_string_lossy().into_owned());
        Ok(())
    }

    /// Number of recorded paths
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn starts_empty_and_creates_record_file() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).unwrap();
        assert!(ledger.is_empty());
        assert!(dir.path().join(LEDGER_FILE).exists());
    }

    #[test]
    fn recorded_paths_are_contained() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).unwrap();
        let song = dir.path().join("song.mp3");
        assert!(!ledger.contains(&song));
        ledger.record(&song).unwrap();
        assert!(ledger.contains(&song));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn entries_survive_reopen() {
        let dir = tempdir().unwrap();
        let song = dir.path().join("song.mp3");
        {
            let ledger = Ledger::open(dir.path()).unwrap();
            ledger.record(&song).unwrap();
        }
        let reopened = Ledger::open(dir.path()).unwrap();
        assert!(reopened.contains(&song));
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn on_disk_format_is_one_path_per_line() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).unwrap();
        ledger.record(&dir.path().join("a.mp3")).unwrap();
        ledger.record(&dir.path().join("b.flac")).unwrap();
        let content = std::fs::read_to_string(dir.path().join(LEDGER_FILE)).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(content.ends_with('\n'));
    }
}
