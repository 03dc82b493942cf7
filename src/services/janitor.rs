//! Directory janitor
//!
//! Runs once per cycle before discovery. Download tools tend to leave cover
//! art, playlists and checksum files next to the audio they fetched; the
//! janitor prunes those from each immediate subdirectory of the watched root
//! and removes the subdirectory once it is empty. Plaintext files and
//! anything still marked as a partial download are left alone. Every failure
//! is logged and non-fatal.

use crate::config::{Policy, PARTIAL_DOWNLOAD_MARKER};
use std::path::Path;
use tracing::{debug, info, warn};

pub struct Janitor {
    policy: Policy,
}

impl Janitor {
    pub fn new(policy: &Policy) -> Self {
        Self {
            policy: policy.clone(),
        }
    }

    /// Prune stray files and empty subdirectories under `root`.
    pub fn sweep(&self, root: &Path) {
        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "janitor cannot read watched root");
                return;
            }
        };

        for entry in entries.flatten() {
            let subdir = entry.path();
            if !subdir.is_dir() {
                continue;
            }
            self.sweep_subdir(&subdir);
        }
    }

    fn sweep_subdir(&self, subdir: &Path) {
        let Ok(entries) = std::fs::read_dir(subdir) else {
            warn!(dir = %subdir.display(), "janitor cannot read subdirectory");
            return;
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || self.should_keep(&path) {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => info!(file = %path.display(), "removed stray file"),
                Err(e) => warn!(file = %path.display(), error = %e, "failed to remove stray file"),
            }
        }

        match std::fs::read_dir(subdir).map(|mut d| d.next().is_none()) {
            Ok(true) => match std::fs::remove_dir(subdir) {
                Ok(()) => info!(dir = %subdir.display(), "removed empty directory"),
                Err(e) => warn!(dir = %subdir.display(), error = %e, "failed to remove directory"),
            },
            Ok(false) => debug!(dir = %subdir.display(), "directory not empty, keeping"),
            Err(e) => warn!(dir = %subdir.display(), error = %e, "failed to re-read directory"),
        }
    }

    /// Keep supported audio, plaintext files, and in-progress downloads.
    fn should_keep(&self, path: &Path) -> bool {
        if path
            .file_name()
            .map(|n| n.to_string_lossy().contains(PARTIAL_DOWNLOAD_MARKER))
            .unwrap_or(false)
        {
            return true;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => {
                let ext = ext.to_lowercase();
                ext == "txt" || self.policy.is_supported_extension(&ext)
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn removes_stray_files_keeps_audio_and_text() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("album");
        std::fs::create_dir(&sub).unwrap();
        touch(&sub.join("track.mp3"));
        touch(&sub.join("notes.txt"));
        touch(&sub.join("cover.jpg"));
        touch(&sub.join("checksums.sfv"));

        Janitor::new(&Policy::default()).sweep(dir.path());

        assert!(sub.join("track.mp3").exists());
        assert!(sub.join("notes.txt").exists());
        assert!(!sub.join("cover.jpg").exists());
        assert!(!sub.join("checksums.sfv").exists());
    }

    #[test]
    fn partial_downloads_are_spared() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("incoming");
        std::fs::create_dir(&sub).unwrap();
        touch(&sub.join("INCOMPLETE~rip.jpg"));

        Janitor::new(&Policy::default()).sweep(dir.path());
        assert!(sub.join("INCOMPLETE~rip.jpg").exists());
    }

    #[test]
    fn empty_subdirectories_are_removed() {
        let dir = tempdir().unwrap();
        let emptied = dir.path().join("emptied");
        std::fs::create_dir(&emptied).unwrap();
        touch(&emptied.join("junk.nfo"));

        Janitor::new(&Policy::default()).sweep(dir.path());
        assert!(!emptied.exists());
    }

    #[test]
    fn files_at_the_root_are_untouched() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("root-level.jpg"));

        Janitor::new(&Policy::default()).sweep(dir.path());
        assert!(dir.path().join("root-level.jpg").exists());
    }
}
