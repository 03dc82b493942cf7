//! Distribution engine
//!
//! Moves a processed file to the local destination under its normalized name
//! and optionally publishes it to a network share afterwards. The ordering is
//! fixed: local copy, source delete, then network publish. The source is only
//! ever deleted after the local copy is confirmed. Name collisions at the
//! local destination get a distinguishing suffix instead of overwriting; a
//! file already present on the share counts as published.

use crate::config::Policy;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Suffix inserted before the extension when the destination name is taken
const COLLISION_SUFFIX: &str = "_1";

/// Distribution failures leave the source in place and un-ledgered so the
/// next cycle or event retries the file.
#[derive(Debug, Error)]
pub enum DistributeError {
    /// Local copy failed
    #[error("Copy to {dest} failed: {source}")]
    LocalCopy {
        dest: PathBuf,
        source: std::io::Error,
    },

    /// Source could not be removed after a successful copy
    #[error("Delete of {path} failed: {source}")]
    DeleteSource {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Network share root is not reachable
    #[error("Network path does not exist: {0}")]
    NetworkUnavailable(PathBuf),

    /// Copy onto the network share failed
    #[error("Publish to {dest} failed: {source}")]
    Publish {
        dest: PathBuf,
        source: std::io::Error,
    },
}

pub struct Distributor {
    local_root: PathBuf,
    network_root: Option<PathBuf>,
}

impl Distributor {
    pub fn new(policy: &Policy) -> Self {
        Self {
            local_root: policy.local_path.clone(),
            network_root: policy
                .include_share
                .then(|| policy.network_path.clone())
                .flatten(),
        }
    }

    /// Relocate `source` under `filename`. Returns the local destination the
    /// file ended up at.
    pub fn distribute(&self, source: &Path, filename: &str) -> Result<PathBuf, DistributeError> {
        let local_dest = self.local_destination(filename);
        copy_preserving_mtime(source, &local_dest).map_err(|e| DistributeError::LocalCopy {
            dest: local_dest.clone(),
            source: e,
        })?;
        info!(from = %source.display(), to = %local_dest.display(), "copied to local destination");

        std::fs::remove_file(source).map_err(|e| DistributeError::DeleteSource {
            path: source.to_path_buf(),
            source: e,
        })?;
        debug!(file = %source.display(), "source removed");

        if let Some(network_root) = &self.network_root {
            self.publish(&local_dest, network_root, filename)?;
        }

        Ok(local_dest)
    }

    /// Resolve the local target, suffixing the name if it is already taken.
    fn local_destination(&self, filename: &str) -> PathBuf {
        let dest = self.local_root.join(filename);
        if !dest.exists() {
            return dest;
        }

        let stem = dest
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = dest
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let renamed = self
            .local_root
            .join(format!("{stem}{COLLISION_SUFFIX}{ext}"));
        warn!(
            existing = %dest.display(),
            renamed = %renamed.display(),
            "destination exists, copying under suffixed name"
        );
        renamed
    }

    /// Copy the local file onto the share under the unsuffixed name. An
    /// existing file of that name means it was already published.
    fn publish(
        &self,
        local_file: &Path,
        network_root: &Path,
        filename: &str,
    ) -> Result<(), DistributeError> {
        if !network_root.exists() {
            return Err(DistributeError::NetworkUnavailable(
                network_root.to_path_buf(),
            ));
        }

        let dest = network_root.join(filename);
        if dest.exists() {
            debug!(file = %dest.display(), "already on network share");
            return Ok(());
        }

        copy_preserving_mtime(local_file, &dest).map_err(|e| DistributeError::Publish {
            dest: dest.clone(),
            source: e,
        })?;
        info!(file = %dest.display(), "published to network share");
        Ok(())
    }
}

/// Copy contents and carry the source's modification time over.
fn copy_preserving_mtime(source: &Path, dest: &Path) -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let modified = std::fs::metadata(source)?.modified().ok();
    std::fs::copy(source, dest)?;
    if let Some(modified) = modified {
        let file = std::fs::OpenOptions::new().write(true).open(dest)?;
        file.set_modified(modified)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn policy(local: &Path, network: Option<&Path>) -> Policy {
        Policy {
            local_path: local.to_path_buf(),
            network_path: network.map(Path::to_path_buf),
            include_share: network.is_some(),
            ..Policy::default()
        }
    }

    #[test]
    fn copies_then_deletes_source() {
        let dir = tempdir().unwrap();
        let local = dir.path().join("out");
        let source = dir.path().join("song.mp3");
        std::fs::write(&source, b"audio bytes").unwrap();

        let distributor = Distributor::new(&policy(&local, None));
        let dest = distributor.distribute(&source, "Song.mp3").unwrap();

        assert_eq!(dest, local.join("Song.mp3"));
        assert_eq!(std::fs::read(&dest).unwrap(), b"audio bytes");
        assert!(!source.exists());
    }

    #[test]
    fn collision_gets_suffixed_name_and_original_is_untouched() {
        let dir = tempdir().unwrap();
        let local = dir.path().join("out");
        std::fs::create_dir_all(&local).unwrap();
        std::fs::write(local.join("Song.mp3"), b"first").unwrap();

        let source = dir.path().join("another song.mp3");
        std::fs::write(&source, b"second").unwrap();

        let distributor = Distributor::new(&policy(&local, None));
        let dest = distributor.distribute(&source, "Song.mp3").unwrap();

        assert_eq!(dest, local.join("Song_1.mp3"));
        assert_eq!(std::fs::read(local.join("Song.mp3")).unwrap(), b"first");
        assert_eq!(std::fs::read(&dest).unwrap(), b"second");
    }

    #[test]
    fn publishes_to_share_under_unsuffixed_name() {
        let dir = tempdir().unwrap();
        let local = dir.path().join("out");
        let share = dir.path().join("share");
        std::fs::create_dir_all(&share).unwrap();
        // Force a local collision so the local copy lands suffixed
        std::fs::create_dir_all(&local).unwrap();
        std::fs::write(local.join("Song.mp3"), b"old").unwrap();

        let source = dir.path().join("song.mp3");
        std::fs::write(&source, b"new").unwrap();

        let distributor = Distributor::new(&policy(&local, Some(&share)));
        distributor.distribute(&source, "Song.mp3").unwrap();

        assert_eq!(std::fs::read(share.join("Song.mp3")).unwrap(), b"new");
    }

    #[test]
    fn existing_share_file_is_already_published() {
        let dir = tempdir().unwrap();
        let local = dir.path().join("out");
        let share = dir.path().join("share");
        std::fs::create_dir_all(&share).unwrap();
        std::fs::write(share.join("Song.mp3"), b"published earlier").unwrap();

        let source = dir.path().join("song.mp3");
        std::fs::write(&source, b"fresh").unwrap();

        let distributor = Distributor::new(&policy(&local, Some(&share)));
        distributor.distribute(&source, "Song.mp3").unwrap();

        // Untouched: the earlier publication wins
        assert_eq!(
            std::fs::read(share.join("Song.mp3")).unwrap(),
            b"published earlier"
        );
    }

    #[test]
    fn missing_network_root_is_an_error_but_local_copy_stands() {
        let dir = tempdir().unwrap();
        let local = dir.path().join("out");
        let share = dir.path().join("not-mounted");

        let source = dir.path().join("song.mp3");
        std::fs::write(&source, b"audio").unwrap();

        let distributor = Distributor::new(&policy(&local, Some(&share)));
        let result = distributor.distribute(&source, "Song.mp3");

        assert!(matches!(result, Err(DistributeError::NetworkUnavailable(_))));
        assert!(local.join("Song.mp3").exists());
    }

    #[test]
    fn modification_time_is_preserved() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("song.mp3");
        std::fs::write(&source, b"audio").unwrap();
        let original_mtime = std::fs::metadata(&source).unwrap().modified().unwrap();

        let local = dir.path().join("out");
        let distributor = Distributor::new(&policy(&local, None));
        let dest = distributor.distribute(&source, "Song.mp3").unwrap();

        let copied_mtime = std::fs::metadata(&dest).unwrap().modified().unwrap();
        assert_eq!(copied_mtime, original_mtime);
    }
}
