//! Service configuration
//!
//! The `Policy` is loaded once at startup from a TOML file and is read-only to
//! the pipeline afterwards. Validation happens here so the core never sees a
//! half-configured service.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Filename substring marking an in-progress download; such paths are never
/// touched by any component.
pub const PARTIAL_DOWNLOAD_MARKER: &str = "INCOMPLETE~";

fn default_poll_interval() -> u64 {
    40
}

fn default_stability_timeout() -> u64 {
    30
}

fn default_extensions() -> Vec<String> {
    ["mp3", "m4a", "wav", "aif", "aiff", "flac"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Acceptable BPM window for tempo tags
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct BpmRange {
    pub min: u32,
    pub max: u32,
}

impl Default for BpmRange {
    fn default() -> Self {
        Self { min: 65, max: 135 }
    }
}

impl BpmRange {
    pub fn contains(&self, bpm: u32) -> bool {
        (self.min..=self.max).contains(&bpm)
    }
}

/// Immutable service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Policy {
    /// Watched root where new audio files arrive
    pub base_path: PathBuf,

    /// Destination for processed files
    pub local_path: PathBuf,

    /// Optional network share destination
    #[serde(default)]
    pub network_path: Option<PathBuf>,

    /// Publish processed files to `network_path` after the local copy
    #[serde(default)]
    pub include_share: bool,

    /// Seconds between polling cycles
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Seconds to wait for a file's size to settle before giving up
    #[serde(default = "default_stability_timeout")]
    pub stability_timeout_secs: u64,

    /// Audio file extensions handled by the pipeline (lowercase, no dot)
    #[serde(default = "default_extensions")]
    pub supported_extensions: Vec<String>,

    /// Tempo tag acceptance window
    #[serde(default)]
    pub bpm_range: BpmRange,
}

impl Default for Policy {
    fn default() -> Self {
        let music = dirs::audio_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            base_path: music.join("Incoming"),
            local_path: music.join("Processed"),
            network_path: None,
            include_share: false,
            poll_interval_secs: default_poll_interval(),
            stability_timeout_secs: default_stability_timeout(),
            supported_extensions: default_extensions(),
            bpm_range: BpmRange::default(),
        }
    }
}

impl Policy {
    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let policy: Policy = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Check internal consistency; path existence is checked separately
    pub fn validate(&self) -> Result<()> {
        if self.include_share && self.network_path.is_none() {
            return Err(Error::Config(
                "include_share is enabled but network_path is not set".to_string(),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(Error::Config("poll_interval_secs must be non-zero".to_string()));
        }
        if self.bpm_range.min == 0 || self.bpm_range.min >= self.bpm_range.max {
            return Err(Error::Config(format!(
                "invalid bpm_range: [{}, {}]",
                self.bpm_range.min, self.bpm_range.max
            )));
        }
        if self.supported_extensions.is_empty() {
            return Err(Error::Config("supported_extensions is empty".to_string()));
        }
        Ok(())
    }

    /// Create the directories the service writes to, and resolve the watched
    /// root to an absolute path. Ledger entries and event paths are both
    /// derived from it, so they stay comparable whatever form the config used.
    pub fn ensure_directories(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.base_path)?;
        std::fs::create_dir_all(&self.local_path)?;
        if self.include_share {
            if let Some(network) = &self.network_path {
                std::fs::create_dir_all(network)?;
            }
        }
        self.base_path = self.base_path.canonicalize()?;
        Ok(())
    }

    /// Case-insensitive extension membership test
    pub fn is_supported_extension(&self, ext: &str) -> bool {
        let ext = ext.to_lowercase();
        self.supported_extensions.iter().any(|e| *e == ext)
    }

    /// True for paths the pipeline should handle at all: supported extension
    /// and no partial-download marker in the file name.
    pub fn is_candidate(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        if !self.is_supported_extension(ext) {
            return false;
        }
        !path
            .file_name()
            .map(|n| n.to_string_lossy().contains(PARTIAL_DOWNLOAD_MARKER))
            .unwrap_or(false)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn stability_timeout(&self) -> Duration {
        Duration::from_secs(self.stability_timeout_secs)
    }
}
