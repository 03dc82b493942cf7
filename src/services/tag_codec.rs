//! Tag codec
//!
//! One capability interface (read / write / clear-extras) over a closed set
//! of container families, selected once per file by format probe:
//! ID3-carrying containers (MP3, WAV, AIFF), the MP4 family (M4A), and FLAC.
//! Backed by lofty; only the three fields the pipeline cares about cross this
//! boundary.

use lofty::config::WriteOptions;
use lofty::file::{AudioFile, FileType, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag, TagType};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Tag codec errors; the resolver logs these and degrades, it never fails
#[derive(Debug, Error)]
pub enum TagError {
    /// Could not open or parse the container
    #[error("Failed to read tags: {0}")]
    Read(String),

    /// Could not write the container back
    #[error("Failed to write tags: {0}")]
    Write(String),

    /// File is not one of the handled container families
    #[error("Unsupported container: {0}")]
    Unsupported(String),
}

/// The three fields the pipeline reads and repairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub bpm: Option<u32>,
}

impl TagSet {
    pub fn is_empty(&self) -> bool {
        self.artist.is_none() && self.title.is_none() && self.bpm.is_none()
    }
}

/// Secondary tags stripped after filename-derived inference ran
const EXTRA_KEYS: [ItemKey; 4] = [
    ItemKey::AlbumArtist,
    ItemKey::Composer,
    ItemKey::Comment,
    ItemKey::ContentGroup,
];

/// Closed set of tag container families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagCodec {
    /// ID3v2 family: MP3, and WAV/AIFF chunks
    Mp3Tags,
    /// MP4 ilst atoms: M4A/MP4
    Mp4Tags,
    /// FLAC Vorbis comments
    FlacTags,
}

impl TagCodec {
    /// Probe the file once and pick the codec variant for its container.
    pub fn detect(path: &Path) -> Result<Self, TagError> {
        let file_type = Probe::open(path)
            .map_err(|e| TagError::Read(e.to_string()))?
            .guess_file_type()
            .map_err(|e| TagError::Read(e.to_string()))?
            .file_type();

        match file_type {
            Some(FileType::Mpeg | FileType::Wav | FileType::Aiff) => Ok(Self::Mp3Tags),
            Some(FileType::Mp4) => Ok(Self::Mp4Tags),
            Some(FileType::Flac) => Ok(Self::FlacTags),
            other => Err(TagError::Unsupported(format!(
                "{:?} ({})",
                other,
                path.display()
            ))),
        }
    }

    /// The lofty tag type this codec reads and writes
    fn tag_type(&self) -> TagType {
        match self {
            Self::Mp3Tags => TagType::Id3v2,
            Self::Mp4Tags => TagType::Mp4Ilst,
            Self::FlacTags => TagType::VorbisComments,
        }
    }

    /// Read artist, title and BPM from the file.
    pub fn read(&self, path: &Path) -> Result<TagSet, TagError> {
        let tagged_file = Probe::open(path)
            .map_err(|e| TagError::Read(e.to_string()))?
            .guess_file_type()
            .map_err(|e| TagError::Read(e.to_string()))?
            .read()
            .map_err(|e| TagError::Read(e.to_string()))?;

        let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());
        let Some(tag) = tag else {
            debug!(file = %path.display(), "no tag block present");
            return Ok(TagSet::default());
        };

        let bpm = tag
            .get_string(&ItemKey::IntegerBpm)
            .and_then(|s| s.trim().parse::<f64>().ok())
            .map(|v| v.round() as u32);

        Ok(TagSet {
            artist: tag.artist().map(|s| s.to_string()),
            title: tag.title().map(|s| s.to_string()),
            bpm,
        })
    }

    /// Write the populated fields of `changes` back to the file, creating a
    /// tag block of the right type if the file has none.
    pub fn write(&self, path: &Path, changes: &TagSet) -> Result<(), TagError> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut tagged_file = Probe::open(path)
            .map_err(|e| TagError::Read(e.to_string()))?
            .guess_file_type()
            .map_err(|e| TagError::Read(e.to_string()))?
            .read()
            .map_err(|e| TagError::Read(e.to_string()))?;

        if tagged_file.tag(self.tag_type()).is_none() {
            tagged_file.insert_tag(Tag::new(self.tag_type()));
        }
        let Some(tag) = tagged_file.tag_mut(self.tag_type()) else {
            return Err(TagError::Write(format!(
                "container refused a {:?} tag block",
                self.tag_type()
            )));
        };

        if let Some(artist) = &changes.artist {
            tag.set_artist(artist.clone());
        }
        if let Some(title) = &changes.title {
            tag.set_title(title.clone());
        }
        if let Some(bpm) = changes.bpm {
            tag.insert_text(ItemKey::IntegerBpm, bpm.to_string());
        }

        tagged_file
            .save_to_path(path, WriteOptions::default())
            .map_err(|e| TagError::Write(e.to_string()))?;
        debug!(file = %path.display(), ?changes, "tags written");
        Ok(())
    }

    /// Strip the secondary tag set (album-artist, composer, comment,
    /// grouping) left behind by upstream tools.
    pub fn clear_extras(&self, path: &Path) -> Result<(), TagError> {
        let mut tagged_file = Probe::open(path)
            .map_err(|e| TagError::Read(e.to_string()))?
            .guess_file_type()
            .map_err(|e| TagError::Read(e.to_string()))?
            .read()
            .map_err(|e| TagError::Read(e.to_string()))?;

        let Some(tag) = tagged_file.tag_mut(self.tag_type()) else {
            return Ok(());
        };
        for key in &EXTRA_KEYS {
            tag.remove_key(key);
        }

        tagged_file
            .save_to_path(path, WriteOptions::default())
            .map_err(|e| TagError::Write(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_fails_on_missing_file() {
        let result = TagCodec::detect(Path::new("/nonexistent/file.mp3"));
        assert!(matches!(result, Err(TagError::Read(_))));
    }

    #[test]
    fn read_fails_on_non_audio_content() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("fake.mp3");
        std::fs::write(&fake, b"definitely not audio").unwrap();
        assert!(TagCodec::Mp3Tags.read(&fake).is_err());
    }

    #[test]
    fn empty_tagset_write_is_a_noop() {
        // No probe should even happen for an empty change set
        let codec = TagCodec::Mp3Tags;
        assert!(codec
            .write(Path::new("/nonexistent/file.mp3"), &TagSet::default())
            .is_ok());
    }
}
