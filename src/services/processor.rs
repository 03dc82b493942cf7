//! Per-file processing pipeline
//!
//! One `Processor` drives a candidate through the whole intake sequence:
//! tag resolution (with tempo validation and filename-derived fallback),
//! filename normalization, distribution, and the ledger append. Everything
//! in here degrades instead of failing: a candidate that cannot finish is
//! left un-ledgered and picked up again on the next cycle or event.

use crate::config::Policy;
use crate::services::distributor::Distributor;
use crate::services::janitor::Janitor;
use crate::services::ledger::Ledger;
use crate::services::normalizer;
use crate::services::scanner::{ScanError, Scanner};
use crate::services::tag_codec::{TagCodec, TagSet};
use crate::services::tempo::{self, EnergyFluxEstimator, TempoEstimator};
use crate::utils::audio_decoder;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Seconds of audio decoded for tempo analysis
const ANALYSIS_WINDOW_SECS: f32 = 120.0;

/// The only container family that gets tempo validation and repair
const TEMPO_CAPABLE_EXTENSION: &str = "mp3";

pub struct Processor {
    policy: Arc<Policy>,
    ledger: Arc<Ledger>,
    scanner: Scanner,
    janitor: Janitor,
    distributor: Distributor,
    tempo: Box<dyn TempoEstimator>,
}

impl Processor {
    pub fn new(policy: Arc<Policy>, ledger: Arc<Ledger>) -> Self {
        Self::with_estimator(policy, ledger, Box::new(EnergyFluxEstimator::default()))
    }

    pub fn with_estimator(
        policy: Arc<Policy>,
        ledger: Arc<Ledger>,
        tempo: Box<dyn TempoEstimator>,
    ) -> Self {
        Self {
            scanner: Scanner::new(&policy),
            janitor: Janitor::new(&policy),
            distributor: Distributor::new(&policy),
            policy,
            ledger,
            tempo,
        }
    }

    /// One full intake cycle: janitor sweep, discovery, then sequential
    /// processing of every un-ledgered candidate. Returns how many candidates
    /// were attempted.
    pub fn run_cycle(&self) -> Result<usize, ScanError> {
        self.janitor.sweep(&self.policy.base_path);

        let files = self.scanner.scan(&self.policy.base_path)?;
        info!(count = files.len(), "found audio file(s) to process");

        let mut attempted = 0;
        for path in &files {
            if self.ledger.contains(path) {
                continue;
            }
            self.process_file(path);
            attempted += 1;
        }
        Ok(attempted)
    }

    /// Run one candidate through resolve -> normalize -> distribute ->
    /// ledger. Never returns an error; failures are logged and the ledger
    /// append is skipped so the candidate retries later.
    pub fn process_file(&self, path: &Path) {
        if self.ledger.contains(path) {
            debug!(file = %path.display(), "already processed, skipping");
            return;
        }

        info!(file = %path.display(), "processing");
        let tags = self.resolve_metadata(path);
        let filename = self.output_filename(path, &tags);

        match self.distributor.distribute(path, &filename) {
            Ok(dest) => {
                if let Err(e) = self.ledger.record(path) {
                    warn!(file = %path.display(), error = %e, "ledger append failed, file may be reprocessed");
                } else {
                    info!(file = %path.display(), dest = %dest.display(), "successfully processed");
                }
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "distribution failed, will retry");
            }
        }
    }

    /// Read tags, validate/repair the tempo, and backfill artist/title from
    /// the filename. An unreadable file yields an all-absent `TagSet`.
    fn resolve_metadata(&self, path: &Path) -> TagSet {
        let codec = match TagCodec::detect(path) {
            Ok(codec) => codec,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "tag probe failed, proceeding untagged");
                return TagSet::default();
            }
        };

        let mut tags = match codec.read(path) {
            Ok(tags) => tags,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "tag read failed, proceeding untagged");
                TagSet::default()
            }
        };

        if tags.artist.is_some() && tags.title.is_some() {
            debug!(artist = ?tags.artist, title = ?tags.title, "tag data present");
        } else {
            debug!(file = %path.display(), "tag data missing");
        }

        if has_extension(path, TEMPO_CAPABLE_EXTENSION) {
            tags.bpm = self.resolve_bpm(path, &codec, tags.bpm);
        }

        if tags.artist.is_none() || tags.title.is_none() {
            self.infer_from_filename(path, &codec, &mut tags);
        }

        tags
    }

    /// Keep an in-range BPM tag; otherwise estimate, octave-correct, and
    /// write back. A value that cannot be corrected into range is discarded
    /// without touching the tag.
    fn resolve_bpm(&self, path: &Path, codec: &TagCodec, current: Option<u32>) -> Option<u32> {
        let range = &self.policy.bpm_range;

        if let Some(bpm) = current {
            if range.contains(bpm) {
                debug!(bpm, "tag BPM within range");
                return Some(bpm);
            }
            warn!(bpm, "tag BPM out of range, re-estimating");
        } else {
            debug!(file = %path.display(), "no BPM tag, estimating");
        }

        let decoded = match audio_decoder::decode_head(path, ANALYSIS_WINDOW_SECS) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "decode failed, skipping BPM enrichment");
                return None;
            }
        };

        let detected = match self.tempo.estimate(&decoded.samples, decoded.sample_rate) {
            Ok(bpm) => bpm,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "tempo estimation failed, skipping BPM enrichment");
                return None;
            }
        };

        match tempo::octave_correct(detected.round() as u32, range) {
            Some(bpm) => {
                let changes = TagSet {
                    bpm: Some(bpm),
                    ..TagSet::default()
                };
                if let Err(e) = codec.write(path, &changes) {
                    warn!(file = %path.display(), error = %e, "failed to write BPM tag");
                } else {
                    info!(bpm, file = %path.display(), "BPM tag written");
                }
                Some(bpm)
            }
            None => {
                warn!(
                    detected = detected.round() as u32,
                    min = range.min,
                    max = range.max,
                    "detected BPM cannot be corrected into range, discarding"
                );
                None
            }
        }
    }

    /// Backfill missing artist/title by splitting the filename stem. When at
    /// least one field was assigned, the inferred fields are written to the
    /// file and the secondary tag set is stripped.
    fn infer_from_filename(&self, path: &Path, codec: &TagCodec, tags: &mut TagSet) {
        let (from_artist, from_title) = split_stem(path);

        let mut inferred = TagSet::default();
        if tags.artist.is_none() {
            if let Some(artist) = from_artist {
                info!(artist = %artist, "artist inferred from filename");
                tags.artist = Some(artist.clone());
                inferred.artist = Some(artist);
            }
        }
        if tags.title.is_none() {
            if let Some(title) = from_title {
                info!(title = %title, "title inferred from filename");
                tags.title = Some(title.clone());
                inferred.title = Some(title);
            }
        }

        if inferred.is_empty() {
            return;
        }
        if let Err(e) = codec.write(path, &inferred) {
            warn!(file = %path.display(), error = %e, "failed to write inferred tags");
        }
        if let Err(e) = codec.clear_extras(path) {
            warn!(file = %path.display(), error = %e, "failed to strip secondary tags");
        }
    }

    /// Pick the naming source and normalize it. Tag data is only trusted
    /// when both fields are substantial and the artist carries no embedded
    /// website token (a literal period).
    fn output_filename(&self, path: &Path, tags: &TagSet) -> String {
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        if let (Some(artist), Some(title)) = (&tags.artist, &tags.title) {
            if artist.chars().count() > 2 && title.chars().count() > 2 {
                if artist.contains('.') {
                    info!("artist tag contains '.', using original filename");
                } else {
                    let filename = normalizer::normalize(&format!("{artist} - {title}"), &extension);
                    debug!(filename = %filename, "filename from tags");
                    return filename;
                }
            }
        }

        normalizer::normalize(&stem, &extension)
    }
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

/// Split a filename stem into (artist, title) on the first `" - "`, falling
/// back to the first bare `"-"`. Sides are trimmed; an empty side yields
/// `None` for that field.
fn split_stem(path: &Path) -> (Option<String>, Option<String>) {
    let Some(stem) = path.file_stem().map(|s| s.to_string_lossy()) else {
        return (None, None);
    };

    let split = stem
        .split_once(" - ")
        .or_else(|| stem.split_once('-'));
    let Some((artist, title)) = split else {
        return (None, None);
    };

    let side = |s: &str| {
        let trimmed = s.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    };
    (side(artist), side(title))
}
