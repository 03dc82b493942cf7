//! Bounded audio decoding for tempo analysis
//!
//! Decodes the head of an audio file to mono f32 PCM with symphonia and stops
//! once the requested number of seconds has been produced. Tempo estimation
//! never needs the whole file, so the cap keeps analysis cost flat regardless
//! of track length.

use std::path::Path;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::debug;

/// Decoding errors; BPM enrichment skips the file when any of these occur
#[derive(Debug, Error)]
pub enum DecodeError {
    /// File cannot be opened
    #[error("Cannot open {0}: {1}")]
    Open(String, std::io::Error),

    /// Container format not recognized or corrupt
    #[error("Unsupported or corrupt container: {0}")]
    Probe(String),

    /// No decodable audio track in the container
    #[error("No audio track found")]
    NoTrack,

    /// Codec-level failure while decoding
    #[error("Decode failure: {0}")]
    Codec(String),
}

/// Head-of-file PCM suitable for analysis
#[derive(Debug)]
pub struct DecodedAudio {
    /// Mono samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

/// Decode at most the first `max_seconds` of `path` to mono f32.
pub fn decode_head(path: &Path, max_seconds: f32) -> Result<DecodedAudio, DecodeError> {
    let file = std::fs::File::open(path)
        .map_err(|e| DecodeError::Open(path.display().to_string(), e))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::Probe(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.ok_or(DecodeError::NoTrack)?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Codec(e.to_string()))?;

    let max_samples = (max_seconds * sample_rate as f32) as usize;
    let mut samples: Vec<f32> = Vec::with_capacity(max_samples);

    while samples.len() < max_samples {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(DecodeError::Codec(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(decoded) => append_mono(&decoded, &mut samples),
            // A damaged frame is not worth aborting analysis over
            Err(SymphoniaError::DecodeError(e)) => {
                debug!(file = %path.display(), error = %e, "skipping damaged frame");
            }
            Err(e) => return Err(DecodeError::Codec(e.to_string())),
        }
    }
    samples.truncate(max_samples);

    debug!(
        file = %path.display(),
        samples = samples.len(),
        sample_rate,
        "decoded analysis window"
    );
    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

/// Downmix one decoded buffer to mono and append it.
fn append_mono(decoded: &AudioBufferRef, out: &mut Vec<f32>) {
    macro_rules! mix_down {
        ($buf:expr) => {{
            let channels = $buf.spec().channels.count();
            for frame in 0..$buf.frames() {
                let mut acc = 0.0f32;
                for ch in 0..channels {
                    acc += f32::from_sample($buf.chan(ch)[frame]);
                }
                out.push(acc / channels as f32);
            }
        }};
    }

    match decoded {
        AudioBufferRef::U8(buf) => mix_down!(buf),
        AudioBufferRef::U16(buf) => mix_down!(buf),
        AudioBufferRef::U24(buf) => mix_down!(buf),
        AudioBufferRef::U32(buf) => mix_down!(buf),
        AudioBufferRef::S8(buf) => mix_down!(buf),
        AudioBufferRef::S16(buf) => mix_down!(buf),
        AudioBufferRef::S24(buf) => mix_down!(buf),
        AudioBufferRef::S32(buf) => mix_down!(buf),
        AudioBufferRef::F32(buf) => mix_down!(buf),
        AudioBufferRef::F64(buf) => mix_down!(buf),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_open_error() {
        let result = decode_head(Path::new("/nonexistent/file.mp3"), 10.0);
        assert!(matches!(result, Err(DecodeError::Open(_, _))));
    }

    #[test]
    fn garbage_content_is_a_probe_error() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("fake.mp3");
        std::fs::write(&fake, b"not a media file at all").unwrap();
        assert!(matches!(
            decode_head(&fake, 10.0),
            Err(DecodeError::Probe(_))
        ));
    }
}
