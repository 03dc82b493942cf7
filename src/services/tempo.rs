//! Tempo estimation and correction
//!
//! The pipeline consumes tempo through the [`TempoEstimator`] trait; the
//! default implementation is a compact onset-energy autocorrelation. Beat
//! trackers routinely lock onto half or double the true tempo, so estimates
//! outside the accepted window go through octave correction before anything
//! is written to a tag.

use crate::config::BpmRange;
use thiserror::Error;
use tracing::debug;

/// Estimation failures; BPM enrichment is skipped, never fatal
#[derive(Debug, Error)]
pub enum TempoError {
    /// Not enough audio to see several beats
    #[error("Audio too short for tempo analysis")]
    TooShort,

    /// No periodicity found (silence, drones, spoken word)
    #[error("No discernible tempo")]
    NoTempo,
}

/// Tempo estimation contract: mono samples in, BPM out
pub trait TempoEstimator: Send + Sync {
    fn estimate(&self, samples: &[f32], sample_rate: u32) -> Result<f32, TempoError>;
}

/// Bring an out-of-window estimate back by halving first, then doubling.
///
/// Returns `None` when neither the value nor either octave lands in range;
/// the caller must then discard the estimate without writing a tag.
pub fn octave_correct(bpm: u32, range: &BpmRange) -> Option<u32> {
    if range.contains(bpm) {
        return Some(bpm);
    }
    let half = bpm / 2;
    if range.contains(half) {
        debug!(detected = bpm, corrected = half, "tempo corrected to half-time");
        return Some(half);
    }
    let double = bpm * 2;
    if range.contains(double) {
        debug!(detected = bpm, corrected = double, "tempo corrected to double-time");
        return Some(double);
    }
    None
}

/// Default estimator: frame-energy flux autocorrelated over the 40-240 BPM
/// lag window.
pub struct EnergyFluxEstimator {
    frame_size: usize,
    hop_size: usize,
}

const MIN_BPM: f32 = 40.0;
const MAX_BPM: f32 = 240.0;
/// Shortest signal worth analyzing, in seconds
const MIN_ANALYSIS_SECS: f32 = 4.0;

impl Default for EnergyFluxEstimator {
    fn default() -> Self {
        Self {
            frame_size: 1024,
            hop_size: 512,
        }
    }
}

impl EnergyFluxEstimator {
    /// Positive half-wave of the frame-to-frame energy difference. Rises in
    /// loudness mark beat onsets; decays are ignored.
    fn onset_flux(&self, samples: &[f32]) -> Vec<f32> {
        let mut energies = Vec::with_capacity(samples.len() / self.hop_size);
        let mut start = 0;
        while start + self.frame_size <= samples.len() {
            let frame = &samples[start..start + self.frame_size];
            let energy: f32 = frame.iter().map(|s| s * s).sum::<f32>() / self.frame_size as f32;
            energies.push(energy);
            start += self.hop_size;
        }

        energies
            .windows(2)
            .map(|w| (w[1] - w[0]).max(0.0))
            .collect()
    }
}

impl TempoEstimator for EnergyFluxEstimator {
    fn estimate(&self, samples: &[f32], sample_rate: u32) -> Result<f32, TempoError> {
        if sample_rate == 0
            || (samples.len() as f32) < MIN_ANALYSIS_SECS * sample_rate as f32
        {
            return Err(TempoError::TooShort);
        }

        let flux = self.onset_flux(samples);
        if flux.iter().all(|&f| f <= f32::EPSILON) {
            return Err(TempoError::NoTempo);
        }

        let frames_per_sec = sample_rate as f32 / self.hop_size as f32;
        let min_lag = ((frames_per_sec * 60.0 / MAX_BPM).floor() as usize).max(1);
        let max_lag = ((frames_per_sec * 60.0 / MIN_BPM).ceil() as usize).min(flux.len() / 2);
        if min_lag >= max_lag {
            return Err(TempoError::TooShort);
        }

        // Raw correlation sums; equal-strength harmonics resolve toward the
        // shorter lag, octave correction handles the rest downstream.
        let mut best_lag = 0;
        let mut best_score = 0.0f32;
        for lag in min_lag..=max_lag {
            let pairs = flux.len() - lag;
            let score: f32 = (0..pairs).map(|i| flux[i] * flux[i + lag]).sum();
            if score > best_score {
                best_score = score;
                best_lag = lag;
            }
        }

        if best_lag == 0 || best_score <= f32::EPSILON {
            return Err(TempoError::NoTempo);
        }

        let bpm = 60.0 * frames_per_sec / best_lag as f32;
        debug!(bpm, lag = best_lag, "tempo estimate");
        Ok(bpm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RANGE: BpmRange = BpmRange { min: 65, max: 135 };

    #[test]
    fn in_range_value_is_kept() {
        assert_eq!(octave_correct(120, &RANGE), Some(120));
        assert_eq!(octave_correct(65, &RANGE), Some(65));
        assert_eq!(octave_correct(135, &RANGE), Some(135));
    }

    #[test]
    fn double_time_is_halved() {
        assert_eq!(octave_correct(160, &RANGE), Some(80));
    }

    #[test]
    fn half_time_is_doubled() {
        assert_eq!(octave_correct(50, &RANGE), Some(100));
    }

    #[test]
    fn halving_is_tried_before_doubling() {
        // 140/2 = 70 is in range; 140*2 = 280 is not even considered
        assert_eq!(octave_correct(140, &RANGE), Some(70));
    }

    #[test]
    fn extreme_double_time_still_corrects() {
        assert_eq!(octave_correct(200, &RANGE), Some(100));
    }

    #[test]
    fn uncorrectable_value_is_rejected() {
        // Neither 150 nor 600 lands in range
        assert_eq!(octave_correct(300, &RANGE), None);
        assert_eq!(octave_correct(20, &RANGE), None);
    }

    fn click_track(bpm: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
        let total = (seconds * sample_rate as f32) as usize;
        let beat_period = (60.0 / bpm * sample_rate as f32) as usize;
        let mut samples = vec![0.0f32; total];
        let mut pos = 0;
        while pos < total {
            // Short decaying burst per beat
            for (i, sample) in samples[pos..(pos + 512).min(total)].iter_mut().enumerate() {
                *sample = 0.9 * (1.0 - i as f32 / 512.0);
            }
            pos += beat_period;
        }
        samples
    }

    #[test]
    fn detects_click_track_tempo() {
        let estimator = EnergyFluxEstimator::default();
        let bpm = estimator
            .estimate(&click_track(120.0, 10.0, 44_100), 44_100)
            .unwrap();
        assert!((bpm - 120.0).abs() < 4.0, "got {bpm}");
    }

    #[test]
    fn detects_slow_click_track() {
        let estimator = EnergyFluxEstimator::default();
        let bpm = estimator
            .estimate(&click_track(60.0, 15.0, 44_100), 44_100)
            .unwrap();
        assert!((bpm - 60.0).abs() < 3.0, "got {bpm}");
    }

    #[test]
    fn silence_has_no_tempo() {
        let estimator = EnergyFluxEstimator::default();
        let silence = vec![0.0f32; 44_100 * 8];
        assert!(matches!(
            estimator.estimate(&silence, 44_100),
            Err(TempoError::NoTempo)
        ));
    }

    #[test]
    fn short_audio_is_rejected() {
        let estimator = EnergyFluxEstimator::default();
        let snippet = vec![0.5f32; 44_100];
        assert!(matches!(
            estimator.estimate(&snippet, 44_100),
            Err(TempoError::TooShort)
        ));
    }
}
