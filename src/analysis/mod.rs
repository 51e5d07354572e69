// Analysis module - fundamental frequency estimation
//
// This module turns one chunk of mono audio into a `PitchEstimate`.
//
// Pipeline:
// - Silence gate (peak amplitude) and minimum window check
// - Hann window
// - Three independent estimators: autocorrelation, harmonic product
//   spectrum, cepstrum
// - Median combiner (robust to one outlier estimator); a disagreeing pair
//   is settled by which reading the spectrum actually supports
// - Auxiliary features from the combined fundamental: RMS, harmonics,
//   spectral centroid, zero-crossing rate, confidence
//
// Everything here is pure CPU work; nothing blocks or touches session state.

pub mod autocorrelation;
pub mod cepstrum;
pub mod fft;
pub mod hps;
pub mod spectral;
pub mod temporal;
pub mod types;

pub use types::{EstimatorReadings, FrequencyRange, PitchEstimate};

use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::AnalysisConfig;
use fft::FftProcessor;
use spectral::SpectralFeatures;

/// Confidence weights: harmonic support, spectral clarity, loudness
const WEIGHT_HARMONIC: f64 = 0.4;
const WEIGHT_CLARITY: f64 = 0.3;
const WEIGHT_MAGNITUDE: f64 = 0.3;

/// Two readings further apart than this (relative) are never averaged
const PAIR_AGREEMENT: f64 = 0.03;

/// Anything that can turn a chunk into a pitch estimate
///
/// Sessions hold their estimator behind this trait so the ingestion
/// pipeline can be exercised with instrumented estimators.
pub trait PitchSource: Send + Sync {
    fn estimate(&self, chunk: &[f32], sample_rate: u32) -> Option<PitchEstimate>;
}

/// Multi-algorithm fundamental frequency estimator
pub struct PitchEstimator {
    config: AnalysisConfig,
    fft: FftProcessor,
}

impl PitchEstimator {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            fft: FftProcessor::new(),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Default search range from the configuration
    pub fn default_range(&self) -> FrequencyRange {
        FrequencyRange::new(self.config.min_frequency_hz, self.config.max_frequency_hz)
    }

    /// Estimate the fundamental of one chunk
    ///
    /// # Returns
    /// * `None` - chunk shorter than the minimum window, silent, or no
    ///   estimator produced a usable frequency
    pub fn estimate_in_range(
        &self,
        chunk: &[f32],
        sample_rate: u32,
        range: FrequencyRange,
    ) -> Option<PitchEstimate> {
        if chunk.len() < self.config.min_window_samples || sample_rate == 0 {
            return None;
        }

        // Silence short-circuits before any spectrum is computed, which also
        // keeps the clarity ratios away from 0/0.
        if temporal::peak_amplitude(chunk) < self.config.silence_threshold {
            return None;
        }

        let range = range.limited_to(sample_rate)?;
        let windowed = FftProcessor::hann_window(chunk);

        let fft_size = FftProcessor::padded_size(chunk.len(), self.config.fft_padding);
        let spectrum = self.fft.magnitude_spectrum(&windowed, fft_size);
        let spectral = SpectralFeatures::new(sample_rate, fft_size);

        let readings = EstimatorReadings {
            autocorrelation: autocorrelation::estimate(
                &self.fft,
                &windowed,
                sample_rate,
                range,
                self.config.autocorrelation_threshold,
            ),
            harmonic_product: hps::estimate(
                &spectrum,
                spectral.bin_hz(),
                range,
                self.config.harmonic_floor,
            ),
            cepstral: cepstrum::estimate(
                &self.fft,
                &spectrum,
                fft_size,
                sample_rate,
                range,
                self.config.harmonic_floor,
            ),
        };

        let reach_bins = (self.config.fft_padding / 2).max(1);
        let frequency_hz = combine_with_support(readings.values(), |freq| {
            spectral.magnitude_near(&spectrum, freq, reach_bins)
        })?;

        let magnitude = temporal::rms(chunk);
        let lobe_bins = 2 * self.config.fft_padding.max(1) + 1;
        let harmonics = spectral.find_harmonics(
            &spectrum,
            frequency_hz,
            self.config.max_harmonics,
            self.config.harmonic_floor,
            self.config.fft_padding.max(1),
        );
        let harmonic_bins: Vec<usize> = harmonics.iter().map(|&(bin, _, _)| bin).collect();
        let harmonic_support = spectral.harmonic_energy_share(&spectrum, &harmonic_bins, lobe_bins);
        let spectral_clarity = 1.0 - spectral.compute_flatness(&spectrum);

        let confidence = confidence(harmonic_support, spectral_clarity, magnitude);

        tracing::trace!(
            frequency_hz,
            confidence,
            ?readings,
            harmonics = harmonics.len(),
            "pitch estimate"
        );

        Some(PitchEstimate {
            frequency_hz,
            confidence,
            magnitude,
            harmonics: harmonics.iter().map(|&(_, freq, mag)| (freq, mag)).collect(),
            spectral_centroid: spectral.compute_centroid(&spectrum),
            zero_crossing_rate: temporal::zero_crossing_rate(chunk),
            estimators: readings,
            timestamp_ms: now_ms(),
        })
    }
}

impl PitchSource for PitchEstimator {
    fn estimate(&self, chunk: &[f32], sample_rate: u32) -> Option<PitchEstimate> {
        self.estimate_in_range(chunk, sample_rate, self.default_range())
    }
}

/// Median of the usable estimates (mean of the middle pair for even counts)
pub fn combine(mut estimates: Vec<f64>) -> Option<f64> {
    estimates.retain(|f| f.is_finite() && *f > 0.0);
    if estimates.is_empty() {
        return None;
    }

    estimates.sort_by(f64::total_cmp);
    let mid = estimates.len() / 2;
    if estimates.len() % 2 == 1 {
        Some(estimates[mid])
    } else {
        Some((estimates[mid - 1] + estimates[mid]) / 2.0)
    }
}

/// Like [`combine`], but two readings more than 3 % apart are not averaged
///
/// Their mean sits between two candidates and matches neither, so the one
/// with the larger `support` (spectral magnitude at that frequency) is
/// returned as is. The lower reading wins a tie.
pub fn combine_with_support<F>(mut estimates: Vec<f64>, support: F) -> Option<f64>
where
    F: Fn(f64) -> f64,
{
    estimates.retain(|f| f.is_finite() && *f > 0.0);
    estimates.sort_by(f64::total_cmp);

    if let &[low, high] = estimates.as_slice() {
        if (high - low) / low > PAIR_AGREEMENT {
            return Some(if support(low) >= support(high) { low } else { high });
        }
    }
    combine(estimates)
}

/// Weighted confidence score clamped to [0, 1]
pub fn confidence(harmonic_support: f64, spectral_clarity: f64, magnitude: f64) -> f64 {
    let score = WEIGHT_HARMONIC * harmonic_support
        + WEIGHT_CLARITY * spectral_clarity
        + WEIGHT_MAGNITUDE * (magnitude * 10.0).min(1.0);
    score.clamp(0.0, 1.0)
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests;
