// Types module - Data structures produced by the pitch estimator

use serde::{Deserialize, Serialize};

/// Inclusive fundamental-frequency search range in Hz
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRange {
    pub min_hz: f64,
    pub max_hz: f64,
}

impl FrequencyRange {
    pub fn new(min_hz: f64, max_hz: f64) -> Self {
        Self { min_hz, max_hz }
    }

    /// Clip the upper bound below Nyquist; `None` if nothing is left to search
    pub fn limited_to(&self, sample_rate: u32) -> Option<Self> {
        let nyquist = sample_rate as f64 / 2.0;
        let max_hz = self.max_hz.min(nyquist * 0.95);
        if self.min_hz > 0.0 && self.min_hz < max_hz {
            Some(Self::new(self.min_hz, max_hz))
        } else {
            None
        }
    }

    pub fn contains(&self, hz: f64) -> bool {
        hz >= self.min_hz && hz <= self.max_hz
    }
}

/// Raw answer of each estimator before combination
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimatorReadings {
    pub autocorrelation: Option<f64>,
    pub harmonic_product: Option<f64>,
    pub cepstral: Option<f64>,
}

impl EstimatorReadings {
    pub fn values(&self) -> Vec<f64> {
        [self.autocorrelation, self.harmonic_product, self.cepstral]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Fundamental-frequency estimate for one chunk
///
/// Produced fresh per chunk and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchEstimate {
    /// Combined fundamental frequency (Hz)
    pub frequency_hz: f64,
    /// Detection confidence (0.0-1.0)
    pub confidence: f64,
    /// RMS amplitude of the raw chunk
    pub magnitude: f64,
    /// Accepted partials as (frequency Hz, magnitude)
    pub harmonics: Vec<(f64, f64)>,
    /// Energy-weighted mean frequency (Hz)
    pub spectral_centroid: f64,
    /// Sign changes per sample (0.0-1.0)
    pub zero_crossing_rate: f64,
    pub estimators: EstimatorReadings,
    /// Wall-clock milliseconds since the Unix epoch
    pub timestamp_ms: u64,
}
