// Shruti matching - frequency + tonic to the nearest 22-tone degree
//
// Targets are the table ratios over the tonic, in the tonic's own octave.
// With octave folding turned on, the detected frequency is instead compared
// against every entry in the octave it falls in and in the octave above, so
// a singer an octave away from the tonic still matches the right degree.

pub mod table;

pub use table::{tone_by_name, ToneEntry, SHRUTI_TABLE};

use serde::Serialize;

use crate::analysis::PitchEstimate;
use crate::config::MatcherConfig;

/// Deviations closer than this are treated as equal
const CENT_EPSILON: f64 = 1e-9;

/// Result of matching one frequency against the table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToneMatch {
    /// `None` when the closest entry is outside the tolerance window
    pub tone: Option<ToneEntry>,
    pub detected_frequency: f64,
    /// Frequency of the closest entry (matched or not)
    pub target_frequency: f64,
    /// Signed cents from the closest entry
    pub cent_deviation: f64,
    pub confidence: f64,
    pub raga_context: Option<String>,
}

impl ToneMatch {
    pub fn is_matched(&self) -> bool {
        self.tone.is_some()
    }

    pub fn tone_name(&self) -> Option<&'static str> {
        self.tone.map(|t| t.name)
    }

    pub fn western_label(&self) -> Option<&'static str> {
        self.tone.map(|t| t.western_label)
    }

    fn unmatched(detected_frequency: f64) -> Self {
        Self {
            tone: None,
            detected_frequency,
            target_frequency: 0.0,
            cent_deviation: 0.0,
            confidence: 0.0,
            raga_context: None,
        }
    }
}

/// Signed distance in cents from `reference` to `frequency`
pub fn cents_between(frequency: f64, reference: f64) -> f64 {
    1200.0 * (frequency / reference).log2()
}

/// Match a frequency against the 22-shruti table
///
/// Targets are `tonic_hz * ratio` in the tonic's own octave. The closest entry
/// wins; it is reported as the matched tone only if its absolute deviation is
/// strictly below `tolerance_cents`. Equal deviations resolve to the lower
/// entry. Non-positive or non-finite inputs produce an unmatched result with
/// zero target.
pub fn match_frequency(frequency_hz: f64, tonic_hz: f64, tolerance_cents: f64) -> ToneMatch {
    match_with_bases(frequency_hz, tonic_hz, tolerance_cents, false)
}

/// Like [`match_frequency`], but targets are moved into the octave of
/// `frequency_hz` (and the one above it) before comparing.
pub fn match_frequency_folded(
    frequency_hz: f64,
    tonic_hz: f64,
    tolerance_cents: f64,
) -> ToneMatch {
    match_with_bases(frequency_hz, tonic_hz, tolerance_cents, true)
}

fn match_with_bases(
    frequency_hz: f64,
    tonic_hz: f64,
    tolerance_cents: f64,
    fold_octaves: bool,
) -> ToneMatch {
    let usable = |v: f64| v.is_finite() && v > 0.0;
    if !usable(frequency_hz) || !usable(tonic_hz) {
        return ToneMatch::unmatched(frequency_hz);
    }

    let bases = if fold_octaves {
        let octave = (frequency_hz / tonic_hz).log2().floor();
        let base = tonic_hz * octave.exp2();
        vec![base, base * 2.0]
    } else {
        vec![tonic_hz]
    };

    let mut best: Option<(&ToneEntry, f64, f64)> = None;
    for octave_base in bases {
        for entry in SHRUTI_TABLE.iter() {
            let target = octave_base * entry.frequency_ratio;
            let deviation = cents_between(frequency_hz, target);
            let closer = match best {
                None => true,
                Some((_, _, best_dev)) => deviation.abs() < best_dev.abs() - CENT_EPSILON,
            };
            if closer {
                best = Some((entry, target, deviation));
            }
        }
    }

    let Some((entry, target_frequency, cent_deviation)) = best else {
        return ToneMatch::unmatched(frequency_hz);
    };

    let matched = cent_deviation.abs() + CENT_EPSILON < tolerance_cents;
    ToneMatch {
        tone: matched.then_some(*entry),
        detected_frequency: frequency_hz,
        target_frequency,
        cent_deviation,
        confidence: 0.0,
        raga_context: None,
    }
}

/// Matcher bound to a configured tolerance and octave mode
#[derive(Debug, Clone, Copy)]
pub struct ShrutiMatcher {
    tolerance_cents: f64,
    fold_octaves: bool,
}

impl ShrutiMatcher {
    pub fn new(tolerance_cents: f64) -> Self {
        Self {
            tolerance_cents,
            fold_octaves: false,
        }
    }

    pub fn with_octave_folding(mut self, fold_octaves: bool) -> Self {
        self.fold_octaves = fold_octaves;
        self
    }

    pub fn from_config(config: &MatcherConfig) -> Self {
        Self::new(config.tolerance_cents).with_octave_folding(config.fold_octaves)
    }

    pub fn tolerance_cents(&self) -> f64 {
        self.tolerance_cents
    }

    pub fn folds_octaves(&self) -> bool {
        self.fold_octaves
    }

    pub fn match_frequency(&self, frequency_hz: f64, tonic_hz: f64) -> ToneMatch {
        match_with_bases(
            frequency_hz,
            tonic_hz,
            self.tolerance_cents,
            self.fold_octaves,
        )
    }

    /// Match an estimate, carrying its confidence into the result
    pub fn match_estimate(&self, estimate: &PitchEstimate, tonic_hz: f64) -> ToneMatch {
        ToneMatch {
            confidence: estimate.confidence,
            ..self.match_frequency(estimate.frequency_hz, tonic_hz)
        }
    }
}

impl Default for ShrutiMatcher {
    fn default() -> Self {
        Self::from_config(&MatcherConfig::default())
    }
}
