// Harmonic product spectrum estimator
//
// The magnitude spectrum is multiplied by copies of itself decimated by
// 2..=5; partials of one fundamental line up and reinforce each other.
// The product is accumulated in the log domain to stay clear of underflow.

use super::fft::parabolic_peak;
use super::types::FrequencyRange;

/// Highest decimation factor folded into the product
pub const MAX_DECIMATION: usize = 5;

const LOG_FLOOR: f64 = 1e-12;

/// Estimate the fundamental from a magnitude spectrum
///
/// # Arguments
/// * `spectrum` - Magnitude spectrum (positive frequencies, DC at bin 0)
/// * `bin_hz` - Frequency spacing of the bins
/// * `range` - Valid fundamental range
/// * `presence_ratio` - A fundamental must reach this fraction of the
///   spectrum peak in the raw spectrum
///
/// For a weak or missing fundamental the product peak lands on a
/// sub-multiple; the answer is resolved to the lowest multiple of the
/// product peak that is actually present in the raw spectrum. With a single
/// partial the log product can peak between sidelobes where no multiple has
/// energy; the strongest in-range bin of the raw spectrum is used then.
pub fn estimate(
    spectrum: &[f64],
    bin_hz: f64,
    range: FrequencyRange,
    presence_ratio: f64,
) -> Option<f64> {
    if spectrum.len() < 4 || bin_hz <= 0.0 {
        return None;
    }

    let last = spectrum.len() - 1;
    let lo = ((range.min_hz / bin_hz).ceil() as usize).max(1);
    let hi = ((range.max_hz / bin_hz).floor() as usize).min(last - 1);
    if lo > hi {
        return None;
    }

    // Same number of factors for every candidate bin, so products compare fairly.
    let factors = (last / hi).clamp(1, MAX_DECIMATION);

    let log_spectrum: Vec<f64> = spectrum.iter().map(|&m| (m + LOG_FLOOR).ln()).collect();
    let product_peak = (lo..=hi).max_by(|&a, &b| {
        let pa: f64 = (1..=factors).map(|h| log_spectrum[a * h]).sum();
        let pb: f64 = (1..=factors).map(|h| log_spectrum[b * h]).sum();
        pa.total_cmp(&pb)
    })?;

    let spectrum_peak = spectrum.iter().skip(1).copied().fold(0.0, f64::max);
    if spectrum_peak <= 0.0 {
        return None;
    }
    let presence_floor = presence_ratio * spectrum_peak;

    let fundamental_bin = (1..=factors)
        .map(|m| climb_to_peak(spectrum, product_peak * m))
        .find(|&bin| spectrum[bin] >= presence_floor)
        .or_else(|| (lo..=hi).max_by(|&a, &b| spectrum[a].total_cmp(&spectrum[b])))?;

    if fundamental_bin == 0 || fundamental_bin >= last {
        return None;
    }

    let (offset, _) = parabolic_peak(
        spectrum[fundamental_bin - 1],
        spectrum[fundamental_bin],
        spectrum[fundamental_bin + 1],
    );
    let frequency = (fundamental_bin as f64 + offset) * bin_hz;
    range.contains(frequency).then_some(frequency)
}

/// Walk uphill from `start` to the nearest local maximum
fn climb_to_peak(spectrum: &[f64], start: usize) -> usize {
    let last = spectrum.len() - 1;
    let mut idx = start.clamp(1, last);
    loop {
        if idx < last && spectrum[idx + 1] > spectrum[idx] {
            idx += 1;
        } else if idx > 1 && spectrum[idx - 1] > spectrum[idx] {
            idx -= 1;
        } else {
            return idx;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fft::FftProcessor;

    fn lobe(spectrum: &mut [f64], bin: usize, mag: f64) {
        spectrum[bin] = mag;
        spectrum[bin - 1] = mag * 0.6;
        spectrum[bin + 1] = mag * 0.6;
    }

    #[test]
    fn test_harmonic_series_peak() {
        // 1 Hz bins, fundamental at 100 Hz with four partials
        let mut spectrum = vec![1e-4; 1024];
        lobe(&mut spectrum, 100, 1.0);
        lobe(&mut spectrum, 200, 0.8);
        lobe(&mut spectrum, 300, 0.6);
        lobe(&mut spectrum, 400, 0.4);
        lobe(&mut spectrum, 500, 0.3);

        let freq = estimate(&spectrum, 1.0, FrequencyRange::new(50.0, 180.0), 0.1)
            .expect("estimate");
        assert!((freq - 100.0).abs() < 0.5, "freq={}", freq);
    }

    #[test]
    fn test_single_partial_resolves_to_present_bin() {
        // Lone partial at 150 Hz: the product favours a sub-multiple, the
        // presence check brings the answer back to 150 Hz.
        let mut spectrum = vec![1e-4; 1024];
        lobe(&mut spectrum, 150, 1.0);

        let freq = estimate(&spectrum, 1.0, FrequencyRange::new(40.0, 180.0), 0.1)
            .expect("estimate");
        assert!((freq - 150.0).abs() < 0.5, "freq={}", freq);
    }

    #[test]
    fn test_lone_partial_between_sidelobes_still_found() {
        // 120 Hz at 44.1 kHz, 4096 samples padded to 16384. The log product
        // peaks near 83 Hz where no multiple carries energy.
        let sample_rate = 44100;
        let len = 4096;
        let size = 4 * len;
        let signal: Vec<f32> = (0..len)
            .map(|i| {
                (0.5 * (2.0 * std::f64::consts::PI * 119.9 * i as f64 / sample_rate as f64).sin())
                    as f32
            })
            .collect();
        let fft = FftProcessor::new();
        let spectrum = fft.magnitude_spectrum(&FftProcessor::hann_window(&signal), size);
        let bin_hz = sample_rate as f64 / size as f64;

        let freq = estimate(&spectrum, bin_hz, FrequencyRange::new(80.0, 2000.0), 0.1)
            .expect("estimate");
        assert!((freq - 119.9).abs() / 119.9 < 0.01, "freq={}", freq);
    }

    #[test]
    fn test_flat_spectrum_has_no_present_fundamental() {
        let spectrum = vec![0.0; 1024];
        assert!(estimate(&spectrum, 1.0, FrequencyRange::new(40.0, 180.0), 0.1).is_none());
    }

    #[test]
    fn test_climb_to_peak() {
        let spectrum = vec![0.0, 1.0, 2.0, 3.0, 2.0, 1.0];
        assert_eq!(climb_to_peak(&spectrum, 1), 3);
        assert_eq!(climb_to_peak(&spectrum, 5), 3);
    }
}
