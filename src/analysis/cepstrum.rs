// Cepstral estimator
//
// Real cepstrum = inverse FFT of the log-magnitude spectrum. A periodic
// partial structure in the spectrum shows up as a peak at the quefrency
// (in samples) of the fundamental period.

use super::fft::{parabolic_peak, FftProcessor};
use super::spectral::SpectralFeatures;
use super::types::FrequencyRange;
use rustfft::num_complex::Complex;

const LOG_FLOOR: f64 = 1e-10;

/// Peak must rise this many standard deviations above the mean of the
/// searched quefrency range.
const PROMINENCE_SIGMAS: f64 = 4.0;

/// Partials of a cepstral candidate checked for energy in the raw spectrum
const SUPPORT_PARTIALS: usize = 3;

/// Bins on each side of a partial searched for that energy
const SUPPORT_REACH_BINS: usize = 2;

/// Estimate the fundamental from the cepstral peak
///
/// Only interior local maxima of the searched quefrency range count; the
/// range edges sit on the steep low-quefrency slope and say nothing about
/// periodicity. A candidate is also dropped unless one of its first
/// partials reaches `presence_ratio` of the spectrum peak.
///
/// # Arguments
/// * `spectrum` - Magnitude spectrum of size `fft_size / 2 + 1`
/// * `fft_size` - FFT size the spectrum was computed with
pub fn estimate(
    fft: &FftProcessor,
    spectrum: &[f64],
    fft_size: usize,
    sample_rate: u32,
    range: FrequencyRange,
    presence_ratio: f64,
) -> Option<f64> {
    if fft_size < 8 || spectrum.len() != fft_size / 2 + 1 {
        return None;
    }

    // Rebuild the full, conjugate-symmetric log spectrum.
    let mut buffer: Vec<Complex<f64>> = (0..fft_size)
        .map(|i| {
            let bin = if i <= fft_size / 2 { i } else { fft_size - i };
            Complex::new((spectrum[bin] + LOG_FLOOR).ln(), 0.0)
        })
        .collect();
    fft.inverse(&mut buffer);
    let cepstrum: Vec<f64> = buffer.iter().map(|c| c.re).collect();

    let sr = sample_rate as f64;
    let min_q = ((sr / range.max_hz).floor() as usize).max(2);
    let max_q = ((sr / range.min_hz).ceil() as usize).min(fft_size / 2 - 1);
    if min_q >= max_q {
        return None;
    }

    let searched = &cepstrum[min_q..=max_q];
    let count = searched.len() as f64;
    let mean = searched.iter().sum::<f64>() / count;
    let variance = searched.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
    let std_dev = variance.sqrt();

    let peak_q = (min_q + 1..max_q)
        .filter(|&q| cepstrum[q] > cepstrum[q - 1] && cepstrum[q] >= cepstrum[q + 1])
        .max_by(|&a, &b| cepstrum[a].total_cmp(&cepstrum[b]))?;
    if std_dev <= 0.0 || cepstrum[peak_q] < mean + PROMINENCE_SIGMAS * std_dev {
        return None;
    }

    let (offset, _) = parabolic_peak(cepstrum[peak_q - 1], cepstrum[peak_q], cepstrum[peak_q + 1]);
    let frequency = sr / (peak_q as f64 + offset);
    if !has_spectral_support(spectrum, fft_size, sample_rate, frequency, presence_ratio) {
        return None;
    }
    range.contains(frequency).then_some(frequency)
}

fn has_spectral_support(
    spectrum: &[f64],
    fft_size: usize,
    sample_rate: u32,
    frequency: f64,
    presence_ratio: f64,
) -> bool {
    let features = SpectralFeatures::new(sample_rate, fft_size);
    let floor = presence_ratio * features.peak_magnitude(spectrum);
    let nyquist_bin = (spectrum.len() - 1) as f64;

    (1..=SUPPORT_PARTIALS)
        .map(|h| frequency * h as f64)
        .take_while(|&partial| partial / features.bin_hz() < nyquist_bin)
        .any(|partial| features.magnitude_near(spectrum, partial, SUPPORT_REACH_BINS) >= floor)
}
