// Autocorrelation estimator
//
// Full (linear) autocorrelation computed through the FFT with 2x zero
// padding, searched over the lag range of the valid frequencies.
//
// The windowed signal's autocorrelation is divided by the autocorrelation
// of the Hann window itself (Boersma 1993). Without that, the window's own
// taper pulls every peak towards shorter lags, which on short chunks puts
// low tones several percent sharp. The quotient is only trusted up to half
// the chunk length, where the window term is still well above zero.

use super::fft::{parabolic_peak, FftProcessor};
use super::types::FrequencyRange;
use rustfft::num_complex::Complex;

/// Peaks within this fraction of the strongest one are treated as equal
/// and the shortest lag wins, which keeps period multiples from being
/// chosen over the period itself.
const OCTAVE_GUARD_RATIO: f64 = 0.9;

/// Linear autocorrelation r[0..len) of a windowed signal
pub fn autocorrelation(fft: &FftProcessor, windowed: &[f64]) -> Vec<f64> {
    let len = windowed.len();
    if len == 0 {
        return Vec::new();
    }

    let size = (2 * len).next_power_of_two();
    let mut spectrum = fft.forward(windowed, size);
    for bin in spectrum.iter_mut() {
        *bin = Complex::new(bin.norm_sqr(), 0.0);
    }
    fft.inverse(&mut spectrum);

    spectrum[..len].iter().map(|c| c.re).collect()
}

/// Autocorrelation of a Hann-windowed signal divided by the window's own
/// autocorrelation. Lags where the window term vanishes read as zero.
pub fn window_normalized(fft: &FftProcessor, windowed: &[f64]) -> Vec<f64> {
    let acf = autocorrelation(fft, windowed);
    let window = autocorrelation(fft, &FftProcessor::hann_window(&vec![1.0_f32; windowed.len()]));

    acf.iter()
        .zip(window.iter())
        .map(|(&r, &w)| if w > 0.0 { r / w } else { 0.0 })
        .collect()
}

/// Estimate the fundamental from the autocorrelation peak
///
/// The strongest local maximum in `[sr / max_hz, sr / min_hz]` (lags capped
/// at half the chunk) must exceed `threshold` times the zero-lag value,
/// otherwise no estimate is made.
pub fn estimate(
    fft: &FftProcessor,
    windowed: &[f64],
    sample_rate: u32,
    range: FrequencyRange,
    threshold: f64,
) -> Option<f64> {
    let acf = window_normalized(fft, windowed);
    if acf.len() < 3 {
        return None;
    }

    let r0 = acf[0];
    if r0 <= 0.0 {
        return None;
    }

    let sr = sample_rate as f64;
    let min_lag = ((sr / range.max_hz).floor() as usize).max(1);
    let max_lag = ((sr / range.min_hz).ceil() as usize)
        .min(acf.len() / 2)
        .min(acf.len() - 2);
    if min_lag >= max_lag {
        return None;
    }

    let peaks: Vec<(f64, f64)> = (min_lag..=max_lag)
        .filter(|&lag| acf[lag] >= acf[lag - 1] && acf[lag] >= acf[lag + 1])
        .map(|lag| {
            let (offset, value) = parabolic_peak(acf[lag - 1], acf[lag], acf[lag + 1]);
            (lag as f64 + offset, value)
        })
        .collect();

    let best = peaks.iter().map(|&(_, value)| value).fold(f64::MIN, f64::max);
    if peaks.is_empty() || best <= threshold * r0 {
        return None;
    }

    let (lag, _) = peaks
        .into_iter()
        .find(|&(_, value)| value >= OCTAVE_GUARD_RATIO * best)?;

    let frequency = sr / lag;
    range.contains(frequency).then_some(frequency)
}
