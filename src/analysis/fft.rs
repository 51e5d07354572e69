// FFT module - Fast Fourier Transform computation
//
// This module handles windowing and forward/inverse FFTs for the pitch
// estimators. Spectra are zero-padded to a power of two so the spectral
// estimators get interpolated bins for free.

use rustfft::{num_complex::Complex, FftPlanner};
use std::sync::Mutex;

/// FFT processor shared by the spectral and correlation estimators
///
/// The planner caches plans per size; chunk lengths are fairly stable per
/// client so plans are reused across chunks of the same session.
pub struct FftProcessor {
    planner: Mutex<FftPlanner<f64>>,
}

impl FftProcessor {
    pub fn new() -> Self {
        Self {
            planner: Mutex::new(FftPlanner::new()),
        }
    }

    /// Apply a Hann window to reduce spectral leakage
    pub fn hann_window(signal: &[f32]) -> Vec<f64> {
        let len = signal.len();
        if len < 2 {
            return signal.iter().map(|&s| s as f64).collect();
        }

        let denom = (len - 1) as f64;
        signal
            .iter()
            .enumerate()
            .map(|(i, &sample)| {
                let w = 0.5 * (1.0 - ((2.0 * std::f64::consts::PI * i as f64) / denom).cos());
                sample as f64 * w
            })
            .collect()
    }

    /// FFT size used for spectra of a chunk: next power of two times `padding`
    pub fn padded_size(len: usize, padding: usize) -> usize {
        len.max(1).next_power_of_two() * padding.max(1)
    }

    /// Forward FFT of a real signal, zero-padded to `size`
    pub fn forward(&self, signal: &[f64], size: usize) -> Vec<Complex<f64>> {
        let mut buffer: Vec<Complex<f64>> = signal
            .iter()
            .take(size)
            .map(|&s| Complex::new(s, 0.0))
            .collect();
        buffer.resize(size, Complex::new(0.0, 0.0));

        let fft = self.lock_planner().plan_fft_forward(size);
        fft.process(&mut buffer);
        buffer
    }

    /// In-place inverse FFT, normalised by the buffer length
    pub fn inverse(&self, buffer: &mut [Complex<f64>]) {
        let size = buffer.len();
        if size == 0 {
            return;
        }

        let fft = self.lock_planner().plan_fft_inverse(size);
        fft.process(buffer);

        let scale = 1.0 / size as f64;
        for value in buffer.iter_mut() {
            *value *= scale;
        }
    }

    /// Magnitude spectrum for positive frequencies (size / 2 + 1 bins)
    pub fn magnitude_spectrum(&self, windowed: &[f64], size: usize) -> Vec<f64> {
        let buffer = self.forward(windowed, size);
        buffer[..size / 2 + 1].iter().map(|c| c.norm()).collect()
    }

    // The planner only caches plans, so a poisoned lock is still usable.
    fn lock_planner(&self) -> std::sync::MutexGuard<'_, FftPlanner<f64>> {
        self.planner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for FftProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Parabolic interpolation around a sampled peak
///
/// Returns `(offset, value)` where `offset` lies in `[-0.5, 0.5]` relative to
/// the centre sample. Falls back to the centre when the three points are not
/// concave.
pub fn parabolic_peak(left: f64, centre: f64, right: f64) -> (f64, f64) {
    let denom = left - 2.0 * centre + right;
    if denom >= 0.0 || !denom.is_finite() {
        return (0.0, centre);
    }

    let offset = (0.5 * (left - right) / denom).clamp(-0.5, 0.5);
    let value = centre - 0.25 * (left - right) * offset;
    (offset, value)
}
