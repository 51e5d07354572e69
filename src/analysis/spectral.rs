// Spectral module - Frequency-domain feature extraction
//
// This module computes features from magnitude spectra produced by
// `FftProcessor::magnitude_spectrum`. Bin `i` sits at `i * bin_hz`.
//
// References:
// - Peeters, G. (2004). A large set of audio features for sound description
// - Lerch, A. (2012). An Introduction to Audio Content Analysis

use super::fft::parabolic_peak;

/// Spectral feature computation functions
pub struct SpectralFeatures {
    bin_hz: f64,
}

impl SpectralFeatures {
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `fft_size` - FFT size the spectrum was computed with (after padding)
    pub fn new(sample_rate: u32, fft_size: usize) -> Self {
        Self {
            bin_hz: sample_rate as f64 / fft_size.max(1) as f64,
        }
    }

    pub fn bin_hz(&self) -> f64 {
        self.bin_hz
    }

    /// Compute spectral centroid (weighted mean frequency)
    ///
    /// Formula: centroid = Σ(f_i × |X[i]|²) / Σ|X[i]|²
    ///
    /// Energy-weighted, so a few strong partials dominate the leakage floor.
    pub fn compute_centroid(&self, spectrum: &[f64]) -> f64 {
        let (weighted_sum, energy_sum) = spectrum.iter().enumerate().fold(
            (0.0, 0.0),
            |(weighted, total), (i, &mag)| {
                let energy = mag * mag;
                (weighted + i as f64 * self.bin_hz * energy, total + energy)
            },
        );

        if energy_sum > 1e-20 {
            weighted_sum / energy_sum
        } else {
            0.0
        }
    }

    /// Compute spectral flatness (tonality measure)
    ///
    /// Formula: flatness = geometric_mean(|X[i]|) / arithmetic_mean(|X[i]|)
    ///
    /// Returns value between 0 (tonal, e.g., sine wave) and 1 (noise-like).
    pub fn compute_flatness(&self, spectrum: &[f64]) -> f64 {
        let non_zero: Vec<f64> = spectrum
            .iter()
            .filter(|&&mag| mag > 1e-10)
            .copied()
            .collect();

        if non_zero.is_empty() {
            return 0.0;
        }

        let log_sum: f64 = non_zero.iter().map(|&mag| mag.ln()).sum();
        let geometric_mean = (log_sum / non_zero.len() as f64).exp();
        let arithmetic_mean = non_zero.iter().sum::<f64>() / non_zero.len() as f64;

        if arithmetic_mean > 1e-10 {
            (geometric_mean / arithmetic_mean).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Largest magnitude above DC
    pub fn peak_magnitude(&self, spectrum: &[f64]) -> f64 {
        spectrum.iter().skip(1).copied().fold(0.0, f64::max)
    }

    /// Strongest magnitude within `reach_bins` of the bin nearest `frequency_hz`
    ///
    /// Zero when the frequency falls outside the spectrum.
    pub fn magnitude_near(&self, spectrum: &[f64], frequency_hz: f64, reach_bins: usize) -> f64 {
        if spectrum.len() < 2 || !frequency_hz.is_finite() || frequency_hz <= 0.0 {
            return 0.0;
        }

        let last = spectrum.len() - 1;
        let center = (frequency_hz / self.bin_hz).round() as usize;
        let lo = center.saturating_sub(reach_bins).max(1);
        let hi = (center + reach_bins).min(last);
        if lo > hi {
            return 0.0;
        }
        spectrum[lo..=hi].iter().copied().fold(0.0, f64::max)
    }

    /// Locate up to `max_harmonics` partials of `fundamental_hz`
    ///
    /// Each partial is the local maximum within `search_bins` of the ideal
    /// bin and is kept only when it reaches `floor_ratio` of the spectrum
    /// peak. Returns `(bin_index, frequency_hz, magnitude)` triples.
    pub fn find_harmonics(
        &self,
        spectrum: &[f64],
        fundamental_hz: f64,
        max_harmonics: usize,
        floor_ratio: f64,
        search_bins: usize,
    ) -> Vec<(usize, f64, f64)> {
        let mut harmonics = Vec::with_capacity(max_harmonics);
        if fundamental_hz <= 0.0 || spectrum.len() < 3 {
            return harmonics;
        }

        let floor = floor_ratio * self.peak_magnitude(spectrum);
        let last = spectrum.len() - 1;

        for h in 1..=max_harmonics {
            let ideal = (fundamental_hz * h as f64 / self.bin_hz).round() as usize;
            if ideal >= last {
                break;
            }

            let lo = ideal.saturating_sub(search_bins).max(1);
            let hi = (ideal + search_bins).min(last - 1);
            let Some(idx) = (lo..=hi).max_by(|&a, &b| spectrum[a].total_cmp(&spectrum[b])) else {
                continue;
            };

            if spectrum[idx] >= floor && spectrum[idx] > 0.0 {
                let (offset, _) = parabolic_peak(spectrum[idx - 1], spectrum[idx], spectrum[idx + 1]);
                harmonics.push((idx, (idx as f64 + offset) * self.bin_hz, spectrum[idx]));
            }
        }

        harmonics
    }

    /// Share of spectral energy carried by the given partials
    ///
    /// Sums |X|² over `lobe_bins` on each side of every partial (each bin
    /// counted once) and divides by the total energy of the spectrum.
    pub fn harmonic_energy_share(
        &self,
        spectrum: &[f64],
        harmonic_bins: &[usize],
        lobe_bins: usize,
    ) -> f64 {
        let total: f64 = spectrum.iter().map(|&mag| mag * mag).sum();
        if total <= 1e-20 || harmonic_bins.is_empty() {
            return 0.0;
        }

        let mut counted = vec![false; spectrum.len()];
        let mut harmonic_energy = 0.0;
        for &bin in harmonic_bins {
            let lo = bin.saturating_sub(lobe_bins);
            let hi = (bin + lobe_bins).min(spectrum.len() - 1);
            for i in lo..=hi {
                if !counted[i] {
                    counted[i] = true;
                    harmonic_energy += spectrum[i] * spectrum[i];
                }
            }
        }

        (harmonic_energy / total).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peaked_spectrum(len: usize, peaks: &[(usize, f64)]) -> Vec<f64> {
        let mut spectrum = vec![0.01; len];
        for &(bin, mag) in peaks {
            spectrum[bin] = mag;
            spectrum[bin - 1] = mag * 0.5;
            spectrum[bin + 1] = mag * 0.5;
        }
        spectrum
    }

    #[test]
    fn test_centroid_of_single_peak() {
        let features = SpectralFeatures::new(1000, 1000);
        let spectrum = peaked_spectrum(200, &[(100, 10.0)]);
        let centroid = features.compute_centroid(&spectrum);
        assert!((centroid - 100.0).abs() < 2.0, "centroid={}", centroid);
    }

    #[test]
    fn test_flatness_extremes() {
        let features = SpectralFeatures::new(1000, 1000);
        let flat = vec![1.0; 128];
        assert!((features.compute_flatness(&flat) - 1.0).abs() < 1e-9);

        let mut tonal = vec![1e-6; 128];
        tonal[40] = 100.0;
        assert!(features.compute_flatness(&tonal) < 0.1);
    }

    #[test]
    fn test_magnitude_near_reads_only_the_neighbourhood() {
        let features = SpectralFeatures::new(1000, 1000);
        let spectrum = peaked_spectrum(200, &[(100, 10.0)]);

        assert_eq!(features.magnitude_near(&spectrum, 101.0, 2), 10.0);
        assert_eq!(features.magnitude_near(&spectrum, 150.0, 2), 0.01);
        assert_eq!(features.magnitude_near(&spectrum, 5000.0, 2), 0.0);
        assert_eq!(features.magnitude_near(&spectrum, f64::NAN, 2), 0.0);
    }

    #[test]
    fn test_find_harmonics_applies_floor() {
        let features = SpectralFeatures::new(1000, 1000);
        // fundamental at 50 Hz, strong 2nd partial, weak 3rd partial
        let spectrum = peaked_spectrum(400, &[(50, 10.0), (100, 6.0), (150, 0.5)]);
        let harmonics = features.find_harmonics(&spectrum, 50.0, 7, 0.1, 2);

        let bins: Vec<usize> = harmonics.iter().map(|h| h.0).collect();
        assert_eq!(bins, vec![50, 100]);
    }

    #[test]
    fn test_harmonic_energy_share() {
        let features = SpectralFeatures::new(1000, 1000);
        let spectrum = peaked_spectrum(400, &[(50, 10.0)]);
        let share = features.harmonic_energy_share(&spectrum, &[50], 2);
        assert!(share > 0.9, "share={}", share);
        assert_eq!(features.harmonic_energy_share(&spectrum, &[], 2), 0.0);
    }
}
