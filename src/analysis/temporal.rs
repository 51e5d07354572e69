// Temporal module - Time-domain feature extraction
//
// These features are computed on the raw (unwindowed) chunk.

/// Peak absolute amplitude
pub fn peak_amplitude(audio: &[f32]) -> f32 {
    audio.iter().fold(0.0_f32, |acc, &s| acc.max(s.abs()))
}

/// Root-mean-square amplitude
pub fn rms(audio: &[f32]) -> f64 {
    if audio.is_empty() {
        return 0.0;
    }

    let sum_sq: f64 = audio.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / audio.len() as f64).sqrt()
}

/// Compute zero-crossing rate (ZCR)
///
/// Formula: ZCR = (1 / (N - 1)) × #{n : sign(x[n]) ≠ sign(x[n-1])}
///
/// High ZCR indicates high-frequency or noise-like content; a pure tone
/// at frequency f sampled at sr has ZCR ≈ 2f / sr.
pub fn zero_crossing_rate(audio: &[f32]) -> f64 {
    if audio.len() < 2 {
        return 0.0;
    }

    let crossings = audio
        .windows(2)
        .filter(|pair| (pair[1] >= 0.0) != (pair[0] >= 0.0))
        .count();

    crossings as f64 / (audio.len() - 1) as f64
}
