use super::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SAMPLE_RATE: u32 = 44100;
const CHUNK: usize = 4096;

/// Generate pure sine wave for testing
fn generate_sine_wave(frequency: f64, amplitude: f32, len: usize) -> Vec<f32> {
    sine_at(frequency, amplitude, SAMPLE_RATE, len)
}

fn sine_at(frequency: f64, amplitude: f32, sample_rate: u32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            amplitude * (2.0 * std::f64::consts::PI * frequency * t).sin() as f32
        })
        .collect()
}

/// 100 Hz to 1500 Hz in steps of about 63 cents
fn swept_frequencies() -> Vec<f64> {
    std::iter::successors(Some(100.0), |f| Some(f * 1.037))
        .take_while(|&f| f <= 1500.0)
        .collect()
}

/// Generate a tone with decaying partials (voice-like)
fn generate_harmonic_tone(frequency: f64, partials: usize, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let t = i as f64 / SAMPLE_RATE as f64;
            (1..=partials)
                .map(|h| {
                    (0.4 / h as f64) * (2.0 * std::f64::consts::PI * frequency * h as f64 * t).sin()
                })
                .sum::<f64>() as f32
        })
        .collect()
}

fn estimator() -> PitchEstimator {
    PitchEstimator::new(AnalysisConfig::default())
}

#[test]
fn test_pure_sine_accuracy_swept() {
    let estimator = estimator();
    let mut failures = Vec::new();

    for sample_rate in [16000, 22050, 44100, 48000] {
        for len in [1024, 2048, 4096] {
            for freq in swept_frequencies() {
                let chunk = sine_at(freq, 0.5, sample_rate, len);
                match estimator.estimate(&chunk, sample_rate) {
                    Some(estimate)
                        if (estimate.frequency_hz - freq).abs() / freq < 0.02
                            && estimate.confidence > 0.8 => {}
                    other => failures.push(format!(
                        "{:.1} Hz at {} Hz x {}: {:?}",
                        freq,
                        sample_rate,
                        len,
                        other.map(|e| (e.frequency_hz, e.confidence, e.estimators))
                    )),
                }
            }
        }
    }

    assert!(
        failures.is_empty(),
        "{} failures:\n{}",
        failures.len(),
        failures.join("\n")
    );
}

#[test]
fn test_quiet_sines_keep_their_pitch() {
    // At 0.05 amplitude the loudness term is only 0.35, so confidence sits
    // right at the 0.8 line; only the frequency is checked here.
    let estimator = estimator();
    for len in [1024, 4096] {
        for freq in swept_frequencies() {
            let chunk = generate_sine_wave(freq, 0.05, len);
            let estimate = estimator
                .estimate(&chunk, SAMPLE_RATE)
                .unwrap_or_else(|| panic!("no estimate for {:.1} Hz x {}", freq, len));
            assert!(
                (estimate.frequency_hz - freq).abs() / freq < 0.02,
                "{:.1} Hz x {} estimated as {} ({:?})",
                freq,
                len,
                estimate.frequency_hz,
                estimate.estimators
            );
        }
    }
}

#[test]
fn test_low_tones_in_short_chunks() {
    // A 1024-sample chunk holds two to four periods of these tones
    let estimator = estimator();
    for (freq, sample_rate) in [(103.7, 44100), (100.0, 48000), (154.6, 48000), (110.0, 22050)] {
        let chunk = sine_at(freq, 0.5, sample_rate, 1024);
        let estimate = estimator
            .estimate(&chunk, sample_rate)
            .unwrap_or_else(|| panic!("no estimate for {} Hz at {} Hz", freq, sample_rate));
        assert!(
            (estimate.frequency_hz - freq).abs() / freq < 0.01,
            "{} Hz at {} Hz estimated as {} ({:?})",
            freq,
            sample_rate,
            estimate.frequency_hz,
            estimate.estimators
        );
        let acf = estimate.estimators.autocorrelation.expect("autocorrelation reading");
        assert!((acf - freq).abs() / freq < 0.01, "autocorrelation read {}", acf);
    }
}

#[test]
fn test_harmonic_tone_reports_fundamental_and_partials() {
    let estimator = estimator();
    let chunk = generate_harmonic_tone(220.0, 5, CHUNK);

    let estimate = estimator.estimate(&chunk, SAMPLE_RATE).expect("estimate");
    assert!(
        (estimate.frequency_hz - 220.0).abs() / 220.0 < 0.01,
        "estimated {} Hz ({:?})",
        estimate.frequency_hz,
        estimate.estimators
    );
    assert!(estimate.harmonics.len() >= 3, "harmonics={:?}", estimate.harmonics);
    assert!(estimate.harmonics.len() <= 7);
    assert!((estimate.harmonics[0].0 - 220.0).abs() < 3.0);
    assert!(estimate.spectral_centroid > 220.0);
}

#[test]
fn test_auxiliary_features_of_sine() {
    let estimator = estimator();
    let chunk = generate_sine_wave(441.0, 0.5, CHUNK);
    let estimate = estimator.estimate(&chunk, SAMPLE_RATE).expect("estimate");

    assert!((estimate.magnitude - 0.5 / 2f64.sqrt()).abs() < 0.01);
    assert!((estimate.zero_crossing_rate - 2.0 * 441.0 / SAMPLE_RATE as f64).abs() < 0.002);
    assert!((estimate.spectral_centroid - 441.0).abs() < 10.0);
    assert!(estimate.timestamp_ms > 0);
}

#[test]
fn test_silence_yields_no_estimate() {
    let estimator = estimator();

    assert!(estimator.estimate(&vec![0.0; CHUNK], SAMPLE_RATE).is_none());

    let near_silent = generate_sine_wave(440.0, 5e-7, CHUNK);
    assert!(estimator.estimate(&near_silent, SAMPLE_RATE).is_none());
}

#[test]
fn test_white_noise_is_rejected_or_low_confidence() {
    let estimator = estimator();

    for seed in [7_u64, 42, 1234] {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise: Vec<f32> = (0..CHUNK).map(|_| rng.gen_range(-0.5..0.5)).collect();

        if let Some(estimate) = estimator.estimate(&noise, SAMPLE_RATE) {
            assert!(
                estimate.confidence < 0.5,
                "seed {} noise confidence {}",
                seed,
                estimate.confidence
            );
        }
    }
}

#[test]
fn test_short_chunk_yields_no_estimate() {
    let estimator = estimator();
    let chunk = generate_sine_wave(440.0, 0.5, 512);
    assert!(estimator.estimate(&chunk, SAMPLE_RATE).is_none());
}

#[test]
fn test_explicit_range_excludes_tone() {
    let estimator = estimator();
    let chunk = generate_sine_wave(1000.0, 0.5, CHUNK);

    // Only a band far below the tone is searched; whatever comes back must
    // lie inside it, and the tone itself must not be reported.
    let range = FrequencyRange::new(80.0, 300.0);
    if let Some(estimate) = estimator.estimate_in_range(&chunk, SAMPLE_RATE, range) {
        assert!(estimate.frequency_hz <= 300.0);
    }
}

#[test]
fn test_combine_median() {
    assert_eq!(combine(vec![]), None);
    assert_eq!(combine(vec![440.0]), Some(440.0));
    assert_eq!(combine(vec![440.0, 442.0]), Some(441.0));
    // One outlier estimator cannot drag the result
    assert_eq!(combine(vec![440.0, 880.0, 441.0]), Some(441.0));
    assert_eq!(combine(vec![f64::NAN, 440.0]), Some(440.0));
}

#[test]
fn test_disagreeing_pair_keeps_supported_reading() {
    let support = |f: f64| if (f - 119.9).abs() < 1.0 { 1.0 } else { 0.01 };

    assert_eq!(combine_with_support(vec![119.9, 1955.0], support), Some(119.9));
    assert_eq!(combine_with_support(vec![1955.0, 119.9, f64::NAN], support), Some(119.9));
    // Close readings are still averaged
    assert_eq!(combine_with_support(vec![440.0, 442.0], support), Some(441.0));
    // Three readings go to the median whatever the support
    assert_eq!(combine_with_support(vec![440.0, 880.0, 441.0], |_| 0.0), Some(441.0));
    // Equal support keeps the lower reading
    assert_eq!(combine_with_support(vec![400.0, 200.0], |_| 1.0), Some(200.0));
    assert_eq!(combine_with_support(vec![], support), None);
}

#[test]
fn test_confidence_weights_and_clamp() {
    assert!((confidence(1.0, 1.0, 1.0) - 1.0).abs() < 1e-12);
    assert!((confidence(0.0, 0.0, 0.05) - 0.15).abs() < 1e-12);
    assert!((confidence(0.5, 0.0, 0.0) - 0.2).abs() < 1e-12);
    assert_eq!(confidence(0.0, 0.0, 0.0), 0.0);
}
