//! Chunk decoding and validation.
//!
//! Runs on the caller before anything touches the session or the worker
//! pool; every failure is an `INVALID_INPUT` rejection.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::analysis::temporal;
use crate::api::AudioPayload;
use crate::config::IngestionConfig;
use crate::error::PipelineError;

const PCM16_SCALE: f32 = 32768.0;

/// Decode a client payload into normalised float samples
pub fn decode_payload(payload: &AudioPayload) -> Result<Vec<f32>, PipelineError> {
    match payload {
        AudioPayload::Samples(samples) => Ok(samples.clone()),
        AudioPayload::Base64(encoded) => decode_pcm16_base64(encoded),
    }
}

/// Decode base64 16-bit little-endian PCM into samples in [-1, 1)
pub fn decode_pcm16_base64(encoded: &str) -> Result<Vec<f32>, PipelineError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| PipelineError::invalid_input(format!("audio_data is not valid base64: {}", e)))?;

    if bytes.len() % 2 != 0 {
        return Err(PipelineError::invalid_input(
            "PCM payload has an odd number of bytes",
        ));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / PCM16_SCALE)
        .collect())
}

/// Sample rate from the frame, or the configured default
pub fn resolve_sample_rate(requested: Option<u32>, config: &IngestionConfig) -> u32 {
    requested.unwrap_or(config.default_sample_rate)
}

/// Check a decoded chunk
///
/// Rejects empty, oversized, non-finite and silent chunks, and sample rates
/// outside the configured range.
pub fn validate_chunk(
    samples: &[f32],
    sample_rate: u32,
    config: &IngestionConfig,
    silence_threshold: f32,
) -> Result<(), PipelineError> {
    if sample_rate < config.min_sample_rate || sample_rate > config.max_sample_rate {
        return Err(PipelineError::invalid_input(format!(
            "sample_rate {} outside {}-{} Hz",
            sample_rate, config.min_sample_rate, config.max_sample_rate
        )));
    }

    if samples.is_empty() {
        return Err(PipelineError::invalid_input("empty audio chunk"));
    }

    let max_samples = (config.max_chunk_seconds * sample_rate as f64) as usize;
    if samples.len() > max_samples {
        return Err(PipelineError::invalid_input(format!(
            "chunk of {} samples exceeds {} s at {} Hz",
            samples.len(),
            config.max_chunk_seconds,
            sample_rate
        )));
    }

    if samples.iter().any(|s| !s.is_finite()) {
        return Err(PipelineError::invalid_input("chunk contains NaN or infinite samples"));
    }

    if temporal::peak_amplitude(samples) < silence_threshold {
        return Err(PipelineError::invalid_input("chunk is silent"));
    }

    Ok(())
}
