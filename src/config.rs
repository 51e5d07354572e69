//! Configuration management for runtime parameter tuning
//!
//! This module provides runtime configuration loading from JSON files,
//! so estimator ranges, latency deadlines, rate limits and session
//! timeouts can be adjusted per deployment without recompilation.
//! Every section falls back to its defaults field by field.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "SHRUTI_CONFIG";

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/shruti.json";

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub analysis: AnalysisConfig,
    pub matcher: MatcherConfig,
    pub raga: RagaConfig,
    pub session: SessionConfig,
    pub ingestion: IngestionConfig,
    pub server: ServerConfig,
}

/// Pitch estimator parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Lowest fundamental the estimators search for (Hz)
    pub min_frequency_hz: f64,
    /// Highest fundamental the estimators search for (Hz)
    pub max_frequency_hz: f64,
    /// Chunks shorter than this are not analysed
    pub min_window_samples: usize,
    /// Zero-padding factor applied before the spectral FFTs
    pub fft_padding: usize,
    /// Autocorrelation peak must exceed this fraction of the zero-lag value
    pub autocorrelation_threshold: f64,
    /// Harmonics must reach this fraction of the spectrum peak
    pub harmonic_floor: f64,
    /// Number of harmonics inspected above the fundamental
    pub max_harmonics: usize,
    /// Peak amplitude below which a chunk counts as silence
    pub silence_threshold: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_frequency_hz: 80.0,
            max_frequency_hz: 2000.0,
            min_window_samples: 1024,
            fft_padding: 4,
            autocorrelation_threshold: 0.3,
            harmonic_floor: 0.1,
            max_harmonics: 7,
            silence_threshold: 1e-6,
        }
    }
}

/// Shruti matching parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Maximum |deviation| (exclusive) for a detection to count as a match
    pub tolerance_cents: f64,
    /// Tonic assigned to new sessions (C4)
    pub default_tonic_hz: f64,
    /// Compare against targets in the detected frequency's octave instead of
    /// the tonic's
    pub fold_octaves: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            tolerance_cents: 30.0,
            default_tonic_hz: 261.63,
            fold_octaves: false,
        }
    }
}

/// Raga context inference parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagaConfig {
    /// Number of recent matched tones considered
    pub window: usize,
    /// Minimum matched tones before any scoring happens
    pub min_tones: usize,
    /// Best score required to commit a context switch
    pub commit_threshold: f64,
}

impl Default for RagaConfig {
    fn default() -> Self {
        Self {
            window: 10,
            min_tones: 5,
            commit_threshold: 0.6,
        }
    }
}

/// Session lifecycle parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Inactivity after which a session is expired and removed
    pub session_timeout_secs: u64,
    /// Inactivity after which a session is reported as idle
    pub idle_after_secs: u64,
    /// Period of the background sweep
    pub cleanup_interval_secs: u64,
    /// Capacity of the per-session detection ring buffer
    pub history_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: 30 * 60,
            idle_after_secs: 60,
            cleanup_interval_secs: 5 * 60,
            history_capacity: 50,
        }
    }
}

impl SessionConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn idle_after(&self) -> Duration {
        Duration::from_secs(self.idle_after_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}

/// Real-time ingestion parameters
///
/// The deadline and rate limit are deployment defaults, not tuned limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Threads in the shared worker pool
    pub worker_threads: usize,
    /// Jobs that may wait for a free worker before dispatch is refused
    pub queue_capacity: usize,
    /// Per-chunk deadline at the dispatch boundary
    pub processing_deadline_ms: u64,
    /// Minimum spacing between accepted chunks of one session
    pub min_chunk_interval_ms: u64,
    /// Hard cap on chunk duration
    pub max_chunk_seconds: f64,
    pub min_sample_rate: u32,
    pub max_sample_rate: u32,
    /// Sample rate assumed when a chunk does not carry one
    pub default_sample_rate: u32,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            worker_threads: 8,
            queue_capacity: 64,
            processing_deadline_ms: 50,
            min_chunk_interval_ms: 20,
            max_chunk_seconds: 5.0,
            min_sample_rate: 8_000,
            max_sample_rate: 192_000,
            default_sample_rate: 44_100,
        }
    }
}

impl IngestionConfig {
    pub fn processing_deadline(&self) -> Duration {
        Duration::from_millis(self.processing_deadline_ms)
    }

    pub fn min_chunk_interval(&self) -> Duration {
        Duration::from_millis(self.min_chunk_interval_ms)
    }
}

/// WebSocket server parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8790".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or the defaults when the file is missing
    /// or invalid (a warning is logged in both cases)
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from `$SHRUTI_CONFIG` or the default location
    pub fn load() -> Self {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_file(path)
    }
}
