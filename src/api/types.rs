use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, PipelineError};
use crate::session::{DetectionRecord, SessionState, SessionStats, SessionSummary};
use crate::shruti::ToneMatch;

/// Audio samples as sent by the client
///
/// Either a JSON array of floats or a base64 string of 16-bit
/// little-endian PCM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AudioPayload {
    Samples(Vec<f32>),
    Base64(String),
}

/// Inbound client frames, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    Connect {
        #[serde(default)]
        user_id: Option<String>,
    },
    AudioChunk {
        audio_data: AudioPayload,
        #[serde(default)]
        sample_rate: Option<u32>,
    },
    SetBaseFrequency {
        frequency: f64,
    },
    StartDetection,
    StopDetection,
    GetSessionStats,
    Disconnect,
}

/// Engine-wide health counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EngineHealth {
    pub active_sessions: usize,
    pub total_created: u64,
    pub total_expired: u64,
    pub worker_threads: usize,
    pub queued_jobs: usize,
    pub uptime_ms: u64,
}

/// Result of one analysed chunk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToneDetected {
    pub tone_name: Option<String>,
    pub western_label: Option<String>,
    pub frequency: f64,
    pub target_frequency: f64,
    pub cent_deviation: f64,
    pub confidence: f64,
    pub raga_context: Option<String>,
    pub processing_time_ms: f64,
    pub timestamp: u64,
}

impl ToneDetected {
    pub fn new(tone_match: ToneMatch, processing_time_ms: f64, timestamp: u64) -> Self {
        Self {
            tone_name: tone_match.tone_name().map(str::to_string),
            western_label: tone_match.western_label().map(str::to_string),
            frequency: tone_match.detected_frequency,
            target_frequency: tone_match.target_frequency,
            cent_deviation: tone_match.cent_deviation,
            confidence: tone_match.confidence,
            raga_context: tone_match.raga_context,
            processing_time_ms,
            timestamp,
        }
    }
}

/// Outbound server frames, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected {
        session_id: String,
        tonic_frequency: f64,
    },
    ToneDetected(ToneDetected),
    NoPitch {
        processing_time_ms: f64,
        timestamp: u64,
    },
    BaseFrequencySet {
        frequency: f64,
    },
    DetectionStarted {
        session_id: String,
        tonic_frequency: f64,
    },
    DetectionStopped {
        session_summary: SessionSummary,
    },
    SessionStats {
        stats: SessionStats,
        state: SessionState,
        raga_context: Option<String>,
        age_ms: u64,
        recent_detections: Vec<DetectionRecord>,
        health: EngineHealth,
    },
    ValidationError {
        message: String,
    },
    RateLimited {
        message: String,
    },
    ProcessingTimeout {
        message: String,
    },
    SessionError {
        message: String,
    },
    InternalError {
        message: String,
    },
}

impl ServerEvent {
    /// Wire event for a per-chunk failure
    pub fn from_error(err: &PipelineError) -> Self {
        let message = err.message();
        match err {
            PipelineError::InvalidInput { .. } => ServerEvent::ValidationError { message },
            PipelineError::RateLimited { .. } => ServerEvent::RateLimited { message },
            PipelineError::ProcessingTimeout { .. } => ServerEvent::ProcessingTimeout { message },
            PipelineError::SessionNotFound { .. } => ServerEvent::SessionError { message },
            PipelineError::InternalError { .. } => ServerEvent::InternalError { message },
        }
    }

    /// `type` tag as it appears on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::ToneDetected(_) => "tone_detected",
            ServerEvent::NoPitch { .. } => "no_pitch",
            ServerEvent::BaseFrequencySet { .. } => "base_frequency_set",
            ServerEvent::DetectionStarted { .. } => "detection_started",
            ServerEvent::DetectionStopped { .. } => "detection_stopped",
            ServerEvent::SessionStats { .. } => "session_stats",
            ServerEvent::ValidationError { .. } => "validation_error",
            ServerEvent::RateLimited { .. } => "rate_limited",
            ServerEvent::ProcessingTimeout { .. } => "processing_timeout",
            ServerEvent::SessionError { .. } => "session_error",
            ServerEvent::InternalError { .. } => "internal_error",
        }
    }
}
