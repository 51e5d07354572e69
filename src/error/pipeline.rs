// Pipeline error types and constants

use crate::error::ErrorCode;
use log::{debug, error, warn};
use std::fmt;

/// Pipeline error code constants
///
/// Single source of truth for the numeric codes carried in telemetry and
/// the wire signal names sent to clients.
///
/// Error code range: 3001-3005
pub struct PipelineErrorCodes {}

impl PipelineErrorCodes {
    /// Chunk could not be decoded, was oversized, non-finite or silent
    pub const INVALID_INPUT: i32 = 3001;

    /// Session exceeded its chunk rate
    pub const RATE_LIMITED: i32 = 3002;

    /// Estimation did not finish before the dispatch deadline
    pub const PROCESSING_TIMEOUT: i32 = 3003;

    /// Chunk addressed an unknown or expired session
    pub const SESSION_NOT_FOUND: i32 = 3004;

    /// Unexpected failure inside estimation
    pub const INTERNAL_ERROR: i32 = 3005;
}

/// Log a pipeline error with structured context
///
/// Transient rejections (rate limit, deadline) fire per chunk and are logged
/// at debug level. Other client-caused rejections are logged at warn level,
/// everything the client cannot fix at error level.
pub fn log_pipeline_error(err: &PipelineError, context: &str) {
    match err {
        _ if err.is_transient() => debug!(
            "Transient rejection in {}: code={}, signal={}",
            context,
            err.code(),
            err.signal()
        ),
        PipelineError::InternalError { .. } => error!(
            "Pipeline error in {}: code={}, component=IngestionPipeline, message={}",
            context,
            err.code(),
            err.message()
        ),
        _ => warn!(
            "Pipeline rejection in {}: code={}, signal={}, message={}",
            context,
            err.code(),
            err.signal(),
            err.message()
        ),
    }
}

/// Per-chunk failures
///
/// Every failure is local to one session and one chunk. None of them tear
/// down the session or the process.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Malformed, oversized, non-finite or silent chunk
    InvalidInput { reason: String },

    /// Chunk arrived too soon after the previous accepted one
    RateLimited { min_interval_ms: u64 },

    /// Result not ready before the deadline; it is dropped
    ProcessingTimeout { deadline_ms: u64 },

    /// Unknown or expired session id
    SessionNotFound { session_id: String },

    /// Estimation failed unexpectedly (panic, poisoned lock, closed pool)
    InternalError { details: String },
}

impl PipelineError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        PipelineError::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn internal(details: impl Into<String>) -> Self {
        PipelineError::InternalError {
            details: details.into(),
        }
    }

    /// Wire-level signal name
    pub fn signal(&self) -> &'static str {
        match self {
            PipelineError::InvalidInput { .. } => "INVALID_INPUT",
            PipelineError::RateLimited { .. } => "RATE_LIMITED",
            PipelineError::ProcessingTimeout { .. } => "PROCESSING_TIMEOUT",
            PipelineError::SessionNotFound { .. } => "SESSION_NOT_FOUND",
            PipelineError::InternalError { .. } => "INTERNAL_ERROR",
        }
    }

    /// Whether the client may simply try again later
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PipelineError::RateLimited { .. } | PipelineError::ProcessingTimeout { .. }
        )
    }
}

impl ErrorCode for PipelineError {
    fn code(&self) -> i32 {
        match self {
            PipelineError::InvalidInput { .. } => PipelineErrorCodes::INVALID_INPUT,
            PipelineError::RateLimited { .. } => PipelineErrorCodes::RATE_LIMITED,
            PipelineError::ProcessingTimeout { .. } => PipelineErrorCodes::PROCESSING_TIMEOUT,
            PipelineError::SessionNotFound { .. } => PipelineErrorCodes::SESSION_NOT_FOUND,
            PipelineError::InternalError { .. } => PipelineErrorCodes::INTERNAL_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            PipelineError::InvalidInput { reason } => format!("Invalid audio chunk: {}", reason),
            PipelineError::RateLimited { min_interval_ms } => format!(
                "Too many chunks: wait at least {} ms between chunks",
                min_interval_ms
            ),
            PipelineError::ProcessingTimeout { deadline_ms } => format!(
                "Processing exceeded {} ms deadline; result dropped",
                deadline_ms
            ),
            PipelineError::SessionNotFound { session_id } => {
                format!("Session {} not found. Reconnect to continue.", session_id)
            }
            PipelineError::InternalError { details } => {
                format!("Internal processing error: {}", details)
            }
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PipelineError::{} (code {}): {}",
            self.signal(),
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for PipelineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_codes() {
        assert_eq!(
            PipelineError::invalid_input("nan").code(),
            PipelineErrorCodes::INVALID_INPUT
        );
        assert_eq!(
            PipelineError::RateLimited { min_interval_ms: 20 }.code(),
            PipelineErrorCodes::RATE_LIMITED
        );
        assert_eq!(
            PipelineError::ProcessingTimeout { deadline_ms: 50 }.code(),
            PipelineErrorCodes::PROCESSING_TIMEOUT
        );
        assert_eq!(
            PipelineError::SessionNotFound {
                session_id: "abc".to_string()
            }
            .code(),
            PipelineErrorCodes::SESSION_NOT_FOUND
        );
        assert_eq!(
            PipelineError::internal("boom").code(),
            PipelineErrorCodes::INTERNAL_ERROR
        );
    }

    #[test]
    fn test_signals_and_transience() {
        let timeout = PipelineError::ProcessingTimeout { deadline_ms: 50 };
        assert_eq!(timeout.signal(), "PROCESSING_TIMEOUT");
        assert!(timeout.is_transient());

        let invalid = PipelineError::invalid_input("empty");
        assert_eq!(invalid.signal(), "INVALID_INPUT");
        assert!(!invalid.is_transient());
    }

    #[test]
    fn test_pipeline_error_display() {
        let err = PipelineError::RateLimited { min_interval_ms: 20 };
        let display = format!("{}", err);
        assert!(display.contains("RATE_LIMITED"));
        assert!(display.contains("3002"));
        assert!(err.message().contains("20 ms"));
    }
}
