// Error types for the shruti trainer core
//
// This module defines the per-chunk error taxonomy of the ingestion pipeline,
// providing structured error handling with numeric codes for telemetry and
// signal names for the wire protocol.

mod pipeline;

pub use pipeline::{log_pipeline_error, PipelineError, PipelineErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the transport boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
