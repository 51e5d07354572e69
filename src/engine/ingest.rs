//! Per-chunk ingestion: validate, gate, dispatch, record.
//!
//! A chunk takes this path:
//! 1. Decode and validate on the caller (`INVALID_INPUT`)
//! 2. Per-session admission: in-flight and spacing checks (`RATE_LIMITED`)
//! 3. Estimation and matching on the shared worker pool under a deadline
//!    (`PROCESSING_TIMEOUT`)
//! 4. Back on the caller: session history, raga context and stats
//!
//! Worker jobs are pure; only the caller mutates the session, and only
//! after a result arrived in time.

use std::sync::Arc;
use std::time::Instant;

use crate::analysis::{now_ms, PitchSource};
use crate::api::{AudioPayload, ServerEvent, ToneDetected};
use crate::config::{AnalysisConfig, IngestionConfig};
use crate::engine::validation;
use crate::engine::worker_pool::{DispatchError, WorkerPool};
use crate::error::PipelineError;
use crate::managers::session_registry::{lock_session, SessionRegistry};
use crate::session::SessionId;
use crate::shruti::{ShrutiMatcher, ToneMatch};
use crate::telemetry::TelemetryHub;

pub struct IngestionPipeline {
    registry: Arc<SessionRegistry>,
    pool: Arc<WorkerPool>,
    telemetry: Arc<TelemetryHub>,
    matcher: ShrutiMatcher,
    config: IngestionConfig,
    silence_threshold: f32,
}

impl IngestionPipeline {
    pub fn new(
        registry: Arc<SessionRegistry>,
        pool: Arc<WorkerPool>,
        telemetry: Arc<TelemetryHub>,
        matcher: ShrutiMatcher,
        config: IngestionConfig,
        analysis: &AnalysisConfig,
    ) -> Self {
        Self {
            registry,
            pool,
            telemetry,
            matcher,
            config,
            silence_threshold: analysis.silence_threshold,
        }
    }

    /// Process one audio chunk for a session
    ///
    /// # Returns
    /// * `Ok(ServerEvent::ToneDetected)` - estimate matched (or not) against the table
    /// * `Ok(ServerEvent::NoPitch)` - chunk processed, no fundamental found
    /// * `Err(PipelineError)` - chunk rejected or dropped
    pub async fn process_chunk(
        &self,
        session_id: &SessionId,
        payload: &AudioPayload,
        sample_rate: Option<u32>,
    ) -> Result<ServerEvent, PipelineError> {
        let session = self.registry.get(session_id)?;

        let sample_rate = validation::resolve_sample_rate(sample_rate, &self.config);
        let samples = match validation::decode_payload(payload).and_then(|samples| {
            validation::validate_chunk(&samples, sample_rate, &self.config, self.silence_threshold)
                .map(|_| samples)
        }) {
            Ok(samples) => samples,
            Err(err) => {
                lock_session(&session).record_rejection();
                return Err(err);
            }
        };

        let (estimator, tonic_hz) = {
            let mut guard = lock_session(&session);
            if let Err(err) = guard.admit_chunk(self.registry.now()) {
                guard.record_rejection();
                return Err(err);
            }
            (guard.estimator(), guard.tonic_frequency())
        };

        let started = Instant::now();
        let matcher = self.matcher;
        let job = move || analyse(estimator.as_ref(), &matcher, &samples, sample_rate, tonic_hz);

        let outcome = self
            .pool
            .submit_with_deadline(job, self.config.processing_deadline())
            .await;
        self.telemetry
            .record_queue_occupancy(self.pool.queued_jobs(), self.config.queue_capacity);
        let processing_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        let mut guard = lock_session(&session);
        guard.finish_chunk();

        match outcome {
            Ok(Some(tone_match)) => {
                let timestamp = now_ms();
                let tone_match = guard.record_detection(tone_match, processing_time_ms, timestamp);
                drop(guard);

                self.telemetry.record_chunk(
                    &session_id.to_string(),
                    processing_time_ms,
                    tone_match.is_matched(),
                );
                tracing::debug!(
                    session_id = %session_id,
                    tone = tone_match.tone_name().unwrap_or("-"),
                    frequency = tone_match.detected_frequency,
                    cents = tone_match.cent_deviation,
                    processing_time_ms,
                    "tone detected"
                );
                Ok(ServerEvent::ToneDetected(ToneDetected::new(
                    tone_match,
                    processing_time_ms,
                    timestamp,
                )))
            }
            Ok(None) => {
                guard.record_no_pitch(processing_time_ms);
                drop(guard);

                self.telemetry
                    .record_chunk(&session_id.to_string(), processing_time_ms, false);
                Ok(ServerEvent::NoPitch {
                    processing_time_ms,
                    timestamp: now_ms(),
                })
            }
            Err(DispatchError::DeadlineExceeded) | Err(DispatchError::QueueFull) => {
                guard.record_timeout();
                Err(PipelineError::ProcessingTimeout {
                    deadline_ms: self.config.processing_deadline_ms,
                })
            }
            Err(err) => Err(PipelineError::internal(err.to_string())),
        }
    }
}

/// Estimate and match one chunk; runs on a worker thread
fn analyse(
    estimator: &dyn PitchSource,
    matcher: &ShrutiMatcher,
    samples: &[f32],
    sample_rate: u32,
    tonic_hz: f64,
) -> Option<ToneMatch> {
    estimator
        .estimate(samples, sample_rate)
        .map(|estimate| matcher.match_estimate(&estimate, tonic_hz))
}
