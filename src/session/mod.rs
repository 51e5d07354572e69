// Session - per-connection analysis state
//
// A session owns everything that differs between two singers: tonic,
// detection history, raga tracker, rate limiter and statistics. It also
// holds the estimator instance its chunks are analysed with. Sessions live
// behind a per-session mutex in the registry and are only ever locked
// briefly; estimation itself runs on the worker pool without the lock.

pub mod rate_limit;
pub mod stats;

pub use rate_limit::ChunkRateLimiter;
pub use stats::{SessionStats, SessionSummary};

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::PitchSource;
use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::raga::RagaContextTracker;
use crate::shruti::ToneMatch;
use stats::DetectionTotals;

pub type SessionId = Uuid;

/// Accepted range for a requested tonic
pub const TONIC_REQUEST_RANGE: (f64, f64) = (80.0, 800.0);
/// Range a tonic is clamped into once accepted
pub const TONIC_RANGE: (f64, f64) = (100.0, 500.0);

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Connected, no accepted chunk yet
    Created,
    /// Receiving chunks
    Active,
    /// No chunk for longer than the idle threshold
    Idle,
    /// Timed out; removed from the registry
    Expired,
}

/// One entry of the bounded detection history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionRecord {
    pub tone_match: ToneMatch,
    pub processing_time_ms: f64,
    pub timestamp_ms: u64,
}

/// Snapshot returned for stats queries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub user_id: Option<String>,
    pub tonic_frequency: f64,
    pub state: SessionState,
    pub stats: SessionStats,
    pub raga_context: Option<String>,
    pub detection_active: bool,
    /// Time since the session was opened
    pub age_ms: u64,
    /// Bounded detection history, oldest first
    pub recent_detections: Vec<DetectionRecord>,
}

pub struct Session {
    id: SessionId,
    user_id: Option<String>,
    tonic_frequency: f64,
    history: VecDeque<DetectionRecord>,
    history_capacity: usize,
    raga: RagaContextTracker,
    rate_limiter: ChunkRateLimiter,
    stats: SessionStats,
    totals: DetectionTotals,
    state: SessionState,
    created_at: Instant,
    last_activity: Instant,
    detection_active: bool,
    detection_started_at: Instant,
    in_flight: bool,
    estimator: Arc<dyn PitchSource>,
}

impl Session {
    pub fn new(
        id: SessionId,
        user_id: Option<String>,
        config: &AppConfig,
        estimator: Arc<dyn PitchSource>,
        now: Instant,
    ) -> Self {
        Self {
            id,
            user_id,
            tonic_frequency: config.matcher.default_tonic_hz,
            history: VecDeque::with_capacity(config.session.history_capacity),
            history_capacity: config.session.history_capacity.max(1),
            raga: RagaContextTracker::new(config.raga.clone()),
            rate_limiter: ChunkRateLimiter::new(config.ingestion.min_chunk_interval()),
            stats: SessionStats::default(),
            totals: DetectionTotals::default(),
            state: SessionState::Created,
            created_at: now,
            last_activity: now,
            detection_active: false,
            detection_started_at: now,
            in_flight: false,
            estimator,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn set_user_id(&mut self, user_id: Option<String>) {
        self.user_id = user_id;
    }

    pub fn tonic_frequency(&self) -> f64 {
        self.tonic_frequency
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn raga_context(&self) -> Option<&'static str> {
        self.raga.current()
    }

    pub fn detection_active(&self) -> bool {
        self.detection_active
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn estimator(&self) -> Arc<dyn PitchSource> {
        Arc::clone(&self.estimator)
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    /// Set the tonic from a client request
    ///
    /// Requests outside 80-800 Hz are refused; accepted values are clamped
    /// into 100-500 Hz.
    pub fn set_tonic(&mut self, requested_hz: f64) -> Result<f64, PipelineError> {
        let (lo, hi) = TONIC_REQUEST_RANGE;
        if !requested_hz.is_finite() || requested_hz < lo || requested_hz > hi {
            return Err(PipelineError::invalid_input(format!(
                "base frequency must be between {} and {} Hz",
                lo, hi
            )));
        }
        self.tonic_frequency = requested_hz.clamp(TONIC_RANGE.0, TONIC_RANGE.1);
        Ok(self.tonic_frequency)
    }

    /// Admit a validated chunk for dispatch
    ///
    /// Refuses while another chunk of this session is in flight or when the
    /// chunk arrives too soon after the previous accepted one. An admitted
    /// chunk refreshes activity and marks the session in flight until
    /// [`Session::finish_chunk`].
    pub fn admit_chunk(&mut self, now: Instant) -> Result<(), PipelineError> {
        if self.state == SessionState::Expired {
            return Err(PipelineError::SessionNotFound {
                session_id: self.id.to_string(),
            });
        }
        if self.in_flight {
            return Err(PipelineError::RateLimited {
                min_interval_ms: self.rate_limiter.min_interval().as_millis() as u64,
            });
        }
        self.rate_limiter.check(now)?;

        self.in_flight = true;
        self.last_activity = now;
        if matches!(self.state, SessionState::Created | SessionState::Idle) {
            self.state = SessionState::Active;
        }
        Ok(())
    }

    pub fn finish_chunk(&mut self) {
        self.in_flight = false;
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Record a finished estimation and return the match with raga context
    pub fn record_detection(
        &mut self,
        mut tone_match: ToneMatch,
        processing_time_ms: f64,
        timestamp_ms: u64,
    ) -> ToneMatch {
        self.stats.record_latency(processing_time_ms);

        if let Some(tone) = tone_match.tone {
            self.stats.tones_matched += 1;
            self.raga.observe(tone.name);
        }
        tone_match.raga_context = self.raga.current().map(str::to_string);
        self.totals.record(&tone_match);

        if self.history.len() == self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(DetectionRecord {
            tone_match: tone_match.clone(),
            processing_time_ms,
            timestamp_ms,
        });

        tone_match
    }

    /// Record a processed chunk in which no pitch was found
    pub fn record_no_pitch(&mut self, processing_time_ms: f64) {
        self.stats.record_latency(processing_time_ms);
    }

    pub fn record_rejection(&mut self) {
        self.stats.chunks_rejected += 1;
    }

    pub fn record_timeout(&mut self) {
        self.stats.timeouts += 1;
    }

    /// Begin a detection run: statistics, history and raga context start over
    pub fn start_detection(&mut self, now: Instant) {
        self.stats = SessionStats::default();
        self.totals = DetectionTotals::default();
        self.history.clear();
        self.raga.reset();
        self.rate_limiter.reset();
        self.detection_active = true;
        self.detection_started_at = now;
        self.last_activity = now;
    }

    /// End the current detection run
    pub fn stop_detection(&mut self, now: Instant) -> SessionSummary {
        let summary = self.summary(now);
        self.detection_active = false;
        self.last_activity = now;
        summary
    }

    pub fn summary(&self, now: Instant) -> SessionSummary {
        SessionSummary {
            session_id: self.id.to_string(),
            chunks_processed: self.stats.chunks_processed,
            tones_matched: self.stats.tones_matched,
            average_confidence: self.totals.average_confidence(),
            mean_abs_cent_deviation: self.totals.mean_abs_deviation(),
            most_frequent_tone: self.totals.most_frequent_tone().map(str::to_string),
            raga_context: self.raga.current().map(str::to_string),
            duration_ms: now
                .saturating_duration_since(self.detection_started_at)
                .as_millis() as u64,
        }
    }

    pub fn snapshot(&self, now: Instant) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.to_string(),
            user_id: self.user_id.clone(),
            tonic_frequency: self.tonic_frequency,
            state: self.state,
            stats: self.stats.clone(),
            raga_context: self.raga.current().map(str::to_string),
            detection_active: self.detection_active,
            age_ms: now.saturating_duration_since(self.created_at).as_millis() as u64,
            recent_detections: self.history.iter().cloned().collect(),
        }
    }

    /// Mark the session as gone; later chunks are refused
    pub fn expire(&mut self) {
        self.state = SessionState::Expired;
        self.in_flight = false;
    }

    /// Age the session for the sweeper
    ///
    /// Returns the state after the transition. `Expired` sessions are
    /// removed by the caller.
    pub fn age(&mut self, now: Instant, idle_after: Duration, timeout: Duration) -> SessionState {
        let idle = self.idle_for(now);
        if idle > timeout {
            self.state = SessionState::Expired;
        } else if idle > idle_after && self.state == SessionState::Active {
            self.state = SessionState::Idle;
        }
        self.state
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("tonic_frequency", &self.tonic_frequency)
            .field("state", &self.state)
            .field("history_len", &self.history.len())
            .field("in_flight", &self.in_flight)
            .finish()
    }
}
