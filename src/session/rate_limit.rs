// Per-session chunk spacing gate

use std::time::{Duration, Instant};

use crate::error::PipelineError;

/// Rejects chunks that arrive closer together than `min_interval`
///
/// Only accepted chunks move the reference point; a rejected chunk does not
/// push the next allowed arrival further out.
#[derive(Debug, Clone)]
pub struct ChunkRateLimiter {
    min_interval: Duration,
    last_accepted: Option<Instant>,
}

impl ChunkRateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_accepted: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Check a chunk arriving at `now`, recording it when allowed
    pub fn check(&mut self, now: Instant) -> Result<(), PipelineError> {
        if let Some(last) = self.last_accepted {
            if now.saturating_duration_since(last) < self.min_interval {
                return Err(PipelineError::RateLimited {
                    min_interval_ms: self.min_interval.as_millis() as u64,
                });
            }
        }
        self.last_accepted = Some(now);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.last_accepted = None;
    }
}
