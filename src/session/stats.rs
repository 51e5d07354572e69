// Session statistics and end-of-detection summary

use std::collections::HashMap;

use serde::Serialize;

use crate::shruti::{ToneMatch, SHRUTI_TABLE};

/// Running per-session counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionStats {
    /// Chunks that reached the estimator and finished in time
    pub chunks_processed: u64,
    /// Running mean of processing time over processed chunks
    pub avg_latency_ms: f64,
    pub max_latency_ms: f64,
    /// Chunks refused before dispatch (validation or rate limit)
    pub chunks_rejected: u64,
    pub timeouts: u64,
    pub tones_matched: u64,
}

impl SessionStats {
    pub fn record_latency(&mut self, latency_ms: f64) {
        self.chunks_processed += 1;
        self.avg_latency_ms += (latency_ms - self.avg_latency_ms) / self.chunks_processed as f64;
        self.max_latency_ms = self.max_latency_ms.max(latency_ms);
    }
}

/// Totals reported when detection stops
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub chunks_processed: u64,
    pub tones_matched: u64,
    pub average_confidence: f64,
    /// Mean |cent deviation| over matched tones
    pub mean_abs_cent_deviation: f64,
    pub most_frequent_tone: Option<String>,
    pub raga_context: Option<String>,
    pub duration_ms: u64,
}

/// Accumulators behind [`SessionSummary`]
///
/// History is bounded, so totals are accumulated as detections arrive.
#[derive(Debug, Clone, Default)]
pub(crate) struct DetectionTotals {
    detections: u64,
    confidence_sum: f64,
    matched: u64,
    abs_deviation_sum: f64,
    tone_counts: HashMap<&'static str, u64>,
}

impl DetectionTotals {
    pub(crate) fn record(&mut self, tone_match: &ToneMatch) {
        self.detections += 1;
        self.confidence_sum += tone_match.confidence;

        if let Some(tone) = tone_match.tone {
            self.matched += 1;
            self.abs_deviation_sum += tone_match.cent_deviation.abs();
            *self.tone_counts.entry(tone.name).or_insert(0) += 1;
        }
    }

    pub(crate) fn average_confidence(&self) -> f64 {
        if self.detections == 0 {
            0.0
        } else {
            self.confidence_sum / self.detections as f64
        }
    }

    pub(crate) fn mean_abs_deviation(&self) -> f64 {
        if self.matched == 0 {
            0.0
        } else {
            self.abs_deviation_sum / self.matched as f64
        }
    }

    /// Most often matched tone; the lower table entry wins equal counts
    pub(crate) fn most_frequent_tone(&self) -> Option<&'static str> {
        let mut best: Option<(&'static str, u64)> = None;
        for entry in SHRUTI_TABLE.iter() {
            let count = self.tone_counts.get(entry.name).copied().unwrap_or(0);
            if count > 0 && best.map_or(true, |(_, c)| count > c) {
                best = Some((entry.name, count));
            }
        }
        best.map(|(name, _)| name)
    }
}
