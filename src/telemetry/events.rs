//! Telemetry event types exposed through the `/metrics` endpoint.

use serde::{Deserialize, Serialize};

/// Session lifecycle stages reported by the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Opened,
    Idle,
    Expired,
    Closed,
}

/// Metric events covering chunk latency, rejections, queue depth and
/// session lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    Latency {
        avg_ms: f32,
        max_ms: f32,
        sample_count: usize,
    },
    ChunkProcessed {
        session_id: String,
        processing_ms: f32,
        matched: bool,
    },
    Rejection {
        code: i32,
        signal: String,
        session_id: Option<String>,
    },
    QueueOccupancy {
        queued: usize,
        percent: f32,
    },
    Session {
        session_id: String,
        phase: LifecyclePhase,
        timestamp_ms: u64,
    },
}
