//! Runtime telemetry collector and helpers.
//!
//! The collector multiplexes chunk latency, rejections, worker queue
//! occupancy and session lifecycle events into a bounded history plus an
//! async broadcast stream.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;

use crate::analysis::now_ms;
use crate::error::{ErrorCode, PipelineError};

pub mod events;

pub use events::{LifecyclePhase, MetricEvent};

/// Snapshot of collector state for HTTP/CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
    pub chunks_processed: u64,
    /// Rejection counts keyed by wire signal
    pub rejections: BTreeMap<String, u64>,
}

/// Broadcast-based collector retaining a bounded history of metrics.
pub struct TelemetryCollector {
    tx: broadcast::Sender<MetricEvent>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity: history_capacity.max(1),
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.tx.subscribe()
    }

    fn recent(&self) -> Vec<MetricEvent> {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        history.iter().cloned().collect()
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

/// Latency tracker maintains a rolling window to compute avg/max latency.
struct LatencyTracker {
    samples: VecDeque<f32>,
    max_samples: usize,
}

impl LatencyTracker {
    fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
        }
    }

    fn observe(&mut self, value: f32) -> (f32, f32, usize) {
        if self.samples.len() == self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(value.abs());

        let count = self.samples.len();
        let sum: f32 = self.samples.iter().copied().sum();
        let max = self
            .samples
            .iter()
            .copied()
            .fold(0.0_f32, |acc, next| acc.max(next));
        let avg = if count == 0 { 0.0 } else { sum / count as f32 };
        (avg, max, count)
    }
}

/// Top-level hub wrapping collector state plus derived gauges.
pub struct TelemetryHub {
    collector: TelemetryCollector,
    latency: Mutex<LatencyTracker>,
    last_queue_percent: Mutex<Option<f32>>,
    chunks_processed: AtomicU64,
    rejections: Mutex<BTreeMap<String, u64>>,
}

impl TelemetryHub {
    pub fn new(channel_capacity: usize, history_capacity: usize, latency_window: usize) -> Self {
        Self {
            collector: TelemetryCollector::new(channel_capacity, history_capacity),
            latency: Mutex::new(LatencyTracker::new(latency_window)),
            last_queue_percent: Mutex::new(None),
            chunks_processed: AtomicU64::new(0),
            rejections: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.collector.subscribe()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            recent: self.collector.recent(),
            total_events: self.collector.total_events.load(Ordering::Relaxed),
            dropped_events: self.collector.dropped_history.load(Ordering::Relaxed),
            chunks_processed: self.chunks_processed.load(Ordering::Relaxed),
            rejections: self
                .rejections
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }

    /// Record a chunk that finished estimation within its deadline
    pub fn record_chunk(&self, session_id: &str, processing_ms: f64, matched: bool) {
        self.chunks_processed.fetch_add(1, Ordering::Relaxed);
        self.collector.publish(MetricEvent::ChunkProcessed {
            session_id: session_id.to_string(),
            processing_ms: processing_ms as f32,
            matched,
        });

        let (avg, max, count) = {
            let mut tracker = self.latency.lock().unwrap_or_else(PoisonError::into_inner);
            tracker.observe(processing_ms as f32)
        };

        self.collector.publish(MetricEvent::Latency {
            avg_ms: avg,
            max_ms: max,
            sample_count: count,
        });
    }

    pub fn record_rejection(&self, err: &PipelineError, session_id: Option<&str>) {
        *self
            .rejections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(err.signal().to_string())
            .or_insert(0) += 1;

        self.collector.publish(MetricEvent::Rejection {
            code: err.code(),
            signal: err.signal().to_string(),
            session_id: session_id.map(str::to_string),
        });
    }

    /// Worker queue depth; small changes are not re-emitted
    pub fn record_queue_occupancy(&self, queued: usize, capacity: usize) {
        let percent = if capacity == 0 {
            0.0
        } else {
            (queued as f32 / capacity as f32 * 100.0).clamp(0.0, 100.0)
        };
        let mut last = self
            .last_queue_percent
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let should_emit = last.map(|prev| (prev - percent).abs() >= 2.5).unwrap_or(true);
        if should_emit {
            *last = Some(percent);
            self.collector
                .publish(MetricEvent::QueueOccupancy { queued, percent });
        }
    }

    pub fn record_session(&self, session_id: &str, phase: LifecyclePhase) {
        self.collector.publish(MetricEvent::Session {
            session_id: session_id.to_string(),
            phase,
            timestamp_ms: now_ms(),
        });
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(256, 64, 32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_preserves_order_within_history() {
        let collector = TelemetryCollector::new(8, 3);
        collector.publish(MetricEvent::Latency {
            avg_ms: 1.0,
            max_ms: 2.0,
            sample_count: 1,
        });
        collector.publish(MetricEvent::Latency {
            avg_ms: 3.0,
            max_ms: 4.0,
            sample_count: 2,
        });
        collector.publish(MetricEvent::QueueOccupancy {
            queued: 4,
            percent: 50.0,
        });

        let recent = collector.recent();
        assert_eq!(recent.len(), 3);
        assert!(
            matches!(recent[0], MetricEvent::Latency { avg_ms, .. } if (avg_ms - 1.0).abs() < f32::EPSILON)
        );
        assert!(matches!(recent[2], MetricEvent::QueueOccupancy { .. }));
    }

    #[test]
    fn collector_drops_history_when_full() {
        let hub = TelemetryHub::new(8, 2, 4);
        hub.record_chunk("a", 1.0, true);
        hub.record_chunk("a", 3.0, false);

        let snapshot = hub.snapshot();
        assert_eq!(snapshot.recent.len(), 2);
        assert_eq!(snapshot.total_events, 4);
        assert_eq!(snapshot.dropped_events, 2);
        assert_eq!(snapshot.chunks_processed, 2);
        assert!(
            matches!(snapshot.recent[1], MetricEvent::Latency { avg_ms, sample_count: 2, .. } if (avg_ms - 2.0).abs() < f32::EPSILON)
        );
    }

    #[test]
    fn rejections_are_counted_by_signal() {
        let hub = TelemetryHub::new(8, 8, 4);
        hub.record_rejection(&PipelineError::RateLimited { min_interval_ms: 20 }, Some("s"));
        hub.record_rejection(&PipelineError::RateLimited { min_interval_ms: 20 }, Some("s"));
        hub.record_rejection(&PipelineError::invalid_input("nan"), None);

        let snapshot = hub.snapshot();
        assert_eq!(snapshot.rejections.get("RATE_LIMITED"), Some(&2));
        assert_eq!(snapshot.rejections.get("INVALID_INPUT"), Some(&1));
        assert!(snapshot.recent.iter().any(|event| matches!(
            event,
            MetricEvent::Rejection { code: 3002, .. }
        )));
    }

    #[test]
    fn queue_gauge_debounces_small_changes() {
        let hub = TelemetryHub::new(8, 8, 4);
        hub.record_queue_occupancy(10, 100);
        hub.record_queue_occupancy(11, 100);
        hub.record_queue_occupancy(25, 100);

        let gauges = hub
            .snapshot()
            .recent
            .iter()
            .filter(|event| matches!(event, MetricEvent::QueueOccupancy { .. }))
            .count();
        assert_eq!(gauges, 2);
    }

    #[tokio::test]
    async fn subscribers_receive_session_events() {
        let hub = TelemetryHub::default();
        let mut rx = hub.subscribe();
        hub.record_session("abc", LifecyclePhase::Opened);

        match rx.recv().await {
            Ok(MetricEvent::Session { session_id, phase, .. }) => {
                assert_eq!(session_id, "abc");
                assert_eq!(phase, LifecyclePhase::Opened);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
