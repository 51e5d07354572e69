//! Session lifecycle across the registry sweep, driven by a manual clock

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shruti_trainer::analysis::{PitchEstimate, PitchSource};
use shruti_trainer::api::{AudioPayload, ClientEvent, ServerEvent};
use shruti_trainer::config::AppConfig;
use shruti_trainer::engine::{EngineHandle, ManualTimeSource};
use shruti_trainer::managers::session_registry::lock_session;
use shruti_trainer::managers::EstimatorFactory;
use shruti_trainer::session::SessionState;
use shruti_trainer::telemetry::{LifecyclePhase, MetricEvent};

const TONIC: f64 = 261.63;

/// Estimator replaying a scripted list of fundamentals, then a fixed one
struct ScriptedSource {
    script: Mutex<VecDeque<f64>>,
    fallback: f64,
}

impl ScriptedSource {
    fn new(script: &[f64], fallback: f64) -> Self {
        Self {
            script: Mutex::new(script.iter().copied().collect()),
            fallback,
        }
    }
}

impl PitchSource for ScriptedSource {
    fn estimate(&self, _chunk: &[f32], _sample_rate: u32) -> Option<PitchEstimate> {
        let frequency_hz = self
            .script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or(self.fallback);
        Some(PitchEstimate {
            frequency_hz,
            confidence: 0.9,
            magnitude: 0.3,
            harmonics: vec![(frequency_hz, 1.0)],
            spectral_centroid: frequency_hz,
            zero_crossing_rate: 0.02,
            estimators: Default::default(),
            timestamp_ms: 0,
        })
    }
}

fn engine_with_script(script: Vec<f64>) -> (EngineHandle, Arc<ManualTimeSource>) {
    let mut config = AppConfig::default();
    config.ingestion.worker_threads = 2;
    config.ingestion.processing_deadline_ms = 1000;
    let factory: EstimatorFactory = Arc::new(move || {
        Arc::new(ScriptedSource::new(&script, TONIC * 1.5)) as Arc<dyn PitchSource>
    });
    let clock = Arc::new(ManualTimeSource::new());
    let engine = EngineHandle::with_parts(config, clock.clone(), factory).expect("engine starts");
    (engine, clock)
}

fn chunk() -> ClientEvent {
    ClientEvent::AudioChunk {
        audio_data: AudioPayload::Samples(vec![0.25; 2048]),
        sample_rate: Some(44100),
    }
}

fn state_of(engine: &EngineHandle, id: &uuid::Uuid) -> SessionState {
    let session = engine.registry().get(id).expect("session alive");
    let state = lock_session(&session).state();
    state
}

#[tokio::test]
async fn test_active_session_idles_then_expires() {
    let (engine, clock) = engine_with_script(Vec::new());
    let (id, _) = engine.connect(Some("learner".to_string()));
    assert_eq!(state_of(&engine, &id), SessionState::Created);

    assert!(matches!(
        engine.handle_event(&id, chunk()).await,
        Some(ServerEvent::ToneDetected(_))
    ));
    assert_eq!(state_of(&engine, &id), SessionState::Active);

    clock.advance(Duration::from_secs(61));
    let report = engine.sweep();
    assert_eq!(report.idled, vec![id]);
    assert!(report.expired.is_empty());
    assert_eq!(state_of(&engine, &id), SessionState::Idle);

    // A second sweep does not report the same transition again
    assert!(engine.sweep().idled.is_empty());

    // Activity revives an idle session
    assert!(matches!(
        engine.handle_event(&id, chunk()).await,
        Some(ServerEvent::ToneDetected(_))
    ));
    assert_eq!(state_of(&engine, &id), SessionState::Active);

    clock.advance(Duration::from_secs(1801));
    let report = engine.sweep();
    assert_eq!(report.expired, vec![id]);
    assert!(engine.registry().is_empty());
    assert_eq!(engine.health().total_expired, 1);

    assert!(matches!(
        engine.handle_event(&id, chunk()).await,
        Some(ServerEvent::SessionError { .. })
    ));

    let phases: Vec<LifecyclePhase> = engine
        .telemetry()
        .snapshot()
        .recent
        .into_iter()
        .filter_map(|event| match event {
            MetricEvent::Session { phase, .. } => Some(phase),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            LifecyclePhase::Opened,
            LifecyclePhase::Idle,
            LifecyclePhase::Expired
        ]
    );
}

#[tokio::test]
async fn test_fresh_session_is_not_reported_idle() {
    let (engine, clock) = engine_with_script(Vec::new());
    let (id, _) = engine.connect(None);

    clock.advance(Duration::from_secs(120));
    let report = engine.sweep();
    assert!(report.idled.is_empty());
    assert!(report.expired.is_empty());
    assert_eq!(state_of(&engine, &id), SessionState::Created);
}

#[tokio::test]
async fn test_sweep_only_touches_stale_sessions() {
    let (engine, clock) = engine_with_script(Vec::new());
    let (stale, _) = engine.connect(None);

    clock.advance(Duration::from_secs(1000));
    let (fresh, _) = engine.connect(None);

    clock.advance(Duration::from_secs(900));
    let report = engine.sweep();

    assert_eq!(report.expired, vec![stale]);
    assert_eq!(engine.registry().session_ids(), vec![fresh]);
}

#[tokio::test]
async fn test_raga_context_emerges_from_detections() {
    // Bhupali: Sa Re4 Ga3 Pa Dha3
    let script = vec![
        TONIC,
        TONIC * 9.0 / 8.0,
        TONIC * 5.0 / 4.0,
        TONIC * 3.0 / 2.0,
        TONIC * 5.0 / 3.0,
    ];
    let (engine, clock) = engine_with_script(script);
    let (id, _) = engine.connect(None);

    let mut contexts = Vec::new();
    for _ in 0..5 {
        match engine.handle_event(&id, chunk()).await {
            Some(ServerEvent::ToneDetected(tone)) => contexts.push(tone.raga_context),
            other => panic!("expected tone_detected, got {:?}", other),
        }
        clock.advance(Duration::from_millis(25));
    }

    assert!(contexts[..4].iter().all(Option::is_none));
    assert_eq!(contexts[4].as_deref(), Some("Bhupali"));

    // start_detection clears the inferred context
    engine.handle_event(&id, ClientEvent::StartDetection).await;
    match engine.handle_event(&id, ClientEvent::GetSessionStats).await {
        Some(ServerEvent::SessionStats { raga_context, .. }) => assert!(raga_context.is_none()),
        other => panic!("expected session_stats, got {:?}", other),
    }
}
