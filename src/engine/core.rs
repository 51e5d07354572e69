//! EngineHandle: the shared analysis service behind every connection.
//!
//! Owns the session registry, the worker pool, telemetry and the ingestion
//! pipeline. Transports call [`EngineHandle::connect`] once per connection
//! and then feed every decoded client frame to
//! [`EngineHandle::handle_event`].

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;

use crate::analysis::{PitchEstimator, PitchSource};
use crate::api::{AudioPayload, ClientEvent, EngineHealth, ServerEvent};
use crate::config::AppConfig;
use crate::engine::ingest::IngestionPipeline;
use crate::engine::time::{SystemTimeSource, TimeSource};
use crate::engine::worker_pool::WorkerPool;
use crate::error::{log_pipeline_error, PipelineError};
use crate::managers::session_registry::{
    lock_session, EstimatorFactory, SessionRegistry, SweepReport,
};
use crate::session::SessionId;
use crate::shruti::ShrutiMatcher;
use crate::telemetry::{LifecyclePhase, TelemetryHub};

pub struct EngineHandle {
    config: AppConfig,
    registry: Arc<SessionRegistry>,
    pool: Arc<WorkerPool>,
    telemetry: Arc<TelemetryHub>,
    pipeline: IngestionPipeline,
    started_at: Instant,
}

impl EngineHandle {
    /// Create an engine with the system clock and the default estimator.
    pub fn new(config: AppConfig) -> std::io::Result<Self> {
        let analysis = config.analysis.clone();
        let factory: EstimatorFactory =
            Arc::new(move || Arc::new(PitchEstimator::new(analysis.clone())) as Arc<dyn PitchSource>);
        Self::with_parts(config, Arc::new(SystemTimeSource), factory)
    }

    /// Create an engine with an explicit clock and estimator factory.
    pub fn with_parts(
        config: AppConfig,
        time: Arc<dyn TimeSource>,
        estimator_factory: EstimatorFactory,
    ) -> std::io::Result<Self> {
        let pool = Arc::new(WorkerPool::new(
            config.ingestion.worker_threads,
            config.ingestion.queue_capacity,
        )?);
        let registry = Arc::new(SessionRegistry::new(
            config.clone(),
            time,
            estimator_factory,
        ));
        let telemetry = Arc::new(TelemetryHub::default());
        let pipeline = IngestionPipeline::new(
            Arc::clone(&registry),
            Arc::clone(&pool),
            Arc::clone(&telemetry),
            ShrutiMatcher::from_config(&config.matcher),
            config.ingestion.clone(),
            &config.analysis,
        );

        tracing::info!(
            worker_threads = pool.worker_threads(),
            deadline_ms = config.ingestion.processing_deadline_ms,
            "engine ready"
        );

        Ok(Self {
            config,
            registry,
            pool,
            telemetry,
            pipeline,
            started_at: Instant::now(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn telemetry(&self) -> &TelemetryHub {
        &self.telemetry
    }

    /// Open a session for a new connection.
    pub fn connect(&self, user_id: Option<String>) -> (SessionId, ServerEvent) {
        let (id, session) = self.registry.create(user_id);
        let tonic_frequency = lock_session(&session).tonic_frequency();
        self.telemetry
            .record_session(&id.to_string(), LifecyclePhase::Opened);

        (
            id,
            ServerEvent::Connected {
                session_id: id.to_string(),
                tonic_frequency,
            },
        )
    }

    /// Close a session; nothing is emitted for it afterwards.
    pub fn disconnect(&self, session_id: &SessionId) -> bool {
        let removed = self.registry.remove(session_id);
        if removed {
            self.telemetry
                .record_session(&session_id.to_string(), LifecyclePhase::Closed);
        }
        removed
    }

    /// Handle one client frame for a session.
    ///
    /// # Returns
    /// The event to send back, or `None` after a disconnect.
    pub async fn handle_event(
        &self,
        session_id: &SessionId,
        event: ClientEvent,
    ) -> Option<ServerEvent> {
        let result = match event {
            ClientEvent::Disconnect => {
                self.disconnect(session_id);
                return None;
            }
            ClientEvent::AudioChunk {
                audio_data,
                sample_rate,
            } => self.process_chunk(session_id, &audio_data, sample_rate).await,
            ClientEvent::Connect { user_id } => self.rekey(session_id, user_id),
            ClientEvent::SetBaseFrequency { frequency } => {
                self.set_base_frequency(session_id, frequency)
            }
            ClientEvent::StartDetection => self.start_detection(session_id),
            ClientEvent::StopDetection => self.stop_detection(session_id),
            ClientEvent::GetSessionStats => self.session_stats(session_id),
        };

        Some(result.unwrap_or_else(|err| {
            log_pipeline_error(&err, "handle_event");
            self.telemetry
                .record_rejection(&err, Some(&session_id.to_string()));
            ServerEvent::from_error(&err)
        }))
    }

    pub async fn process_chunk(
        &self,
        session_id: &SessionId,
        payload: &AudioPayload,
        sample_rate: Option<u32>,
    ) -> Result<ServerEvent, PipelineError> {
        self.pipeline
            .process_chunk(session_id, payload, sample_rate)
            .await
    }

    fn rekey(
        &self,
        session_id: &SessionId,
        user_id: Option<String>,
    ) -> Result<ServerEvent, PipelineError> {
        let session = self.registry.get(session_id)?;
        let mut session = lock_session(&session);
        if user_id.is_some() {
            session.set_user_id(user_id);
        }
        Ok(ServerEvent::Connected {
            session_id: session_id.to_string(),
            tonic_frequency: session.tonic_frequency(),
        })
    }

    pub fn set_base_frequency(
        &self,
        session_id: &SessionId,
        frequency: f64,
    ) -> Result<ServerEvent, PipelineError> {
        let session = self.registry.get(session_id)?;
        let frequency = lock_session(&session).set_tonic(frequency)?;
        tracing::debug!(session_id = %session_id, frequency, "tonic set");
        Ok(ServerEvent::BaseFrequencySet { frequency })
    }

    pub fn start_detection(&self, session_id: &SessionId) -> Result<ServerEvent, PipelineError> {
        let session = self.registry.get(session_id)?;
        let mut session = lock_session(&session);
        session.start_detection(self.registry.now());
        Ok(ServerEvent::DetectionStarted {
            session_id: session_id.to_string(),
            tonic_frequency: session.tonic_frequency(),
        })
    }

    pub fn stop_detection(&self, session_id: &SessionId) -> Result<ServerEvent, PipelineError> {
        let session = self.registry.get(session_id)?;
        let session_summary = lock_session(&session).stop_detection(self.registry.now());
        tracing::info!(
            session_id = %session_id,
            chunks = session_summary.chunks_processed,
            matched = session_summary.tones_matched,
            "detection stopped"
        );
        Ok(ServerEvent::DetectionStopped { session_summary })
    }

    pub fn session_stats(&self, session_id: &SessionId) -> Result<ServerEvent, PipelineError> {
        let session = self.registry.get(session_id)?;
        let snapshot = lock_session(&session).snapshot(self.registry.now());
        Ok(ServerEvent::SessionStats {
            stats: snapshot.stats,
            state: snapshot.state,
            raga_context: snapshot.raga_context,
            age_ms: snapshot.age_ms,
            recent_detections: snapshot.recent_detections,
            health: self.health(),
        })
    }

    pub fn health(&self) -> EngineHealth {
        let registry = self.registry.health();
        EngineHealth {
            active_sessions: registry.active_sessions,
            total_created: registry.total_created,
            total_expired: registry.total_expired,
            worker_threads: self.pool.worker_threads(),
            queued_jobs: self.pool.queued_jobs(),
            uptime_ms: self.started_at.elapsed().as_millis() as u64,
        }
    }

    /// Run one sweep pass and report transitions to telemetry.
    pub fn sweep(&self) -> SweepReport {
        let report = self.registry.sweep();
        for id in &report.idled {
            self.telemetry
                .record_session(&id.to_string(), LifecyclePhase::Idle);
        }
        for id in &report.expired {
            self.telemetry
                .record_session(&id.to_string(), LifecyclePhase::Expired);
        }
        report
    }

    /// Sweep on the configured cleanup interval until the engine is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::downgrade(self);
        let period = self.config.session.cleanup_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match engine.upgrade() {
                    Some(engine) => {
                        engine.sweep();
                    }
                    None => break,
                }
            }
        })
    }
}
