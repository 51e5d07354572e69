// SessionRegistry: owner of all live sessions
// Single Responsibility: session map lifecycle (create, lookup, remove, sweep)

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Instant;

use serde::Serialize;
use uuid::Uuid;

use crate::analysis::PitchSource;
use crate::config::AppConfig;
use crate::engine::time::TimeSource;
use crate::error::PipelineError;
use crate::session::{Session, SessionId, SessionState};

/// Session handle shared between the registry and its caller
pub type SharedSession = Arc<Mutex<Session>>;

/// Builds the estimator each new session analyses its chunks with
pub type EstimatorFactory = Arc<dyn Fn() -> Arc<dyn PitchSource> + Send + Sync>;

/// Lock a session, recovering the guard if a previous holder panicked
///
/// Session methods never leave partially updated state behind, so the data
/// behind a poisoned lock is still consistent.
pub fn lock_session(session: &SharedSession) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry-level counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryHealth {
    pub active_sessions: usize,
    pub total_created: u64,
    pub total_expired: u64,
}

/// Outcome of one sweep pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub idled: Vec<SessionId>,
    pub expired: Vec<SessionId>,
}

/// Thread-safe registry of sessions
///
/// The map lock is held only for map operations and the brief per-session
/// aging done by the sweeper; nothing holds it across estimation.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SharedSession>>,
    config: AppConfig,
    time: Arc<dyn TimeSource>,
    estimator_factory: EstimatorFactory,
    total_created: AtomicU64,
    total_expired: AtomicU64,
}

impl SessionRegistry {
    pub fn new(
        config: AppConfig,
        time: Arc<dyn TimeSource>,
        estimator_factory: EstimatorFactory,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
            time,
            estimator_factory,
            total_created: AtomicU64::new(0),
            total_expired: AtomicU64::new(0),
        }
    }

    pub fn now(&self) -> Instant {
        self.time.now()
    }

    /// Create and register a session in the `Created` state
    pub fn create(&self, user_id: Option<String>) -> (SessionId, SharedSession) {
        let id = Uuid::new_v4();
        let session = Session::new(
            id,
            user_id,
            &self.config,
            (self.estimator_factory)(),
            self.time.now(),
        );
        let shared = Arc::new(Mutex::new(session));

        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::clone(&shared));
        self.total_created.fetch_add(1, Ordering::Relaxed);

        tracing::info!(session_id = %id, "session created");
        (id, shared)
    }

    pub fn get(&self, id: &SessionId) -> Result<SharedSession, PipelineError> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| PipelineError::SessionNotFound {
                session_id: id.to_string(),
            })
    }

    /// Remove a session immediately
    ///
    /// # Returns
    /// `true` if the session was registered
    pub fn remove(&self, id: &SessionId) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);

        if let Some(session) = &removed {
            lock_session(session).expire();
            tracing::info!(session_id = %id, "session removed");
        }
        removed.is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    /// Age every session; remove the expired ones
    ///
    /// Sessions inactive past the idle threshold become `Idle`, past the
    /// session timeout `Expired` and are dropped from the map.
    pub fn sweep(&self) -> SweepReport {
        let now = self.time.now();
        let idle_after = self.config.session.idle_after();
        let timeout = self.config.session.session_timeout();
        let mut report = SweepReport::default();

        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        sessions.retain(|id, session| {
            let mut session = lock_session(session);
            let before = session.state();
            match session.age(now, idle_after, timeout) {
                SessionState::Expired => {
                    report.expired.push(*id);
                    false
                }
                SessionState::Idle if before != SessionState::Idle => {
                    report.idled.push(*id);
                    true
                }
                _ => true,
            }
        });
        drop(sessions);

        self.total_expired
            .fetch_add(report.expired.len() as u64, Ordering::Relaxed);

        if !report.expired.is_empty() || !report.idled.is_empty() {
            tracing::info!(
                expired = report.expired.len(),
                idled = report.idled.len(),
                "session sweep"
            );
        }
        report
    }

    pub fn health(&self) -> RegistryHealth {
        RegistryHealth {
            active_sessions: self.len(),
            total_created: self.total_created.load(Ordering::Relaxed),
            total_expired: self.total_expired.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::PitchEstimate;
    use crate::engine::time::ManualTimeSource;
    use std::time::Duration;

    struct NullSource;

    impl PitchSource for NullSource {
        fn estimate(&self, _chunk: &[f32], _sample_rate: u32) -> Option<PitchEstimate> {
            None
        }
    }

    fn registry() -> (SessionRegistry, Arc<ManualTimeSource>) {
        let clock = Arc::new(ManualTimeSource::new());
        let factory: EstimatorFactory = Arc::new(|| Arc::new(NullSource) as Arc<dyn PitchSource>);
        let registry = SessionRegistry::new(AppConfig::default(), clock.clone(), factory);
        (registry, clock)
    }

    #[test]
    fn test_create_get_remove() {
        let (registry, _) = registry();
        let (id, _session) = registry.create(Some("alice".to_string()));

        let fetched = registry.get(&id).expect("registered");
        assert_eq!(lock_session(&fetched).user_id(), Some("alice"));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(&id));
        assert!(!registry.remove(&id));
        assert_eq!(
            registry.get(&id).unwrap_err().signal(),
            "SESSION_NOT_FOUND"
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_removed_session_refuses_chunks() {
        let (registry, clock) = registry();
        let (id, session) = registry.create(None);
        registry.remove(&id);

        clock.advance(Duration::from_secs(1));
        let err = lock_session(&session).admit_chunk(clock.now()).unwrap_err();
        assert_eq!(err.signal(), "SESSION_NOT_FOUND");
    }

    #[test]
    fn test_sessions_get_distinct_estimators() {
        let (registry, _) = registry();
        let (_, a) = registry.create(None);
        let (_, b) = registry.create(None);
        let ea = lock_session(&a).estimator();
        let eb = lock_session(&b).estimator();
        assert!(!Arc::ptr_eq(&ea, &eb));
    }

    #[test]
    fn test_sweep_idles_then_expires() {
        let (registry, clock) = registry();
        let (id, session) = registry.create(None);
        assert!(lock_session(&session).admit_chunk(clock.now()).is_ok());
        lock_session(&session).finish_chunk();

        clock.advance(Duration::from_secs(30));
        assert_eq!(registry.sweep(), SweepReport::default());

        clock.advance(Duration::from_secs(31));
        let report = registry.sweep();
        assert_eq!(report.idled, vec![id]);
        assert_eq!(lock_session(&session).state(), SessionState::Idle);

        // Already idle: not reported again
        clock.advance(Duration::from_secs(60));
        assert!(registry.sweep().idled.is_empty());

        clock.advance(Duration::from_secs(1800));
        let report = registry.sweep();
        assert_eq!(report.expired, vec![id]);
        assert!(registry.get(&id).is_err());
        assert_eq!(registry.health().total_expired, 1);
    }

    #[test]
    fn test_health_counters() {
        let (registry, _) = registry();
        let (a, _) = registry.create(None);
        registry.create(None);
        registry.remove(&a);

        let health = registry.health();
        assert_eq!(health.active_sessions, 1);
        assert_eq!(health.total_created, 2);
        assert_eq!(health.total_expired, 0);
    }
}
