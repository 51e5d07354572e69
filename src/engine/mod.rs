//! Engine module housing the shared analysis service.
//!
//! `core` exposes the `EngineHandle` orchestration layer; `ingest` and
//! `validation` implement the per-chunk path; `worker_pool` runs estimation
//! off the async runtime; `time` supplies the injectable clock.

pub mod core;
pub mod ingest;
pub mod time;
pub mod validation;
pub mod worker_pool;

pub use self::core::EngineHandle;
pub use ingest::IngestionPipeline;
pub use time::{ManualTimeSource, SystemTimeSource, TimeSource};
pub use worker_pool::{DispatchError, WorkerPool};
