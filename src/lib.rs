// Shruti Trainer Core - real-time pitch analysis service
// Pitch estimation, 22-shruti matching and raga context behind a shared
// multi-session engine

// Module declarations
pub mod analysis;
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod managers;
pub mod raga;
pub mod session;
pub mod shruti;
pub mod telemetry;

// Re-exports for convenience
pub use api::{ClientEvent, ServerEvent};
pub use config::AppConfig;
pub use engine::EngineHandle;
pub use error::PipelineError;
