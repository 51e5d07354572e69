//! HTTP transport for the shared engine.
//!
//! One Axum router serves the `/ws` WebSocket endpoint that carries the
//! JSON wire protocol, plus `/health` and `/metrics` JSON endpoints and a
//! `/metrics/stream` WebSocket feed of telemetry events for operators.

mod routes;
mod ws;

pub use routes::{build_router, run_http_server, AppState, HealthResponse, HttpServerError};
