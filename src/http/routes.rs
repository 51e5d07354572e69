use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use crate::api::EngineHealth;
use crate::engine::core::EngineHandle;
use crate::telemetry::TelemetrySnapshot;

use super::ws;

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<EngineHandle>,
}

impl AppState {
    pub fn new(engine: Arc<EngineHandle>) -> Self {
        Self { engine }
    }
}

/// HTTP error variants mapped to JSON responses.
#[derive(Debug)]
pub enum HttpServerError {
    BadRequest(String),
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Health endpoint response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub engine: EngineHealth,
}

/// Build the Axum router with all handlers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws::upgrade))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/metrics/stream", get(ws::metrics_upgrade))
        .with_state(state)
}

/// Run the HTTP server loop.
pub async fn run_http_server(engine: Arc<EngineHandle>, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding listener on {}", addr))?;
    tracing::info!(%addr, "shruti server listening");

    let router = build_router(AppState::new(engine));
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP router")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        engine: state.engine.health(),
    })
}

pub async fn metrics(State(state): State<AppState>) -> Json<TelemetrySnapshot> {
    Json(state.engine.telemetry().snapshot())
}
