//! WebSocket endpoint: one engine session per connection.
//!
//! Frames from a connection are handled one at a time in arrival order;
//! replies go out through a per-connection channel drained by a writer task.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};

use crate::api::{encode_server_event, parse_client_event, ServerEvent};
use crate::engine::core::EngineHandle;
use crate::error::PipelineError;
use crate::telemetry::MetricEvent;

use super::routes::{AppState, HttpServerError};

const MAX_USER_ID_LEN: usize = 128;

#[derive(Debug, Default, Deserialize)]
pub struct ConnectQuery {
    pub user_id: Option<String>,
}

pub async fn upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<ConnectQuery>,
) -> Result<Response, HttpServerError> {
    if let Some(user_id) = &query.user_id {
        if user_id.len() > MAX_USER_ID_LEN {
            return Err(HttpServerError::BadRequest(format!(
                "user_id longer than {} bytes",
                MAX_USER_ID_LEN
            )));
        }
    }

    let engine = Arc::clone(&state.engine);
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, engine, query.user_id)))
}

async fn handle_socket(socket: WebSocket, engine: Arc<EngineHandle>, user_id: Option<String>) {
    let (session_id, connected) = engine.connect(user_id);
    tracing::info!(session_id = %session_id, "websocket connected");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    // Cannot fail while `rx` is still held here
    let _ = tx.send(connected);

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match encode_server_event(&event) {
                Ok(json) => json,
                Err(err) => {
                    tracing::error!(error = %err, "failed to encode server event");
                    continue;
                }
            };

            if let Err(err) = sender.send(Message::Text(json)).await {
                tracing::warn!(session_id = %session_id, error = %err, "websocket send failed");
                break;
            }
        }
    });

    let recv_engine = Arc::clone(&engine);
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let reply = match parse_client_event(&text) {
                        Ok(event) => match recv_engine.handle_event(&session_id, event).await {
                            Some(reply) => reply,
                            None => break,
                        },
                        Err(err) => {
                            let err = PipelineError::invalid_input(format!("malformed frame: {}", err));
                            recv_engine
                                .telemetry()
                                .record_rejection(&err, Some(&session_id.to_string()));
                            ServerEvent::from_error(&err)
                        }
                    };

                    if tx.send(reply).is_err() {
                        break;
                    }
                }
                Ok(Message::Binary(_)) => {
                    tracing::warn!(session_id = %session_id, "binary frame ignored");
                }
                Ok(Message::Close(_)) => {
                    tracing::debug!(session_id = %session_id, "closed by client");
                    break;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Err(err) => {
                    tracing::warn!(session_id = %session_id, error = %err, "websocket receive failed");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => {
            // Let queued replies flush; the channel closes with the reader
            let _ = send_task.await;
        }
    }

    engine.disconnect(&session_id);
    tracing::info!(session_id = %session_id, "websocket closed");
}

/// Live telemetry feed: every `MetricEvent` published after the upgrade is
/// forwarded as one JSON text frame. Client frames other than close are ignored.
pub async fn metrics_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let events = state.engine.telemetry().subscribe();
    ws.on_upgrade(move |socket| stream_metrics(socket, events))
}

async fn stream_metrics(socket: WebSocket, mut events: broadcast::Receiver<MetricEvent>) {
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(err) => {
                            tracing::error!(error = %err, "failed to encode metric event");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "metrics stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
            frame = receiver.next() => match frame {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    tracing::debug!("metrics stream closed");
}
