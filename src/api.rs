// Wire protocol for the WebSocket transport
//
// Client and server frames are JSON objects tagged by `type`. The engine
// consumes `ClientEvent`s and produces `ServerEvent`s; the transport only
// converts between these enums and text frames.

mod types;

pub use types::{AudioPayload, ClientEvent, EngineHealth, ServerEvent, ToneDetected};

/// Decode one client text frame
pub fn parse_client_event(text: &str) -> Result<ClientEvent, serde_json::Error> {
    serde_json::from_str(text)
}

/// Encode one server event as a text frame
pub fn encode_server_event(event: &ServerEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}
