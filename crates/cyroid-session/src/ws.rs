//! A transport-agnostic WebSocket port (§4.7).
//!
//! The REST/WebSocket HTTP surface itself is an external collaborator
//! (§1's "OUT OF SCOPE... a thin adapter over the core"); this crate
//! consumes whatever upgraded connection that adapter hands it through
//! this trait, so the pump logic stays testable against an in-memory
//! double instead of a live socket.

use async_trait::async_trait;
use cyroid_common::error::Result;

/// One inbound WebSocket frame, already decoded to its payload kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    /// A UTF-8 text frame.
    Text(String),
    /// A binary frame.
    Binary(Vec<u8>),
}

/// A single duplex WebSocket connection, from the perspective of the
/// session multiplexer (§4.7).
#[async_trait]
pub trait WsConnection: Send {
    /// Sends a text frame.
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Sends a binary frame.
    async fn send_binary(&mut self, data: Vec<u8>) -> Result<()>;

    /// Waits for the next inbound frame. Returns `Ok(None)` once the
    /// peer has closed the connection.
    async fn recv(&mut self) -> Result<Option<WsMessage>>;

    /// Closes the connection with a numeric code and human-readable
    /// reason (§4.7's close-code contract).
    async fn close(&mut self, code: u16, reason: &str) -> Result<()>;
}

/// Closes `ws` with the "unauthorized" code (§4.7, §6: 4001).
pub async fn close_unauthorized(ws: &mut dyn WsConnection, reason: &str) {
    if let Err(err) = ws.close(cyroid_common::constants::WS_CLOSE_UNAUTHORIZED, reason).await {
        tracing::debug!(%err, "error closing already-failing websocket");
    }
}

/// Closes `ws` with the "not found" code (§4.7, §6: 4004).
pub async fn close_not_found(ws: &mut dyn WsConnection, reason: &str) {
    if let Err(err) = ws.close(cyroid_common::constants::WS_CLOSE_NOT_FOUND, reason).await {
        tracing::debug!(%err, "error closing already-failing websocket");
    }
}

/// Closes `ws` with the generic unrecoverable-error code (§4.7, §6: 4000).
pub async fn close_error(ws: &mut dyn WsConnection, reason: &str) {
    if let Err(err) = ws.close(cyroid_common::constants::WS_CLOSE_ERROR, reason).await {
        tracing::debug!(%err, "error closing already-failing websocket");
    }
}
