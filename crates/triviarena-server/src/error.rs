//! Unified error type for the server layer.

use triviarena_protocol::ProtocolError;

/// Top-level error for binding, accepting, and talking to sockets.
///
/// Game rule violations never surface here. Those travel to the player
/// as [`triviarena_protocol::ServerEvent::Error`] frames; this type is
/// for the connection itself going wrong. The `#[from]` attribute on
/// each variant auto-generates `From` impls, so the `?` operator
/// converts lower-level errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// A socket-level error (bind, local_addr).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A WebSocket-level error (upgrade, send, recv).
    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A frame-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
