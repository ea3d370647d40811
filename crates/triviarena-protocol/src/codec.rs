//! Codec trait and implementations for serializing protocol frames.
//!
//! The handler layer does not care how frames become bytes; it goes through
//! the [`Codec`] trait so the wire format can be swapped without touching
//! connection code. JSON is the only codec shipped today (behind the default
//! `json` feature), chosen because every trivia client is a browser.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Converts protocol values to bytes and back.
///
/// `Send + Sync + 'static` because a codec is stored in shared server state
/// and used from every connection task. The methods are generic over the
/// frame type so one codec instance serves both [`crate::ClientAction`] and
/// [`crate::ServerEvent`].
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed or do
    /// not match the expected shape.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// ## Example
///
/// ```rust
/// use triviarena_protocol::{ClientAction, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&ClientAction::ToggleReady).unwrap();
/// let back: ClientAction = codec.decode(&bytes).unwrap();
/// assert_eq!(back, ClientAction::ToggleReady);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{ConnectionId, ServerEvent};

    #[test]
    fn test_json_codec_round_trips_server_event() {
        let codec = JsonCodec;
        let event = ServerEvent::Connected {
            connection_id: ConnectionId(9),
        };
        let bytes = codec.encode(&event).unwrap();
        let decoded: ServerEvent = codec.decode(&bytes).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn test_json_codec_decode_garbage_is_decode_error() {
        let codec = JsonCodec;
        let result: Result<ServerEvent, _> = codec.decode(b"{{{{");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
