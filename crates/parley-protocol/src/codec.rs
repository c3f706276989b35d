//! Codec trait and implementations for serializing/deserializing frames.
//!
//! The router and session handler never touch `serde_json` directly;
//! they hold something that implements [`Codec`]. [`JsonCodec`] is the
//! only implementation and matches what browser clients send.

use serde::{de::DeserializeOwned, Serialize};

use crate::{Frame, Inbound, ProtocolError};

/// A codec that can encode values to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because one codec is shared by every session
/// task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or
    /// don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;

    /// Decodes a client frame straight into its trusted [`Inbound`] view.
    fn decode_inbound(&self, data: &[u8]) -> Result<Inbound, ProtocolError> {
        self.decode::<Frame>(data).map(Frame::into_inbound)
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use parley_protocol::{Codec, Destination, Frame, JsonCodec, SessionId};
///
/// let codec = JsonCodec;
/// let frame = Frame::relay(
///     &SessionId::from("a"),
///     "alice",
///     &SessionId::from("b"),
///     "hi",
/// );
///
/// let bytes = codec.encode(&frame).unwrap();
/// let decoded: Frame = codec.decode(&bytes).unwrap();
/// assert_eq!(frame, decoded);
///
/// let inbound = codec.decode_inbound(br#"{"to":"all","data":"hi"}"#).unwrap();
/// assert_eq!(inbound.destination, Destination::All);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
