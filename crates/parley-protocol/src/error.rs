//! Error types for the protocol layer.

/// Errors that can occur in the protocol layer.
///
/// All of these are recoverable from the server's point of view: a
/// frame that can't be decoded is answered, not fatal.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a frame into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, a non-string field, or an
    /// `action` value the server doesn't know.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame decoded but can't be routed as given.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
