//! Error types for routing and the unified Parley error.

use parley_protocol::{ProtocolError, SessionId};
use parley_transport::TransportError;

/// A failure while routing one inbound frame.
///
/// Always fatal for the session that sent the frame, never for the
/// recipient that could not be reached: the recipient's own handler
/// notices its broken connection on its next read.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// Writing to a recipient's connection failed. Remaining fan-out
    /// for the frame was abandoned.
    #[error("send to session {recipient} failed: {source}")]
    Send {
        recipient: SessionId,
        #[source]
        source: TransportError,
    },

    /// An outbound frame could not be encoded.
    #[error(transparent)]
    Encode(#[from] ProtocolError),
}

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ParleyError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A routing failure.
    #[error(transparent)]
    Route(#[from] RouteError),
}
