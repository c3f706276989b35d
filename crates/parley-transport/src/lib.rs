//! Transport layer for Parley.
//!
//! Provides the [`Connection`] trait every higher layer is written
//! against, plus two implementations:
//!
//! - [`WebSocketListener`] / [`WebSocketConnection`]: the real network
//!   transport. One HTTP upgrade per client, routed by request path.
//! - [`memory::pair`]: an in-process connection driven by a
//!   [`MemoryPeer`](memory::MemoryPeer), used to exercise routing and
//!   session code without sockets.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

mod error;
pub mod memory;
mod routes;
mod signal;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use routes::{Endpoint, Routes};
#[cfg(feature = "websocket")]
pub use websocket::{PendingUpgrade, WebSocketConnection, WebSocketListener};

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a connection.
///
/// Only used for diagnostics. Client-visible identity lives in the
/// protocol layer's `SessionId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-unique connection ID.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A single duplex, message-framed connection.
///
/// The returned futures are `Send` so code that is generic over the
/// connection type can still run inside `tokio::spawn`.
///
/// Implementations must tolerate a `send` from one task while another
/// task is parked in `recv`: the session's own task reads, routers on
/// other sessions' tasks write.
pub trait Connection: Send + Sync + 'static {
    /// Sends one message to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the peer closed the connection cleanly.
    /// Returns [`TransportError::ConnectionClosed`] immediately if the
    /// connection is closed locally, including while this call is parked.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Closes the connection. Closing twice is a no-op.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_next_is_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
        assert!(b.into_inner() > a.into_inner());
    }
}
