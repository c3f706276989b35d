/// Errors that can occur in the transport layer.
///
/// Every variant is fatal to the connection it came from. Nothing in
/// the transport retries.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed, locally or by the peer.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting TCP connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The HTTP upgrade to a WebSocket failed or was refused.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),
}
