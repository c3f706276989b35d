//! Diagnostic echo endpoint.
//!
//! Sends every received message straight back to its sender. Echo
//! connections get no session and never appear in the registry.

use parley_transport::Connection;

use crate::handler::CloseReason;

/// Echoes messages on `conn` until the peer closes or a send fails.
pub async fn run_echo<C: Connection>(conn: C) -> CloseReason {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "echo connection opened");

    let reason = loop {
        match conn.recv().await {
            Ok(Some(data)) => {
                if let Err(e) = conn.send(&data).await {
                    break CloseReason::TransportFailed(e);
                }
            }
            Ok(None) => break CloseReason::PeerClosed,
            Err(e) => break CloseReason::TransportFailed(e),
        }
    };

    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }
    reason
}

#[cfg(test)]
mod tests {
    use parley_transport::memory;

    use super::*;

    #[tokio::test]
    async fn test_run_echo_returns_bytes_verbatim() {
        let (conn, mut peer) = memory::pair();
        let task = tokio::spawn(run_echo(conn));

        peer.send("not even json").unwrap();
        assert_eq!(peer.recv().await.as_deref(), Some(&b"not even json"[..]));

        peer.send(vec![0u8, 159, 146, 150]).unwrap();
        assert_eq!(peer.recv().await, Some(vec![0u8, 159, 146, 150]));

        peer.hang_up();
        assert!(matches!(task.await.unwrap(), CloseReason::PeerClosed));
        assert!(peer.recv().await.is_none());
    }
}
