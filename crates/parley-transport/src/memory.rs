//! In-process connections backed by channels.
//!
//! [`pair`] returns a server-side [`MemoryConnection`] and the
//! [`MemoryPeer`] that plays the client. Dropping the peer behaves like
//! the client vanishing: the server's `recv` sees a clean close and its
//! `send`s start failing.

use tokio::sync::{mpsc, Mutex};

use crate::signal::CloseSignal;
use crate::{Connection, ConnectionId, TransportError};

/// Creates a connected server/client pair.
pub fn pair() -> (MemoryConnection, MemoryPeer) {
    let (to_server, inbound) = mpsc::unbounded_channel();
    let (outbound, from_server) = mpsc::unbounded_channel();
    let conn = MemoryConnection {
        id: ConnectionId::next(),
        inbound: Mutex::new(inbound),
        outbound: Mutex::new(Some(outbound)),
        signal: CloseSignal::new(),
    };
    let peer = MemoryPeer {
        to_server: Some(to_server),
        from_server,
    };
    (conn, peer)
}

/// Server side of an in-process connection.
pub struct MemoryConnection {
    id: ConnectionId,
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    signal: CloseSignal,
}

impl Connection for MemoryConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let outbound = self.outbound.lock().await;
        let Some(tx) = outbound.as_ref() else {
            return Err(TransportError::ConnectionClosed(format!(
                "{} is closed",
                self.id
            )));
        };
        tx.send(data.to_vec()).map_err(|_| {
            TransportError::ConnectionClosed(format!(
                "{}: peer went away",
                self.id
            ))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            biased;
            _ = self.signal.closed() => Err(TransportError::ConnectionClosed(
                format!("{} closed locally", self.id),
            )),
            data = inbound.recv() => Ok(data),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.signal.close();
        // Dropping the sender lets the peer observe the close.
        self.outbound.lock().await.take();
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Client side of an in-process connection.
pub struct MemoryPeer {
    to_server: Option<mpsc::UnboundedSender<Vec<u8>>>,
    from_server: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MemoryPeer {
    /// Delivers a message to the server side.
    pub fn send(&self, data: impl Into<Vec<u8>>) -> Result<(), TransportError> {
        let tx = self.to_server.as_ref().ok_or_else(|| {
            TransportError::ConnectionClosed("peer hung up".into())
        })?;
        tx.send(data.into()).map_err(|_| {
            TransportError::ConnectionClosed("server side dropped".into())
        })
    }

    /// Waits for the next message from the server. `None` once the
    /// server closed the connection.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.from_server.recv().await
    }

    /// Returns a message if one is already queued.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.from_server.try_recv().ok()
    }

    /// Closes the client-to-server direction, which the server sees as
    /// a clean close. Messages from the server can still be read.
    pub fn hang_up(&mut self) {
        self.to_server.take();
    }
}
