//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

use crate::signal::CloseSignal;
use crate::{Connection, ConnectionId, Endpoint, Routes, TransportError};

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// How long `close` waits to flush the close frame to a peer that has
/// stopped reading.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Listens for TCP connections that will be upgraded to WebSockets.
pub struct WebSocketListener {
    listener: TcpListener,
    routes: Arc<Routes>,
}

impl WebSocketListener {
    /// Binds a new listener to the given address.
    pub async fn bind(
        addr: &str,
        routes: Routes,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(
            addr,
            chat = %routes.chat,
            echo = ?routes.echo,
            "WebSocket listener bound"
        );
        Ok(Self {
            listener,
            routes: Arc::new(routes),
        })
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Waits for the next TCP connection.
    ///
    /// Only the TCP accept happens here. The WebSocket handshake is left
    /// to [`PendingUpgrade::upgrade`] so it can run on the connection's
    /// own task.
    pub async fn accept(&self) -> Result<PendingUpgrade, TransportError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::trace!(%peer, "accepted TCP connection");
        Ok(PendingUpgrade {
            stream,
            peer,
            routes: Arc::clone(&self.routes),
        })
    }
}

/// An accepted TCP stream waiting for its HTTP upgrade.
pub struct PendingUpgrade {
    stream: TcpStream,
    peer: SocketAddr,
    routes: Arc<Routes>,
}

impl PendingUpgrade {
    /// Returns the remote address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Performs the WebSocket handshake.
    ///
    /// The request path picks the [`Endpoint`]. Unknown paths are
    /// answered with `404 Not Found` and the upgrade fails.
    pub async fn upgrade(
        self,
    ) -> Result<(Endpoint, WebSocketConnection), TransportError> {
        let routes = self.routes;
        let mut endpoint = None;

        let callback = |req: &Request, resp: Response| {
            match routes.resolve(req.uri().path()) {
                Some(resolved) => {
                    endpoint = Some(resolved);
                    Ok(resp)
                }
                None => {
                    let mut rejection = ErrorResponse::new(Some(format!(
                        "no WebSocket endpoint at {}",
                        req.uri().path()
                    )));
                    *rejection.status_mut() = StatusCode::NOT_FOUND;
                    Err(rejection)
                }
            }
        };

        let ws = tokio_tungstenite::accept_hdr_async(self.stream, callback)
            .await
            .map_err(|e| TransportError::HandshakeFailed(e.to_string()))?;

        let endpoint = endpoint.ok_or_else(|| {
            TransportError::HandshakeFailed("no endpoint resolved".into())
        })?;

        let id = ConnectionId::next();
        tracing::debug!(%id, peer = %self.peer, ?endpoint, "upgraded WebSocket connection");

        let (sink, stream) = ws.split();
        Ok((
            endpoint,
            WebSocketConnection {
                id,
                peer: self.peer,
                sink: Mutex::new(sink),
                stream: Mutex::new(stream),
                signal: CloseSignal::new(),
            },
        ))
    }
}

/// A single WebSocket connection.
///
/// Reads and writes go through separate locks, so a router sending to
/// this connection never waits behind the owning session's parked read.
pub struct WebSocketConnection {
    id: ConnectionId,
    peer: SocketAddr,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    signal: CloseSignal,
}

impl WebSocketConnection {
    /// Returns the remote address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Connection for WebSocketConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if self.signal.is_closed() {
            return Err(TransportError::ConnectionClosed(format!(
                "{} is closed",
                self.id
            )));
        }
        // Frames are JSON text; anything that isn't UTF-8 goes as binary.
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::text(text.to_owned()),
            Err(_) => Message::binary(data.to_vec()),
        };
        let write = async {
            let mut sink = self.sink.lock().await;
            sink.send(msg).await
        };
        // A write parked on a full buffer gives up the sink when the
        // connection is closed.
        tokio::select! {
            biased;
            _ = self.signal.closed() => Err(TransportError::ConnectionClosed(
                format!("{} closed during send", self.id),
            )),
            result = write => result.map_err(|e| {
                TransportError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    e,
                ))
            }),
        }
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut stream = self.stream.lock().await;
        loop {
            let msg = tokio::select! {
                biased;
                _ = self.signal.closed() => {
                    return Err(TransportError::ConnectionClosed(format!(
                        "{} closed locally",
                        self.id
                    )));
                }
                msg = stream.next() => msg,
            };
            match msg {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if !self.signal.close() {
            return Ok(());
        }
        let graceful = async {
            let mut sink = self.sink.lock().await;
            sink.close().await
        };
        match tokio::time::timeout(CLOSE_TIMEOUT, graceful).await {
            Ok(result) => result.map_err(|e| {
                TransportError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    e,
                ))
            }),
            Err(_) => {
                tracing::debug!(id = %self.id, "close handshake timed out");
                Err(TransportError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "peer is not draining its socket",
                )))
            }
        }
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
