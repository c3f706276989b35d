//! Integration tests for the WebSocket listener.
//!
//! These spin up a real listener and a real `tokio-tungstenite` client
//! so the upgrade, path routing, and framing are exercised over TCP.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use parley_transport::{
        Connection, Endpoint, Routes, TransportError, WebSocketConnection,
        WebSocketListener,
    };
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Binds on a random port and returns the listener and its address.
    async fn bind() -> (WebSocketListener, String) {
        let listener = WebSocketListener::bind("127.0.0.1:0", Routes::default())
            .await
            .expect("should bind");
        let addr = listener.local_addr().expect("local addr").to_string();
        (listener, addr)
    }

    /// Accepts and upgrades one connection while a client connects to `path`.
    async fn accept_one(
        path: &str,
    ) -> (Endpoint, WebSocketConnection, ClientWs) {
        let (listener, addr) = bind().await;
        let server = tokio::spawn(async move {
            let pending = listener.accept().await.expect("should accept");
            pending.upgrade().await.expect("should upgrade")
        });

        let (client, _) =
            tokio_tungstenite::connect_async(format!("ws://{addr}{path}"))
                .await
                .expect("client should connect");
        let (endpoint, conn) = server.await.expect("task should complete");
        (endpoint, conn, client)
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let (endpoint, server_conn, mut client) =
            accept_one("/websocket").await;

        assert_eq!(endpoint, Endpoint::Chat);
        assert!(server_conn.id().into_inner() > 0);

        // --- Server sends, client receives (as text) ---
        server_conn
            .send(br#"{"data":"hello from server"}"#)
            .await
            .expect("send should succeed");
        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_text());
        assert_eq!(msg.into_data().as_ref(), br#"{"data":"hello from server"}"#);

        // --- Client sends, server receives ---
        client
            .send(Message::text("hello from client".to_string()))
            .await
            .unwrap();
        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, b"hello from client");

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_echo_path_resolves_echo_endpoint() {
        let (endpoint, _conn, _client) = accept_one("/echo").await;
        assert_eq!(endpoint, Endpoint::Echo);
    }

    #[tokio::test]
    async fn test_websocket_unknown_path_is_rejected() {
        let (listener, addr) = bind().await;
        let server = tokio::spawn(async move {
            let pending = listener.accept().await.expect("should accept");
            pending.upgrade().await
        });

        let client =
            tokio_tungstenite::connect_async(format!("ws://{addr}/nope")).await;
        assert!(client.is_err(), "client handshake should be refused");

        let result = server.await.unwrap();
        assert!(matches!(result, Err(TransportError::HandshakeFailed(_))));
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (_, server_conn, mut client) = accept_one("/websocket").await;

        client.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_local_close_unblocks_recv() {
        let (_, server_conn, _client) = accept_one("/websocket").await;
        let server_conn = std::sync::Arc::new(server_conn);

        let reader = {
            let conn = server_conn.clone();
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        server_conn.close().await.expect("close should succeed");

        let result = tokio::time::timeout(Duration::from_secs(2), reader)
            .await
            .expect("recv should be unblocked")
            .unwrap();
        assert!(matches!(result, Err(TransportError::ConnectionClosed(_))));
        assert!(server_conn.send(b"late").await.is_err());
    }

    #[tokio::test]
    async fn test_websocket_send_while_recv_parked() {
        let (_, server_conn, mut client) = accept_one("/websocket").await;
        let server_conn = std::sync::Arc::new(server_conn);

        let reader = {
            let conn = server_conn.clone();
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The reader holds the read half; writes must not wait on it.
        tokio::time::timeout(Duration::from_secs(1), server_conn.send(b"ping"))
            .await
            .expect("send should not block behind recv")
            .expect("send should succeed");
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"ping");

        client.send(Message::Close(None)).await.unwrap();
        let result = reader.await.unwrap().expect("recv ok");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_websocket_close_unblocks_pending_send() {
        // The client never reads, so the server's writes eventually park
        // on a full socket buffer.
        let (_, server_conn, _client) = accept_one("/websocket").await;
        let server_conn = std::sync::Arc::new(server_conn);

        let writer = {
            let conn = server_conn.clone();
            tokio::spawn(async move {
                let payload = vec![b'x'; 1 << 20];
                loop {
                    if let Err(e) = conn.send(&payload).await {
                        return e;
                    }
                }
            })
        };
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!writer.is_finished(), "writer should be parked on a full buffer");

        // Close may report that the close frame couldn't be flushed, but
        // it must return.
        let _ = tokio::time::timeout(Duration::from_secs(2), server_conn.close())
            .await
            .expect("close should not hang behind a parked send");

        let err = tokio::time::timeout(Duration::from_secs(2), writer)
            .await
            .expect("pending send should be unblocked")
            .unwrap();
        assert!(matches!(err, TransportError::ConnectionClosed(_)));
    }
}
