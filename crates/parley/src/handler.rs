//! Per-connection handler: registration, the receive loop, and teardown.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Upgrade the socket; the request path picks chat or echo
//!   2. Chat: create a session and register it
//!   3. Loop: receive frames, decode, hand them to the router
//!   4. On transport failure, an undecodable frame, or a fatal routing
//!      error: deregister, close

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parley_protocol::{Codec, ProtocolError, SessionId};
use parley_registry::{RegistryHandle, Session, SessionState};
use parley_transport::{
    Connection, Endpoint, PendingUpgrade, TransportError,
};

use crate::echo::run_echo;
use crate::router::Router;
use crate::server::ServerState;
use crate::RouteError;

/// Why a session (or echo connection) ended.
#[derive(Debug)]
pub enum CloseReason {
    /// The peer closed the connection cleanly.
    PeerClosed,
    /// A read or write on the connection failed.
    TransportFailed(TransportError),
    /// No frame arrived within the configured idle timeout.
    IdleTimeout,
    /// The peer sent something that isn't a frame.
    Undecodable(ProtocolError),
    /// Routing one of this session's frames failed.
    RouteFailed(RouteError),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed => write!(f, "peer closed"),
            Self::TransportFailed(e) => write!(f, "transport failed: {e}"),
            Self::IdleTimeout => write!(f, "idle timeout"),
            Self::Undecodable(e) => write!(f, "undecodable frame: {e}"),
            Self::RouteFailed(e) => write!(f, "routing failed: {e}"),
        }
    }
}

/// Drop guard that deregisters a session if the handler unwinds.
///
/// The normal path deregisters explicitly (and awaits it), then disarms
/// the guard. Since `Drop` is synchronous, the panic path can only
/// queue a detached deregistration.
struct RegistrationGuard<C: Connection> {
    id: SessionId,
    registry: RegistryHandle<C>,
    armed: bool,
}

impl<C: Connection> RegistrationGuard<C> {
    fn new(id: SessionId, registry: RegistryHandle<C>) -> Self {
        Self {
            id,
            registry,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<C: Connection> Drop for RegistrationGuard<C> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(session_id = %self.id, "handler unwound, deregistering");
            self.registry.deregister_detached(self.id.clone());
        }
    }
}

/// Tracks a session's lifecycle state and logs each transition.
struct Lifecycle<'a> {
    id: &'a SessionId,
    state: SessionState,
}

impl<'a> Lifecycle<'a> {
    fn new(id: &'a SessionId) -> Self {
        tracing::debug!(session_id = %id, state = %SessionState::Connecting, "session state");
        Self {
            id,
            state: SessionState::Connecting,
        }
    }

    fn advance(&mut self, target: SessionState) {
        debug_assert!(
            self.state.can_transition_to(target),
            "invalid session transition {} -> {}",
            self.state,
            target
        );
        tracing::debug!(
            session_id = %self.id,
            from = %self.state,
            to = %target,
            "session state"
        );
        self.state = target;
    }
}

/// Handles a single accepted socket from upgrade to close.
pub(crate) async fn handle_connection<K: Codec>(
    pending: PendingUpgrade,
    state: Arc<ServerState<K>>,
) {
    let peer = pending.peer_addr();
    let (endpoint, conn) = match pending.upgrade().await {
        Ok(upgraded) => upgraded,
        Err(e) => {
            tracing::info!(%peer, error = %e, "upgrade failed");
            return;
        }
    };

    let conn_id = conn.id();
    let reason = match endpoint {
        Endpoint::Chat => {
            run_session(conn, &state.router, state.idle_timeout).await
        }
        Endpoint::Echo => run_echo(conn).await,
    };
    tracing::debug!(%conn_id, %peer, %reason, "connection finished");
}

/// Runs one chat session to completion.
///
/// Creates the session with a fresh identity, registers it, and routes
/// every inbound frame until the connection fails, the peer leaves or
/// sends something that isn't a frame, or routing reports a fatal error.
/// The session is then deregistered and its connection closed, exactly
/// once.
pub async fn run_session<C: Connection, K: Codec>(
    conn: C,
    router: &Router<C, K>,
    idle_timeout: Option<Duration>,
) -> CloseReason {
    let session = Arc::new(Session::new(conn));
    let id = session.id().clone();
    let mut lifecycle = Lifecycle::new(&id);

    router.registry().register(Arc::clone(&session)).await;
    let mut guard = RegistrationGuard::new(id.clone(), router.registry().clone());
    lifecycle.advance(SessionState::Registered);
    tracing::info!(session_id = %id, conn_id = %session.connection().id(), "session registered");

    lifecycle.advance(SessionState::Receiving);
    let reason = loop {
        let received = match idle_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, session.connection().recv())
                    .await
                {
                    Ok(received) => received,
                    Err(_) => break CloseReason::IdleTimeout,
                }
            }
            None => session.connection().recv().await,
        };

        let data = match received {
            Ok(Some(data)) => data,
            Ok(None) => break CloseReason::PeerClosed,
            Err(e) => break CloseReason::TransportFailed(e),
        };

        let inbound = match router.codec().decode_inbound(&data) {
            Ok(inbound) => inbound,
            Err(e) => break CloseReason::Undecodable(e),
        };

        match router.route(&session, inbound).await {
            Ok(outcome) => {
                tracing::trace!(session_id = %id, ?outcome, "frame routed");
            }
            Err(e) => break CloseReason::RouteFailed(e),
        }
    };

    lifecycle.advance(SessionState::Closing);
    tracing::info!(session_id = %id, %reason, "closing session");

    router.registry().deregister(&id).await;
    guard.disarm();
    if let Err(e) = session.connection().close().await {
        tracing::debug!(session_id = %id, error = %e, "close failed");
    }
    lifecycle.advance(SessionState::Closed);

    reason
}

#[cfg(test)]
mod tests {
    use parley_protocol::{Frame, JsonCodec};
    use parley_registry::{spawn_registry, DEFAULT_QUEUE_SIZE};
    use parley_transport::memory::{self, MemoryConnection, MemoryPeer};

    use super::*;

    type TestRouter = Router<MemoryConnection, JsonCodec>;

    fn router() -> Arc<TestRouter> {
        Arc::new(Router::new(spawn_registry(DEFAULT_QUEUE_SIZE), JsonCodec))
    }

    fn spawn_session(
        router: &Arc<TestRouter>,
        idle_timeout: Option<Duration>,
    ) -> (tokio::task::JoinHandle<CloseReason>, MemoryPeer) {
        let (conn, peer) = memory::pair();
        let router = Arc::clone(router);
        let task = tokio::spawn(async move {
            run_session(conn, router.as_ref(), idle_timeout).await
        });
        (task, peer)
    }

    async fn next_frame(peer: &mut MemoryPeer) -> Frame {
        let bytes = tokio::time::timeout(Duration::from_secs(1), peer.recv())
            .await
            .expect("frame within a second")
            .expect("connection still open");
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn wait_for_len(router: &TestRouter, expected: usize) {
        for _ in 0..100 {
            if router.registry().len().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("registry never reached {expected} sessions");
    }

    #[tokio::test]
    async fn test_run_session_registers_and_welcomes() {
        let router = router();
        let (_task, mut peer) = spawn_session(&router, None);

        peer.send(r#"{"action":"set-name","data":"alice"}"#).unwrap();
        let welcome = next_frame(&mut peer).await;

        assert_eq!(welcome.data, "Welcome alice");
        assert_eq!(router.registry().len().await, 1);
        let sessions = router.registry().list().await;
        assert_eq!(welcome.to, sessions[0].id().as_str());
    }

    #[tokio::test]
    async fn test_run_session_peer_close_deregisters() {
        let router = router();
        let (task, mut peer) = spawn_session(&router, None);
        wait_for_len(&router, 1).await;

        peer.hang_up();
        let reason = task.await.unwrap();

        assert!(matches!(reason, CloseReason::PeerClosed));
        assert!(router.registry().is_empty().await);
        // The server side closed its half too.
        assert!(peer.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_run_session_departed_session_is_not_reachable() {
        let router = router();
        let (_alice_task, mut alice) = spawn_session(&router, None);
        let (bob_task, mut bob) = spawn_session(&router, None);
        wait_for_len(&router, 2).await;

        bob.send(r#"{"action":"set-name","data":"bob"}"#).unwrap();
        let bob_id = next_frame(&mut bob).await.to;
        let _joined = next_frame(&mut alice).await;

        bob.hang_up();
        bob_task.await.unwrap();

        alice.send(format!(r#"{{"to":"{bob_id}","data":"hi"}}"#)).unwrap();
        alice.send(r#"{"to":"all","data":"anyone?"}"#).unwrap();

        // Only the broadcast comes back, addressed to alice alone.
        let frame = next_frame(&mut alice).await;
        assert_eq!(frame.data, "anyone?");
        assert!(bob.recv().await.is_none());
        assert_eq!(router.registry().len().await, 1);
    }

    #[tokio::test]
    async fn test_run_session_malformed_json_closes_session() {
        let router = router();
        let (task, mut peer) = spawn_session(&router, None);
        wait_for_len(&router, 1).await;

        peer.send("{not json").unwrap();
        let reason = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("session ends")
            .unwrap();

        assert!(matches!(reason, CloseReason::Undecodable(_)));
        assert!(router.registry().is_empty().await);
        assert!(peer.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_run_session_non_string_field_closes_session() {
        let router = router();
        let (task, peer) = spawn_session(&router, None);

        peer.send(r#"{"to":"all","data":42}"#).unwrap();
        let reason = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("session ends")
            .unwrap();
        assert!(matches!(reason, CloseReason::Undecodable(_)));
    }

    #[tokio::test]
    async fn test_run_session_unknown_action_is_regular_message() {
        let router = router();
        let (_task, mut peer) = spawn_session(&router, None);

        peer.send(r#"{"action":"kick","to":"all","data":"x"}"#).unwrap();
        let frame = next_frame(&mut peer).await;
        assert_eq!(frame.data, "x");
        assert_ne!(frame.from_name, "auto-reply");
    }

    #[tokio::test]
    async fn test_run_session_route_failure_closes_origin() {
        let router = router();
        let (alice_task, alice) = spawn_session(&router, None);

        // A registered session whose client is gone and whose own
        // handler hasn't noticed yet.
        let (ghost_conn, ghost_peer) = memory::pair();
        let ghost = Arc::new(Session::new(ghost_conn));
        let ghost_id = ghost.id().clone();
        router.registry().register(ghost).await;
        drop(ghost_peer);
        wait_for_len(&router, 2).await;

        alice.send(r#"{"to":"all","data":"hi"}"#).unwrap();

        let reason = tokio::time::timeout(Duration::from_secs(1), alice_task)
            .await
            .expect("alice's session ends")
            .unwrap();
        assert!(matches!(reason, CloseReason::RouteFailed(_)));
        // Only the origin is torn down.
        assert_eq!(router.registry().len().await, 1);
        assert!(router.registry().find(&ghost_id).await.is_some());
    }

    #[tokio::test]
    async fn test_run_session_idle_timeout_closes() {
        let router = router();
        let (task, _peer) =
            spawn_session(&router, Some(Duration::from_millis(20)));

        let reason = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("session times out")
            .unwrap();

        assert!(matches!(reason, CloseReason::IdleTimeout));
        assert!(router.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_registration_guard_deregisters_on_drop() {
        let router = router();
        let (conn, _peer) = memory::pair();
        let session = Arc::new(Session::new(conn));
        let id = session.id().clone();
        router.registry().register(session).await;

        drop(RegistrationGuard::new(id.clone(), router.registry().clone()));

        wait_for_len(&router, 0).await;
        assert!(router.registry().find(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_registration_guard_disarmed_keeps_session() {
        let router = router();
        let (conn, _peer) = memory::pair();
        let session = Arc::new(Session::new(conn));
        let id = session.id().clone();
        router.registry().register(session).await;

        let mut guard = RegistrationGuard::new(id.clone(), router.registry().clone());
        guard.disarm();
        drop(guard);

        assert!(router.registry().find(&id).await.is_some());
    }
}
