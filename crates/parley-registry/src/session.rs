//! Session types: the server's record of one connected client.
//!
//! A session tracks:
//! - WHO the client is (`SessionId`, fixed at accept time)
//! - WHAT it calls itself (display name, empty until `set-name`)
//! - HOW to reach it (the connection, owned by the session)

use std::sync::Arc;

use parley_protocol::SessionId;
use parley_transport::Connection;
use tokio::sync::RwLock;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a session handler is in its lifecycle.
///
/// Transitions are strictly ordered, with no skips or cycles:
///
/// ```text
/// Connecting → Registered → Receiving → Closing → Closed
/// ```
///
/// - **Connecting**: connection accepted, identity assigned.
/// - **Registered**: the registry has acknowledged the session.
/// - **Receiving**: parked on the next inbound frame, routing each one.
/// - **Closing**: a transport failure or a fatal routing error ended
///   the receive loop.
/// - **Closed**: deregistered and the connection closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Registered,
    Receiving,
    Closing,
    Closed,
}

impl SessionState {
    /// Returns the state that follows this one, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Connecting => Some(Self::Registered),
            Self::Registered => Some(Self::Receiving),
            Self::Receiving => Some(Self::Closing),
            Self::Closing => Some(Self::Closed),
            Self::Closed => None,
        }
    }

    /// Returns `true` if transitioning to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::Registered => write!(f, "Registered"),
            Self::Receiving => write!(f, "Receiving"),
            Self::Closing => write!(f, "Closing"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Shared handle to a session. Registry snapshots hand these out.
pub type SessionRef<C> = Arc<Session<C>>;

/// A single connected client.
///
/// The connection is owned here and nowhere else. The session's handler
/// reads from it; routers on other sessions' tasks write to it through
/// registry snapshots.
#[derive(Debug)]
pub struct Session<C> {
    id: SessionId,
    display_name: RwLock<String>,
    conn: C,
}

impl<C: Connection> Session<C> {
    /// Creates a session with a fresh id and no display name.
    pub fn new(conn: C) -> Self {
        Self::with_id(SessionId::generate(), conn)
    }

    fn with_id(id: SessionId, conn: C) -> Self {
        Self {
            id,
            display_name: RwLock::new(String::new()),
            conn,
        }
    }

    /// The session's immutable identity.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// The current display name (empty until set).
    pub async fn display_name(&self) -> String {
        self.display_name.read().await.clone()
    }

    /// Replaces the display name.
    pub async fn set_display_name(&self, name: impl Into<String>) {
        *self.display_name.write().await = name.into();
    }

    /// The connection this session owns.
    pub fn connection(&self) -> &C {
        &self.conn
    }
}
