//! Registry actor: an isolated Tokio task that owns the session map.
//!
//! The map lives inside the task and nowhere else. Callers hold a
//! [`RegistryHandle`], which turns each operation into a
//! `RegistryCommand` on a bounded FIFO channel; commands that need an
//! answer carry a `oneshot` reply channel.
//!
//! Every operation is total. If the registry task is gone (which only
//! happens once every handle is dropped, or if it panicked) the handle
//! logs and returns the neutral result instead of an error.

use std::collections::HashMap;

use parley_protocol::SessionId;
use parley_transport::Connection;
use tokio::sync::{mpsc, oneshot};

use crate::SessionRef;

/// Default command queue size for the registry actor.
pub const DEFAULT_QUEUE_SIZE: usize = 64;

/// Commands sent to the registry actor through its channel.
enum RegistryCommand<C> {
    /// Insert a session under its id.
    Register {
        session: SessionRef<C>,
        reply: oneshot::Sender<()>,
    },

    /// Remove a session if present.
    Deregister {
        id: SessionId,
        reply: Option<oneshot::Sender<()>>,
    },

    /// Take a snapshot of every registered session.
    List {
        reply: oneshot::Sender<Vec<SessionRef<C>>>,
    },

    /// Look up one session.
    Find {
        id: SessionId,
        reply: oneshot::Sender<Option<SessionRef<C>>>,
    },

    /// Count registered sessions.
    Len { reply: oneshot::Sender<usize> },
}

/// Handle to the running registry actor.
///
/// Cheap to clone: it's just an `mpsc::Sender` wrapper. The actor
/// stops once the last handle is dropped.
pub struct RegistryHandle<C> {
    sender: mpsc::Sender<RegistryCommand<C>>,
}

impl<C> Clone for RegistryHandle<C> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<C: Connection> RegistryHandle<C> {
    /// Registers a session and waits until the registry has applied it.
    pub async fn register(&self, session: SessionRef<C>) {
        let id = session.id().clone();
        let (reply_tx, reply_rx) = oneshot::channel();
        let cmd = RegistryCommand::Register {
            session,
            reply: reply_tx,
        };
        if self.sender.send(cmd).await.is_err() || reply_rx.await.is_err() {
            tracing::error!(session_id = %id, "registry unavailable, register dropped");
        }
    }

    /// Deregisters a session and waits until the registry has applied
    /// it. Unknown ids are ignored.
    pub async fn deregister(&self, id: &SessionId) {
        let (reply_tx, reply_rx) = oneshot::channel();
        let cmd = RegistryCommand::Deregister {
            id: id.clone(),
            reply: Some(reply_tx),
        };
        if self.sender.send(cmd).await.is_err() || reply_rx.await.is_err() {
            tracing::error!(session_id = %id, "registry unavailable, deregister dropped");
        }
    }

    /// Queues a deregistration without waiting for it.
    ///
    /// Usable from synchronous contexts such as `Drop`. Falls back to a
    /// spawned send when the queue is full.
    pub fn deregister_detached(&self, id: SessionId) {
        let cmd = RegistryCommand::Deregister { id, reply: None };
        match self.sender.try_send(cmd) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(cmd)) => {
                let sender = self.sender.clone();
                tokio::spawn(async move {
                    let _ = sender.send(cmd).await;
                });
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("registry closed, detached deregister dropped");
            }
        }
    }

    /// Returns every registered session as of the moment the registry
    /// processes the request. The snapshot is independent: later
    /// registry changes don't affect it. Order is unspecified.
    pub async fn list(&self) -> Vec<SessionRef<C>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .sender
            .send(RegistryCommand::List { reply: reply_tx })
            .await
            .is_err()
        {
            tracing::error!("registry unavailable, returning empty snapshot");
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }

    /// Looks up a session by id.
    pub async fn find(&self, id: &SessionId) -> Option<SessionRef<C>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let cmd = RegistryCommand::Find {
            id: id.clone(),
            reply: reply_tx,
        };
        if self.sender.send(cmd).await.is_err() {
            tracing::error!(session_id = %id, "registry unavailable, find returns none");
            return None;
        }
        reply_rx.await.ok().flatten()
    }

    /// Returns the number of registered sessions.
    pub async fn len(&self) -> usize {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .sender
            .send(RegistryCommand::Len { reply: reply_tx })
            .await
            .is_err()
        {
            return 0;
        }
        reply_rx.await.unwrap_or(0)
    }

    /// Returns `true` if no session is registered.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// The internal registry state. Runs inside a Tokio task.
struct RegistryActor<C> {
    sessions: HashMap<SessionId, SessionRef<C>>,
    receiver: mpsc::Receiver<RegistryCommand<C>>,
}

impl<C: Connection> RegistryActor<C> {
    /// Processes commands one at a time until every handle is dropped.
    async fn run(mut self) {
        tracing::debug!("registry actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RegistryCommand::Register { session, reply } => {
                    let id = session.id().clone();
                    self.sessions.insert(id.clone(), session);
                    tracing::debug!(
                        session_id = %id,
                        sessions = self.sessions.len(),
                        "session registered"
                    );
                    let _ = reply.send(());
                }
                RegistryCommand::Deregister { id, reply } => {
                    if self.sessions.remove(&id).is_some() {
                        tracing::debug!(
                            session_id = %id,
                            sessions = self.sessions.len(),
                            "session deregistered"
                        );
                    }
                    if let Some(reply) = reply {
                        let _ = reply.send(());
                    }
                }
                RegistryCommand::List { reply } => {
                    let _ = reply.send(self.sessions.values().cloned().collect());
                }
                RegistryCommand::Find { id, reply } => {
                    let _ = reply.send(self.sessions.get(&id).cloned());
                }
                RegistryCommand::Len { reply } => {
                    let _ = reply.send(self.sessions.len());
                }
            }
        }

        tracing::debug!("registry actor stopped");
    }
}

/// Spawns the registry actor and returns a handle to it.
///
/// `queue_size` bounds the command queue; callers wait when it is full.
pub fn spawn_registry<C: Connection>(queue_size: usize) -> RegistryHandle<C> {
    let (tx, rx) = mpsc::channel(queue_size.max(1));

    let actor = RegistryActor {
        sessions: HashMap::new(),
        receiver: rx,
    };
    tokio::spawn(actor.run());

    RegistryHandle { sender: tx }
}

// =========================================================================
// Tests
// =========================================================================
