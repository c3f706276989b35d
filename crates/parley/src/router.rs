//! Message router: resolves recipients for an inbound frame and fans
//! the outbound frames out.
//!
//! The router never closes a connection and never deregisters anyone.
//! It reports success or a [`RouteError`], and the session handler that
//! called it decides what happens to the origin session.
//!
//! Policies:
//! - `set-name` welcomes the origin, then tells every *other* session.
//! - `to: "all"` reaches every registered session, the origin included.
//! - `to: ""` is answered privately with an error frame.
//! - `to: <unknown id>` is dropped with a log line and nothing else.

use parley_protocol::{Action, Codec, Destination, Frame, Inbound, SessionId};
use parley_registry::{RegistryHandle, Session};
use parley_transport::Connection;

use crate::RouteError;

/// What routing one frame did. Used for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Name set; welcome sent plus `notified` join notices.
    Welcomed { notified: usize },
    /// Regular message delivered to `recipients` sessions.
    Delivered { recipients: usize },
    /// No destination; the origin got the invalid-format reply.
    Rejected,
    /// The destination id isn't registered. Nobody was told.
    NoRecipient,
}

/// Routes decoded frames between registered sessions.
pub struct Router<C, K> {
    registry: RegistryHandle<C>,
    codec: K,
}

impl<C: Connection, K: Codec> Router<C, K> {
    /// Creates a router over the given registry.
    pub fn new(registry: RegistryHandle<C>, codec: K) -> Self {
        Self { registry, codec }
    }

    /// The registry this router resolves recipients from.
    pub fn registry(&self) -> &RegistryHandle<C> {
        &self.registry
    }

    /// The codec used for inbound and outbound frames.
    pub fn codec(&self) -> &K {
        &self.codec
    }

    /// Routes one inbound frame from `origin`.
    ///
    /// # Errors
    /// Returns a [`RouteError`] on the first failed send or encode. Any
    /// remaining recipients for this frame are skipped. The error is
    /// fatal for `origin` only.
    pub async fn route(
        &self,
        origin: &Session<C>,
        inbound: Inbound,
    ) -> Result<RouteOutcome, RouteError> {
        match inbound.action {
            Action::SetName => self.set_name(origin, inbound.data).await,
            Action::None => {
                self.relay(origin, inbound.destination, &inbound.data).await
            }
        }
    }

    /// Sends the invalid-format reply to `origin` alone.
    pub async fn reject(&self, origin: &Session<C>) -> Result<(), RouteError> {
        self.send(origin, &Frame::invalid_format(origin.id())).await
    }

    async fn set_name(
        &self,
        origin: &Session<C>,
        name: String,
    ) -> Result<RouteOutcome, RouteError> {
        origin.set_display_name(name.as_str()).await;
        tracing::info!(session_id = %origin.id(), display_name = %name, "display name set");

        self.send(origin, &Frame::welcome(origin.id(), &name)).await?;

        let mut notified = 0;
        for session in self.registry.list().await {
            if session.id() == origin.id() {
                continue;
            }
            tracing::debug!(
                session_id = %session.id(),
                joined = %name,
                "sending join notice"
            );
            self.send(&session, &Frame::joined(session.id(), &name))
                .await?;
            notified += 1;
        }

        Ok(RouteOutcome::Welcomed { notified })
    }

    async fn relay(
        &self,
        origin: &Session<C>,
        destination: Destination,
        data: &str,
    ) -> Result<RouteOutcome, RouteError> {
        let recipients = match destination {
            Destination::Missing => {
                tracing::info!(session_id = %origin.id(), "no destination, rejecting frame");
                self.reject(origin).await?;
                return Ok(RouteOutcome::Rejected);
            }
            Destination::All => self.registry.list().await,
            Destination::Session(id) => match self.registry.find(&id).await {
                Some(session) => vec![session],
                None => {
                    tracing::info!(
                        session_id = %origin.id(),
                        to = %id,
                        "no receiver found"
                    );
                    return Ok(RouteOutcome::NoRecipient);
                }
            },
        };

        let from_name = origin.display_name().await;
        for recipient in &recipients {
            let frame =
                Frame::relay(origin.id(), &from_name, recipient.id(), data);
            self.send(recipient, &frame).await?;
        }

        tracing::debug!(
            session_id = %origin.id(),
            recipients = recipients.len(),
            "message delivered"
        );
        Ok(RouteOutcome::Delivered {
            recipients: recipients.len(),
        })
    }

    async fn send(
        &self,
        to: &Session<C>,
        frame: &Frame,
    ) -> Result<(), RouteError> {
        let bytes = self.codec.encode(frame)?;
        to.connection().send(&bytes).await.map_err(|source| {
            tracing::warn!(recipient = %to.id(), error = %source, "failed to send frame");
            RouteError::Send {
                recipient: SessionId::clone(to.id()),
                source,
            }
        })
    }
}

// =========================================================================
// Tests
// =========================================================================
