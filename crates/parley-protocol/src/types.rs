//! Core protocol types for Parley's wire format.
//!
//! Every WebSocket message is one JSON object:
//!
//! ```text
//! { "from": "<sender session id>", "fromName": "<sender display name>",
//!   "to": "<recipient session id | 'all' | ''>", "data": "<payload>",
//!   "action": "" | "set-name" }
//! ```
//!
//! Missing keys decode as empty strings, so a client may send just
//! `{"to":"all","data":"hi"}`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The `to` value that addresses every registered session.
pub const BROADCAST_TARGET: &str = "all";

/// The `fromName` carried by frames the server generates itself.
pub const SYSTEM_SENDER_NAME: &str = "auto-reply";

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// Identity of one connected client.
///
/// Assigned by the server when a connection is accepted and never
/// reused: reconnecting yields a new id. Serialized as a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a fresh random (UUID v4) session id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the id as it appears on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// What an inbound frame asks the server to do.
///
/// On the wire this is a string: `""` for a regular message and
/// `"set-name"` for the registration handshake. Any other string is
/// treated as a regular message; a non-string value fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum Action {
    /// Regular message, routed by `to`.
    #[default]
    #[serde(rename = "")]
    None,

    /// Set the sender's display name to `data`.
    #[serde(rename = "set-name")]
    SetName,
}

impl From<String> for Action {
    fn from(action: String) -> Self {
        match action.as_str() {
            "set-name" => Self::SetName,
            _ => Self::None,
        }
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// One wire message, in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Frame {
    /// Sender session id. Empty on system frames.
    pub from: String,

    /// Sender display name, or [`SYSTEM_SENDER_NAME`] on system frames.
    #[serde(rename = "fromName")]
    pub from_name: String,

    /// Recipient session id, [`BROADCAST_TARGET`], or empty.
    pub to: String,

    /// Payload text.
    pub data: String,

    /// Requested action; always serialized.
    pub action: Action,
}

impl Frame {
    /// Private reply to a `set-name` request.
    pub fn welcome(to: &SessionId, display_name: &str) -> Self {
        Self::system(to, format!("Welcome {display_name}"))
    }

    /// Notice to an existing session that someone registered a name.
    pub fn joined(to: &SessionId, display_name: &str) -> Self {
        Self::system(to, format!("{display_name} has joined"))
    }

    /// Private reply to a frame that could not be routed.
    pub fn invalid_format(to: &SessionId) -> Self {
        Self::system(to, "Error: invalid message format".to_string())
    }

    /// A routed message. `from`/`fromName` are the origin session's
    /// authoritative values, never what the client sent.
    pub fn relay(
        from: &SessionId,
        from_name: &str,
        to: &SessionId,
        data: &str,
    ) -> Self {
        Self {
            from: from.as_str().to_string(),
            from_name: from_name.to_string(),
            to: to.as_str().to_string(),
            data: data.to_string(),
            action: Action::None,
        }
    }

    fn system(to: &SessionId, data: String) -> Self {
        Self {
            from: String::new(),
            from_name: SYSTEM_SENDER_NAME.to_string(),
            to: to.as_str().to_string(),
            data,
            action: Action::None,
        }
    }

    /// Reduces a client frame to what the router may act on, dropping
    /// the client-supplied `from`/`fromName`.
    pub fn into_inbound(self) -> Inbound {
        Inbound {
            action: self.action,
            destination: Destination::parse(&self.to),
            data: self.data,
        }
    }
}

// ---------------------------------------------------------------------------
// Destination / Inbound
// ---------------------------------------------------------------------------

/// Where a regular message should go, resolved once from `to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// `to` was empty. The frame is answered with an error.
    Missing,

    /// `to` was [`BROADCAST_TARGET`]: every registered session,
    /// including the sender.
    All,

    /// `to` named one session, which may or may not exist.
    Session(SessionId),
}

impl Destination {
    /// Parses a wire `to` value.
    pub fn parse(to: &str) -> Self {
        match to {
            "" => Self::Missing,
            BROADCAST_TARGET => Self::All,
            id => Self::Session(SessionId::from(id)),
        }
    }
}

/// The trusted view of a client frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub action: Action,
    pub destination: Destination,
    pub data: String,
}

// =========================================================================
// Tests
// =========================================================================
