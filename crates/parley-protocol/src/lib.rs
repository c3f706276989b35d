//! Wire protocol for Parley.
//!
//! This crate defines what clients and the server exchange:
//!
//! - **Types** ([`Frame`], [`Action`], [`Destination`], [`SessionId`]):
//!   the JSON object every WebSocket message carries, and the typed
//!   views the server routes on.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames become
//!   bytes and back.
//! - **Errors** ([`ProtocolError`]): what can go wrong while doing so.
//!
//! # Trust boundary
//!
//! An inbound frame is reduced to an [`Inbound`] before anything routes
//! it. `Inbound` has no `from`/`fromName`: sender identity on outbound
//! frames always comes from the server's own session record.
//!
//! ```text
//! Transport (bytes) → Protocol (Frame → Inbound) → Router (Session context)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Action, Destination, Frame, Inbound, SessionId, BROADCAST_TARGET,
    SYSTEM_SENDER_NAME,
};
