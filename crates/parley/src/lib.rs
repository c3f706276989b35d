//! # Parley
//!
//! A WebSocket chat relay.
//!
//! Clients connect, pick a display name with a `set-name` frame, and send
//! JSON frames addressed to one session id or to `"all"`. The server
//! stamps every relayed frame with the sender's real id and name, so
//! clients can't speak for each other.
//!
//! The crate ties the layers together:
//!
//! - transport (`parley-transport`): WebSocket upgrade and [`Connection`]
//! - protocol (`parley-protocol`): the [`Frame`] wire format and [`Codec`]
//! - registry (`parley-registry`): the single-task session map
//! - [`Router`] and [`run_session`] (here): routing policy and lifecycle
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parley::prelude::*;
//!
//! # async fn start() -> Result<(), ParleyError> {
//! let server = ParleyServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! })
//! .await
//! # }
//! ```

mod config;
mod echo;
mod error;
mod handler;
mod router;
mod server;

pub use config::{ServerConfig, DEFAULT_PORT};
pub use echo::run_echo;
pub use error::{ParleyError, RouteError};
pub use handler::{run_session, CloseReason};
pub use router::{RouteOutcome, Router};
pub use server::{ParleyServer, ParleyServerBuilder};

pub use parley_protocol::{
    Action, Codec, Destination, Frame, Inbound, JsonCodec, ProtocolError,
    SessionId,
};
pub use parley_registry::{
    spawn_registry, RegistryHandle, Session, SessionRef, SessionState,
};
pub use parley_transport::{
    Connection, ConnectionId, Endpoint, Routes, TransportError,
    WebSocketConnection,
};

/// Convenience re-exports for building and running a server.
pub mod prelude {
    pub use crate::{
        ParleyError, ParleyServer, ParleyServerBuilder, Routes, ServerConfig,
    };
}
