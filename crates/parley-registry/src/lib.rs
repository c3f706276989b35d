//! Session records and the connection registry for Parley.
//!
//! # Key types
//!
//! - [`Session`]: one connected client: id, display name, connection
//! - [`SessionState`]: the lifecycle a session handler walks through
//! - [`RegistryHandle`]: the only way to reach the registry, which runs
//!   as a single Tokio task (actor model) owning the id → session map
//!
//! # Concurrency
//!
//! The map is never shared. Every operation is a command on one FIFO
//! queue, applied in full by the registry task before the next one is
//! looked at. Commands from one caller apply in the order submitted;
//! commands from different callers only get mutual exclusion.

mod registry;
mod session;

pub use registry::{spawn_registry, RegistryHandle, DEFAULT_QUEUE_SIZE};
pub use session::{Session, SessionRef, SessionState};
