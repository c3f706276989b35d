//! Server configuration.

use std::time::Duration;

use parley_registry::DEFAULT_QUEUE_SIZE;
use parley_transport::Routes;

/// Default TCP port for the listener.
pub const DEFAULT_PORT: u16 = 8080;

/// Settings for a [`ParleyServer`](crate::ParleyServer).
///
/// `ServerConfig::default()` listens on every interface at port 8080,
/// serves chat at `/websocket` and echo at `/echo`, and never times out
/// an idle client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind, `host:port`.
    pub bind_addr: String,

    /// Upgrade paths for the chat and echo endpoints.
    pub routes: Routes,

    /// Capacity of the registry's command queue.
    pub registry_queue_size: usize,

    /// Close a chat session that sends nothing for this long.
    /// `None` waits forever.
    pub idle_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            routes: Routes::default(),
            registry_queue_size: DEFAULT_QUEUE_SIZE,
            idle_timeout: None,
        }
    }
}
