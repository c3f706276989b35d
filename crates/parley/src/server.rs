//! `ParleyServer` builder and server loop.
//!
//! This is the entry point for running a Parley relay. It ties together
//! all the layers: transport → protocol → registry → router.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parley_protocol::{Codec, JsonCodec};
use parley_registry::{spawn_registry, RegistryHandle};
use parley_transport::{Routes, WebSocketConnection, WebSocketListener};

use crate::handler::handle_connection;
use crate::router::Router;
use crate::{ParleyError, ServerConfig};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<K> {
    pub(crate) router: Router<WebSocketConnection, K>,
    pub(crate) idle_timeout: Option<Duration>,
}

/// Builder for configuring and starting a Parley server.
///
/// # Example
///
/// ```rust,no_run
/// use parley::prelude::*;
///
/// # async fn start() -> Result<(), ParleyError> {
/// let server = ParleyServer::builder()
///     .bind("127.0.0.1:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct ParleyServerBuilder {
    config: ServerConfig,
}

impl ParleyServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the upgrade paths for the chat and echo endpoints.
    pub fn routes(mut self, routes: Routes) -> Self {
        self.config.routes = routes;
        self
    }

    /// Sets the registry's command queue capacity.
    pub fn registry_queue_size(mut self, size: usize) -> Self {
        self.config.registry_queue_size = size;
        self
    }

    /// Closes chat sessions that stay silent for `timeout`.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = Some(timeout);
        self
    }

    /// Replaces every setting at once.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener and starts the registry, using [`JsonCodec`].
    ///
    /// # Errors
    /// Returns `ParleyError::Transport` if the address can't be bound.
    pub async fn build(self) -> Result<ParleyServer<JsonCodec>, ParleyError> {
        self.build_with_codec(JsonCodec).await
    }

    /// Like [`build`](Self::build) with a caller-supplied codec.
    pub async fn build_with_codec<K: Codec>(
        self,
        codec: K,
    ) -> Result<ParleyServer<K>, ParleyError> {
        let ServerConfig {
            bind_addr,
            routes,
            registry_queue_size,
            idle_timeout,
        } = self.config;

        let listener = WebSocketListener::bind(&bind_addr, routes).await?;
        let registry = spawn_registry(registry_queue_size);

        let state = Arc::new(ServerState {
            router: Router::new(registry, codec),
            idle_timeout,
        });

        Ok(ParleyServer { listener, state })
    }
}

impl Default for ParleyServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Parley relay.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to
/// start accepting connections.
pub struct ParleyServer<K> {
    listener: WebSocketListener,
    state: Arc<ServerState<K>>,
}

impl ParleyServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> ParleyServerBuilder {
        ParleyServerBuilder::new()
    }
}

impl<K: Codec> ParleyServer<K> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle to the server's connection registry.
    pub fn registry(&self) -> &RegistryHandle<WebSocketConnection> {
        self.state.router.registry()
    }

    /// Runs the accept loop forever.
    pub async fn run(self) -> Result<(), ParleyError> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Runs the accept loop until `shutdown` resolves.
    ///
    /// Each accepted socket is upgraded and handled on its own task.
    /// Sessions already running are left alone when the loop stops;
    /// they end when their clients disconnect or the runtime shuts down.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ParleyError>
    where
        F: Future<Output = ()> + Send,
    {
        tracing::info!(addr = ?self.local_addr().ok(), "Parley server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested, no longer accepting");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(pending) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(handle_connection(pending, state));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }
    }
}
