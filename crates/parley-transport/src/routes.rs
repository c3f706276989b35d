//! Maps HTTP upgrade request paths to the service that handles them.

/// The service a connection was upgraded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// The chat relay: sessions, registry, routing.
    Chat,
    /// Diagnostic endpoint that echoes every message back.
    Echo,
}

/// Upgrade paths served by the listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routes {
    /// Path for chat connections. Default `/websocket`.
    pub chat: String,
    /// Path for the echo endpoint, or `None` to disable it.
    /// Default `/echo`.
    pub echo: Option<String>,
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            chat: "/websocket".to_string(),
            echo: Some("/echo".to_string()),
        }
    }
}

impl Routes {
    /// Resolves a request path (without query string) to an endpoint.
    pub fn resolve(&self, path: &str) -> Option<Endpoint> {
        if path == self.chat {
            return Some(Endpoint::Chat);
        }
        match &self.echo {
            Some(echo) if path == echo => Some(Endpoint::Echo),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_default_paths() {
        let routes = Routes::default();
        assert_eq!(routes.resolve("/websocket"), Some(Endpoint::Chat));
        assert_eq!(routes.resolve("/echo"), Some(Endpoint::Echo));
    }

    #[test]
    fn test_resolve_unknown_path_returns_none() {
        let routes = Routes::default();
        assert_eq!(routes.resolve("/"), None);
        assert_eq!(routes.resolve("/websocket/extra"), None);
    }

    #[test]
    fn test_resolve_with_echo_disabled() {
        let routes = Routes {
            echo: None,
            ..Routes::default()
        };
        assert_eq!(routes.resolve("/echo"), None);
        assert_eq!(routes.resolve("/websocket"), Some(Endpoint::Chat));
    }
}
