use std::time::Duration;

use clap::Parser;
use parley::prelude::*;
use parley::DEFAULT_PORT;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "parley", about = "Parley: WebSocket chat relay", version)]
struct Cli {
    /// Interface to listen on.
    #[arg(long, env = "PARLEY_BIND", default_value = "0.0.0.0")]
    bind: String,

    /// TCP port for the HTTP listener.
    #[arg(long, env = "PARLEY_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Close chat sessions that send nothing for this many seconds.
    #[arg(long, env = "PARLEY_IDLE_TIMEOUT_SECS")]
    idle_timeout_secs: Option<u64>,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, env = "PARLEY_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind_addr: format!("{}:{}", self.bind, self.port),
            idle_timeout: self.idle_timeout_secs.map(Duration::from_secs),
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), ParleyError> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    let server = ParleyServer::builder()
        .config(cli.server_config())
        .build()
        .await?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = ?server.local_addr().ok(),
        "parley starting"
    );

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            tracing::info!("Ctrl-C received");
        })
        .await
}
