//! Echo service behind an x402 payment gate.
//!
//! # Usage
//!
//! ```bash
//! # Run with default config (config.toml in current directory)
//! PAY_TO=0xYourWallet cargo run -p gate402-echo --release
//!
//! # Run with a custom config path and port
//! cargo run -p gate402-echo -- --config /path/to/config.toml --port 8080
//!
//! # Configure logging level
//! RUST_LOG=debug cargo run -p gate402-echo
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to TOML configuration file (default: `config.toml`)
//! - `HOST` - Override bind address
//! - `PORT` - Override port
//! - `RUST_LOG` - Log level filter (default: `info`)
//!
//! See [`gate402_echo::config`] for the payment-related variables.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use gate402_echo::{EchoConfig, StartupError, build_gate, router};

/// Command-line arguments; each falls back to an environment variable.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Bind address, overriding the file.
    #[arg(long, env = "HOST")]
    host: Option<IpAddr>,

    /// Port, overriding the file.
    #[arg(long, env = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!("Echo service failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), StartupError> {
    let mut config = EchoConfig::load(&cli.config)?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    let gate = build_gate(&config)?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        facilitator = %gate.facilitator().base_url(),
        wire_format = %gate.wire_format(),
        resource = %gate.resource().url,
        "Loaded configuration"
    );
    for requirement in gate.accepts() {
        tracing::info!(
            scheme = %requirement.scheme,
            network = %requirement.network,
            asset = %requirement.asset,
            amount = %requirement.amount,
            pay_to = %requirement.pay_to,
            "Accepting payment"
        );
    }

    let app = router(gate, &config.resource.path);

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Echo service listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Echo service shut down gracefully");
    Ok(())
}

/// Waits for Ctrl-C or SIGTERM (Unix) to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    () = ctrl_c => tracing::info!("Received Ctrl-C, shutting down..."),
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                ctrl_c.await;
                tracing::info!("Received Ctrl-C, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
        tracing::info!("Received Ctrl-C, shutting down...");
    }
}
