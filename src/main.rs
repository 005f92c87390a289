//! Unix Socket Relay Daemon
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────────┐
//!                 │                       SOCKET RELAY                        │
//!                 │                                                           │
//!   Client        │  ┌──────────┐    ┌──────────────┐    ┌────────────────┐  │
//!   ──────────────┼─▶│   net    │───▶│    server    │───▶│      pool      │  │
//!                 │  │ listener │    │ (controller) │    │  slot table +  │  │
//!                 │  └──────────┘    └──────┬───────┘    │ startup cohort │  │
//!                 │                         │ spawn      └────────────────┘  │
//!                 │                         ▼                  ▲ joining    │
//!                 │                 ┌──────────────┐           │            │
//!   Client        │                 │    worker    │───────────┘            │
//!   ◀─────────────┼─────────────────│ relay loop + │◀───────────────────────┼──── Downstream
//!                 │                 │    filter    │────────────────────────┼───▶ Peer
//!                 │                 └──────────────┘                        │
//!                 │                                                           │
//!                 │  Cross-cutting: config, lifecycle (signals/shutdown),     │
//!                 │                 observability (logging/metrics)           │
//!                 └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use socket_relay::config::{resolve_config, ConfigOverrides};
use socket_relay::lifecycle::signals::spawn_signal_handler;
use socket_relay::observability::{logging, metrics};
use socket_relay::pool::DrainResult;
use socket_relay::{RelayServer, Shutdown};

#[derive(Parser)]
#[command(name = "socket-relay")]
#[command(about = "Relay Unix socket connections through a filter to a downstream socket", long_about = None)]
struct Cli {
    /// This entity's listening socket path.
    listen: Option<String>,

    /// The destination socket path.
    downstream: Option<String>,

    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of worker slots.
    #[arg(long)]
    pool_size: Option<usize>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let overrides = ConfigOverrides {
        listen: cli.listen,
        downstream: cli.downstream,
        pool_size: cli.pool_size,
        log_level: cli.log_level,
    };

    // Logging is configured by the file, so config errors go straight to stderr.
    let config = match resolve_config(cli.config.as_deref(), &overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[F] {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init_logging(&config.observability) {
        eprintln!("[E] Failed to initialize logging: {}", e);
    }

    tracing::info!("socket-relay v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = match RelayServer::with_passthrough(config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Refusing to start");
            return ExitCode::FAILURE;
        }
    };

    let listener = match server.bind() {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "Unable to listen");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    let signals = spawn_signal_handler(shutdown.clone());

    let result = server.run(listener, shutdown).await;
    signals.abort();

    match result {
        DrainResult::Complete => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        DrainResult::Timeout { remaining } => {
            tracing::warn!(remaining, "Shutdown finished with workers still running");
            ExitCode::FAILURE
        }
    }
}
