//! rshd: remote-shell server daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!                   ┌──────────────────────────────────────────────────┐
//!                   │                     rshd                         │
//!                   │                                                  │
//!   TCP connect ────┼─▶ net::listener ─▶ admission ─▶ session::launcher┼──▶ session-core
//!                   │      (bounded)      (slot caps)   (own process)  │     process
//!                   │                                                  │
//!   control UDP ────┼─▶ control::wire ─▶ control::trigger ─▶ listener  │
//!                   │      (sentinel)     (policy-gated)     growth    │
//!                   │                                                  │
//!                   │        dispatch loop (single task, no timeout)   │
//!                   │                                                  │
//!                   │  ┌────────────────────────────────────────────┐  │
//!                   │  │            Cross-Cutting Concerns          │  │
//!                   │  │  config │ lifecycle │ observability        │  │
//!                   │  └────────────────────────────────────────────┘  │
//!                   └──────────────────────────────────────────────────┘
//! ```
//!
//! Startup order matters: background re-spawn happens before any runtime
//! exists, signal handling before listeners, the pid-file after the
//! listeners are known good.

use std::path::PathBuf;

use clap::Parser;

use rshd::config::loader::{load_config, ConfigError};
use rshd::config::schema::{DEFAULT_ADDRESS, DEFAULT_PORT};
use rshd::config::validation::validate_config;
use rshd::config::{ListenEntry, ServerConfig};
use rshd::lifecycle::pidfile::PidFile;
use rshd::lifecycle::{daemonize, signals};
use rshd::observability::{logging, metrics};
use rshd::{net, Dispatcher};

#[derive(Parser)]
#[command(name = "rshd")]
#[command(about = "Remote-shell server daemon", long_about = None)]
struct Cli {
    /// Configuration file (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen on this port (repeatable; appended to configured listeners).
    #[arg(short, long)]
    port: Vec<u16>,

    /// Bind address for ports given with --port.
    #[arg(short, long, default_value = DEFAULT_ADDRESS)]
    address: String,

    /// Detach into the background.
    #[arg(short, long)]
    background: bool,

    /// Service-program mode: fd 0 is already the accepted connection.
    #[arg(short, long)]
    inetd: bool,

    /// Pid-file path.
    #[arg(long)]
    pid_file: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    for port in &cli.port {
        config.listeners.push(ListenEntry {
            address: cli.address.clone(),
            port: *port,
        });
    }
    if cli.background {
        config.daemon.background = true;
    }
    if cli.inetd {
        config.daemon.inetd = true;
    }
    if let Some(path) = cli.pid_file {
        config.daemon.pid_file = path;
    }
    if config.listeners.is_empty() {
        config.listeners.push(ListenEntry {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
        });
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    if config.daemon.inetd {
        // Never returns on success: this process becomes the session.
        let error = rshd::session::launcher::exec_service_program(&config.session);
        eprintln!("rshd: failed to exec session handler: {}", error);
        std::process::exit(1);
    }

    if daemonize::respawn_in_background(&config.daemon)? {
        // Foreground parent; the detached child carries on.
        return Ok(());
    }

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rshd starting");
    if config.daemon.background {
        tracing::info!("Running in background");
    } else {
        tracing::info!("Not backgrounding");
    }

    // The dispatch loop is single-tasked by design; a current-thread
    // runtime is all it needs.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config))
}

async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => {
                tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    "Failed to parse metrics address"
                );
            }
        }
    }

    // A daemon that cannot be told to stop must not start.
    let term = signals::install()?;

    let (listeners, control) = net::bind_all(&config).await?;
    tracing::info!(
        addresses = ?listeners.local_addrs(),
        "Listening for connections"
    );

    let pid_file = match PidFile::create(&config.daemon.pid_file) {
        Ok(pid_file) => Some(pid_file),
        Err(e) => {
            tracing::warn!(
                path = %config.daemon.pid_file.display(),
                error = %e,
                "Could not write pid-file"
            );
            None
        }
    };

    Dispatcher::new(config, listeners, control, term, pid_file)
        .run()
        .await;

    tracing::info!("Shutdown complete");
    Ok(())
}
