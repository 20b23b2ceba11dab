//! `rcon-listener` entry point.
//!
//! Connects to an RCON server, logs every server event, and keeps the
//! connection alive with a `serverInfo` heartbeat until Ctrl+C.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ Cli::into_client_config()   -- config file + flag/env overrides
//!  └─ RconClient::connect()       -- first attempt; transient errors fall
//!                                    through to RconClient::reconnect()
//!  └─ ListenUseCase::run()
//!       ├─ event loop      -> LoggingEventHandler
//!       └─ heartbeat loop  -> serverInfo; failure -> reconnect
//! ```

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rcon_client::application::listen::{ListenUseCase, LoggingEventHandler, RconChannel};
use rcon_client::infrastructure::network::RconClient;
use rcon_client::infrastructure::storage::config::{default_config_path, load_config, ClientConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// RCON event listener.
///
/// Command-line flags and environment variables override the config file.
#[derive(Debug, Parser)]
#[command(
    name = "rcon-listener",
    about = "Logs RCON server events and reconnects automatically",
    version
)]
struct Cli {
    /// Path to the TOML config file.
    ///
    /// Defaults to the platform config directory; a missing default file is
    /// not an error.
    #[arg(long, short, env = "RCON_CONFIG")]
    config: Option<PathBuf>,

    /// Hostname or IP address of the RCON server.
    #[arg(long, env = "RCON_HOST")]
    host: Option<String>,

    /// TCP port of the RCON server.
    #[arg(long, env = "RCON_PORT")]
    port: Option<u16>,

    /// RCON password.
    #[arg(long, env = "RCON_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Command and event timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Fail the login if the server refuses to enable events.
    #[arg(long)]
    require_events: bool,
}

impl Cli {
    /// Loads the config file and applies the flag overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit `--config` file does not exist or any
    /// config file cannot be parsed, or if the timeout is zero.
    fn into_client_config(self) -> anyhow::Result<ClientConfig> {
        let mut config = match (&self.config, default_config_path()) {
            (Some(path), _) => {
                if !path.is_file() {
                    bail!("config file not found: {}", path.display());
                }
                load_config(path)
                    .with_context(|| format!("invalid config file {}", path.display()))?
            }
            (None, Some(path)) => load_config(&path)
                .with_context(|| format!("invalid config file {}", path.display()))?,
            (None, None) => ClientConfig::default(),
        };

        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(password) = self.password {
            config.server.password = password;
        }
        if let Some(timeout) = self.timeout {
            config.session.timeout_secs = timeout;
        }
        if self.require_events {
            config.session.require_events_enabled = true;
        }

        if config.session.timeout_secs == 0 {
            bail!("timeout must be at least one second");
        }
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_client_config()?;

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "RCON listener starting, server={}:{}",
        config.server.host, config.server.port
    );

    let client = Arc::new(RconClient::from_config(&config));

    // ── Initial connection ────────────────────────────────────────────────────
    tokio::select! {
        result = establish(&client) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received before connecting");
            return Ok(());
        }
    }

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    // ── Listen until shutdown ─────────────────────────────────────────────────
    let channel: Arc<dyn RconChannel> = Arc::<RconClient>::clone(&client);
    let use_case = ListenUseCase::new(
        channel,
        Arc::new(LoggingEventHandler),
        Duration::from_secs(config.session.heartbeat_interval_secs),
    );
    let outcome = use_case.run(running).await;

    client.disconnect().await;
    outcome.context("listener stopped")?;

    info!("RCON listener stopped");
    Ok(())
}

/// Connects once, falling back to the retry loop for transient failures.
async fn establish(client: &RconClient) -> anyhow::Result<()> {
    match client.connect().await {
        Ok(()) => Ok(()),
        Err(e) if e.is_transient() => {
            warn!("server not reachable yet: {e}; retrying");
            client
                .reconnect()
                .await
                .context("could not connect to the RCON server")
        }
        Err(e) => Err(e).context("could not connect to the RCON server"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
