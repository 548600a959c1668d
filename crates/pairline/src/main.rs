//! # pairline
//!
//! Gateway binary: loads settings, wires the sidecar client factory, the
//! session manager and the HTTP gateway, then runs until a shutdown signal.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use pairline_client::{AuthStore, SidecarClientFactory};
use pairline_runtime::{ManagerConfig, NotificationBus, SessionManager};
use pairline_server::{PairlineServer, ServerConfig};
use pairline_settings::PairlineSettings;

/// Multi-session messaging gateway.
#[derive(Parser, Debug)]
#[command(name = "pairline", about = "Multi-session messaging gateway")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.pairline/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Root directory of per-session credential stores.
    #[arg(long)]
    auth_dir: Option<PathBuf>,

    /// Messaging client executable spawned per session.
    #[arg(long)]
    client_command: Option<String>,

    /// Log filter directive, e.g. `debug` or `pairline_runtime=trace`.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn settings_path(&self) -> PathBuf {
        self.settings
            .clone()
            .unwrap_or_else(pairline_settings::settings_path)
    }

    /// Apply CLI flags over loaded settings.
    fn apply(&self, settings: &mut PairlineSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(dir) = &self.auth_dir {
            settings.sessions.auth_dir = dir.to_string_lossy().into_owned();
        }
        if let Some(command) = &self.client_command {
            settings.client.command.clone_from(command);
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

fn manager_config(settings: &PairlineSettings) -> ManagerConfig {
    ManagerConfig {
        command_buffer: settings.sessions.command_buffer,
        shutdown_timeout: Duration::from_secs(settings.sessions.shutdown_timeout_secs),
    }
}

/// Resolve on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .context("failed to install SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for ctrl-c")?;
                tracing::info!("received Ctrl+C");
            }
            _ = terminate.recv() => tracing::info!("received SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for ctrl-c")?;
        tracing::info!("received Ctrl+C");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = cli.settings_path();
    let mut settings = pairline_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("failed to load settings from {}", settings_path.display()))?;
    cli.apply(&mut settings);

    pairline_core::logging::init_subscriber(&settings.logging.level, settings.logging.format);
    let metrics = pairline_server::metrics::install_recorder()
        .context("failed to install metrics recorder")?;

    let auth_store = AuthStore::new(&settings.sessions.auth_dir);
    ensure_dir(auth_store.root())?;

    let factory = SidecarClientFactory::new(
        settings.client.command.clone(),
        settings.client.args.clone(),
        settings.sessions.event_buffer,
    );
    let manager = Arc::new(SessionManager::new(
        Arc::new(factory),
        auth_store,
        NotificationBus::with_capacity(settings.sessions.bus_capacity),
        manager_config(&settings),
    ));

    let server = PairlineServer::new(
        ServerConfig::from_settings(&settings.server),
        Arc::clone(&manager),
        metrics,
    );
    let addr = server.listen().await.context("failed to bind gateway")?;
    tracing::info!(
        client = settings.client.command.as_str(),
        auth_dir = settings.sessions.auth_dir.as_str(),
        "pairline listening on http://{addr}"
    );

    shutdown_signal().await?;

    tracing::info!("shutting down");
    let timeout = Duration::from_secs(settings.sessions.shutdown_timeout_secs);
    server.shutdown().graceful_shutdown(Some(timeout)).await;
    manager.shutdown().await;
    tracing::info!("shutdown complete");
    Ok(())
}
