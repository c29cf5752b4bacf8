#![forbid(unsafe_code)]

//! `exec-bridge`: interactive process execution bridge binary.
//!
//! Bootstraps configuration, the session store, the reaper, and the HTTP
//! transport, then terminates every live session on shutdown.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use exec_bridge::config::GlobalConfig;
use exec_bridge::http::{self, AppState};
use exec_bridge::orchestrator::coordinator::Coordinator;
use exec_bridge::orchestrator::reaper;
use exec_bridge::orchestrator::store::SessionStore;
use exec_bridge::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "exec-bridge", about = "Interactive process execution bridge", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the HTTP bind address.
    #[arg(long)]
    host: Option<IpAddr>,

    /// Override the HTTP port.
    #[arg(long)]
    port: Option<u16>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("exec-bridge bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match args.config {
        Some(ref path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    if let Some(host) = args.host {
        config.http_host = host;
    }
    if let Some(port) = args.port {
        config.http_port = port;
    }
    let config = Arc::new(config);
    info!(
        candidates = config.interpreter.candidates.len(),
        ceiling_ms = config.timeouts.response_ceiling_ms,
        "configuration loaded"
    );

    // ── Session store and coordinator ───────────────────
    let store = Arc::new(SessionStore::new());
    let coordinator = Arc::new(Coordinator::from_config(&config, Arc::clone(&store)));

    // ── Start reaper ────────────────────────────────────
    let ct = CancellationToken::new();
    let reaper_handle = reaper::spawn_reaper(Arc::clone(&store), config.reaper.clone(), ct.clone());
    info!(
        interval_seconds = config.reaper.interval_seconds,
        max_age_seconds = config.reaper.max_age_seconds,
        "reaper started"
    );

    // ── Start HTTP transport ────────────────────────────
    let listener = http::bind(config.bind_addr()).await?;
    let state = Arc::new(AppState {
        coordinator: Arc::clone(&coordinator),
    });
    let http_ct = ct.clone();
    let http_handle = tokio::spawn(async move {
        if let Err(err) = http::serve(state, listener, http_ct).await {
            error!(%err, "http transport failed");
        }
    });

    info!("exec-bridge ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    let _ = tokio::join!(http_handle, reaper_handle);
    let terminated = coordinator.shutdown().await;
    info!(terminated, "exec-bridge shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
