//! sigrelay Server
//!
//! gRPC relay that queues pushed messages and streams them back to
//! draining clients.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use sigrelay_core::config::{Config, load_config};
use sigrelay_core::tracing_init::{crate_filter, init_tracing};
use sigrelay_server::{GrpcServer, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "sigrelay-server")]
#[command(version, about = "sigrelay server - gRPC message relay")]
struct Args {
    /// TCP bind address [config: server.addr, env: SIGRELAY_ADDR]
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Path to a JSON config file layered over the global settings file.
    #[arg(long, env = "SIGRELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Longest an idle drain stream waits before re-checking the queue, in
    /// milliseconds [env: SIGRELAY_POLL_INTERVAL_MS]
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Per-stream response buffer [env: SIGRELAY_STREAM_BUFFER]
    #[arg(long)]
    stream_buffer: Option<usize>,

    /// Log level filter (e.g. "info", "debug", "warn") [env: SIGRELAY_LOG_LEVEL]
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON (for structured log aggregation) [env: SIGRELAY_LOG_JSON]
    #[arg(long)]
    log_json: bool,
}

impl Args {
    /// Apply CLI flags on top of the resolved config.
    fn apply(self, config: &mut Config) {
        if let Some(addr) = self.addr {
            config.server.addr = addr;
        }
        if let Some(ms) = self.poll_interval_ms {
            config.server.poll_interval_ms = ms;
        }
        if let Some(size) = self.stream_buffer {
            config.server.stream_buffer = size;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if self.log_json {
            config.logging.json = true;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    args.apply(&mut config);

    init_tracing(
        &crate_filter("sigrelay_server", &config.logging.level),
        config.logging.json,
    );

    let server_config = ServerConfig::from(&config.server);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %server_config.addr,
        poll_interval_ms = config.server.poll_interval_ms,
        stream_buffer = server_config.stream_buffer,
        "Starting sigrelay-server"
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let listener = TcpListener::bind(server_config.addr).await?;
    let server = GrpcServer::new(server_config, shutdown_rx);
    let mut server_handle = tokio::spawn(server.serve_with_listener(listener));

    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    // Notify systemd that the relay is ready to serve (unix only).
    #[cfg(unix)]
    sd_notify::notify(false, &[sd_notify::NotifyState::Ready])?;

    #[cfg(unix)]
    let sigterm_future = sigterm.recv();
    #[cfg(not(unix))]
    let sigterm_future = std::future::pending::<Option<()>>();

    tokio::select! {
        result = &mut server_handle => {
            // Server exited on its own; surface the error if there was one.
            result??;
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
        }
        _ = sigterm_future => {
            info!("Received SIGTERM shutdown signal");
        }
    }

    // Interrupt open drain streams, then wait for the server to wind down.
    let _ = shutdown_tx.send(true);
    server_handle.await??;

    info!("Relay stopped");
    Ok(())
}
