//! sigrelay CLI
//!
//! Push messages to a sigrelay server and stream them back.

use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use sigrelay_cli::commands::{self, Command, ReceiveEnd};
use sigrelay_cli::connection::{ConnectionConfig, RelayConnection};
use sigrelay_core::tracing_init::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "sigrelay")]
#[command(version, about = "sigrelay client - send and receive relayed messages", long_about = None)]
struct Cli {
    /// Relay address
    #[arg(long, env = "SIGRELAY_URL", default_value = "http://127.0.0.1:50051")]
    addr: String,

    /// Connection timeout in seconds
    #[arg(long, default_value_t = 5)]
    connect_timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Logs on stderr, quiet by default so stdout carries only messages.
    init_tracing("sigrelay=warn,sigrelay_cli=warn", false);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting sigrelay CLI");

    let config = ConnectionConfig {
        addr: cli.addr,
        connect_timeout: Duration::from_secs(cli.connect_timeout),
        ..Default::default()
    };
    let mut conn = RelayConnection::connect(&config).await?;
    let mut out = io::stdout();

    let end = tokio::select! {
        result = commands::run(cli.command, &mut conn, &mut out) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted by Ctrl+C");
            None
        }
    };

    if end == Some(ReceiveEnd::Interrupted) {
        let _ = writeln!(io::stderr(), "Stream interrupted by relay");
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}
