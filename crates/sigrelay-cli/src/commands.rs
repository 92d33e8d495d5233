//! `send` and `receive` subcommands.
//!
//! User-facing output uses writeln! to the given writer (stdout in the
//! binary), one message per line.

use std::io::Write;

use tokio_stream::{Stream, StreamExt};
use tonic::Status;
use tracing::{debug, warn};

use sigrelay_proto::v1::MessageResponse;

use crate::connection::{RelayConnection, is_stream_interrupted};

/// Relay subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Push a message onto the relay queue.
    Send {
        /// Message content (may be empty).
        content: String,
    },
    /// Stream queued messages until stopped.
    Receive {
        /// Exit after this many messages.
        #[arg(short = 'n', long)]
        count: Option<u64>,
    },
}

/// How a `receive` run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveEnd {
    /// The requested number of messages arrived.
    CountReached,
    /// The relay interrupted the stream (e.g. it is shutting down).
    Interrupted,
    /// The stream closed without an error.
    Closed,
}

/// Execute a subcommand.
pub async fn run<W: Write>(
    command: Command,
    conn: &mut RelayConnection,
    out: &mut W,
) -> anyhow::Result<Option<ReceiveEnd>> {
    match command {
        Command::Send { content } => {
            let ack = conn.send(&content).await?;
            writeln!(out, "{ack}")?;
            Ok(None)
        }
        Command::Receive { count } => {
            let mut stream = conn.receive().await?;
            let end = receive_into(&mut stream, count, out).await?;
            Ok(Some(end))
        }
    }
}

/// Copy message contents from `stream` to `out`, one per line.
pub async fn receive_into<S, W>(
    stream: &mut S,
    count: Option<u64>,
    out: &mut W,
) -> anyhow::Result<ReceiveEnd>
where
    S: Stream<Item = Result<MessageResponse, Status>> + Unpin,
    W: Write,
{
    let mut received = 0u64;
    if count == Some(0) {
        return Ok(ReceiveEnd::CountReached);
    }

    while let Some(item) = stream.next().await {
        match item {
            Ok(message) => {
                writeln!(out, "{}", message.content)?;
                out.flush()?;
                received += 1;
                if count.is_some_and(|limit| received >= limit) {
                    debug!(received, "Requested message count reached");
                    return Ok(ReceiveEnd::CountReached);
                }
            }
            Err(status) if is_stream_interrupted(&status) => {
                warn!(
                    received,
                    reason = %status.message(),
                    "Relay interrupted the stream"
                );
                return Ok(ReceiveEnd::Interrupted);
            }
            Err(status) => {
                return Err(anyhow::anyhow!("Receive failed: {}", status.message()));
            }
        }
    }

    Ok(ReceiveEnd::Closed)
}
