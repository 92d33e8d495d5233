//! Per-stream drain loop behind `ReceiveMessages`.
//!
//! Each open stream owns one `DrainLoop` running on its own task. The loop
//! pops one message at a time and sends it as its own response. While the
//! queue is empty it waits for a push notification, bounded by the poll
//! interval, and watches for client disconnect and server shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tonic::Status;
use tracing::{debug, warn};

use sigrelay_proto::v1::MessageResponse;

use crate::queue::MessageQueue;

/// Message sent as the terminal error when a drain is interrupted.
pub const STREAM_INTERRUPTED: &str = "stream interrupted";

pub type ResponseSender = mpsc::Sender<Result<MessageResponse, Status>>;

/// Lifecycle of a single drain stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainState {
    Polling,
    Cancelled,
    Terminated,
}

impl DrainState {
    /// Whether `self -> next` is a legal transition.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Polling, Self::Polling | Self::Cancelled)
                | (Self::Cancelled, Self::Terminated)
        )
    }
}

/// Why a drain stopped polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The client dropped the stream.
    ClientDisconnected,
    /// The server is shutting down.
    ServerShutdown,
}

/// Summary of a finished drain, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainOutcome {
    pub reason: CancelReason,
    pub delivered: u64,
}

pub struct DrainLoop {
    queue: Arc<MessageQueue>,
    tx: ResponseSender,
    shutdown: watch::Receiver<bool>,
    poll_interval: Duration,
    state: DrainState,
    delivered: u64,
}

impl DrainLoop {
    pub const fn new(
        queue: Arc<MessageQueue>,
        tx: ResponseSender,
        shutdown: watch::Receiver<bool>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            tx,
            shutdown,
            poll_interval,
            state: DrainState::Polling,
            delivered: 0,
        }
    }

    pub const fn state(&self) -> DrainState {
        self.state
    }

    /// Poll until cancelled, then propagate the interruption and release the
    /// stream.
    pub async fn run(mut self) -> DrainOutcome {
        let reason = self.poll().await;
        self.transition(DrainState::Cancelled);

        if reason == CancelReason::ServerShutdown {
            let interrupted = Status::cancelled(STREAM_INTERRUPTED);
            // Ignored if the client is already gone.
            let _ = self.tx.send(Err(interrupted)).await;
        }
        self.transition(DrainState::Terminated);

        DrainOutcome {
            reason,
            delivered: self.delivered,
        }
    }

    async fn poll(&mut self) -> CancelReason {
        loop {
            if *self.shutdown.borrow() {
                return CancelReason::ServerShutdown;
            }

            if let Some(content) = self.queue.pop() {
                if let Err(reason) = self.deliver(content).await {
                    return reason;
                }
                // Keep draining without waiting while messages remain.
                self.transition(DrainState::Polling);
                continue;
            }

            tokio::select! {
                biased;
                () = self.tx.closed() => return CancelReason::ClientDisconnected,
                () = shutdown_requested(&mut self.shutdown) => return CancelReason::ServerShutdown,
                () = self.queue.notified() => {}
                () = tokio::time::sleep(self.poll_interval) => {}
            }
            self.transition(DrainState::Polling);
        }
    }

    /// Send one popped message. A message whose stream goes away mid-send is
    /// dropped, not re-queued.
    async fn deliver(&mut self, content: String) -> Result<(), CancelReason> {
        let response = MessageResponse { content };
        tokio::select! {
            biased;
            sent = self.tx.send(Ok(response)) => match sent {
                Ok(()) => {
                    self.delivered += 1;
                    Ok(())
                }
                Err(_) => {
                    warn!("Client disconnected while a message was in flight, message dropped");
                    Err(CancelReason::ClientDisconnected)
                }
            },
            () = shutdown_requested(&mut self.shutdown) => {
                warn!("Shutdown while a message was in flight, message dropped");
                Err(CancelReason::ServerShutdown)
            }
        }
    }

    fn transition(&mut self, next: DrainState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal drain transition {:?} -> {next:?}",
            self.state
        );
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "Drain state change");
        }
        self.state = next;
    }
}

/// Resolves once the shutdown flag is set. A dropped sender means shutdown
/// can no longer be requested, so the future never resolves in that case.
pub async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let requested = shutdown.wait_for(|stop| *stop).await.is_ok();
    if !requested {
        std::future::pending::<()>().await;
    }
}
