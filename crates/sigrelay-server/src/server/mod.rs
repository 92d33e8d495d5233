//! gRPC server for the sigrelay relay.
//!
//! Wires the shared [`MessageQueue`] into `SignalingService`, adds the
//! standard `grpc.health.v1.Health` service and serves both over TCP until
//! the shutdown signal fires.

mod config;
pub mod drain;
mod signaling_svc;


pub use config::ServerConfig;
pub use drain::{CancelReason, DrainState, STREAM_INTERRUPTED};
pub use signaling_svc::{SignalingServiceImpl, acknowledgment};

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing::info;

use sigrelay_proto::v1::signaling_service_server::SignalingServiceServer;

use crate::queue::MessageQueue;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// gRPC server handle.
pub struct GrpcServer {
    config: ServerConfig,
    queue: Arc<MessageQueue>,
    shutdown: watch::Receiver<bool>,
}

impl GrpcServer {
    /// Create a server with a fresh, empty queue.
    ///
    /// Setting `true` on the channel behind `shutdown` interrupts every open
    /// drain stream and then stops the server gracefully.
    pub fn new(config: ServerConfig, shutdown: watch::Receiver<bool>) -> Self {
        Self::with_queue(config, Arc::new(MessageQueue::new()), shutdown)
    }

    /// Create a server around an existing queue.
    pub const fn with_queue(
        config: ServerConfig,
        queue: Arc<MessageQueue>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            queue,
            shutdown,
        }
    }

    /// Get the shared message queue.
    pub const fn queue(&self) -> &Arc<MessageQueue> {
        &self.queue
    }

    /// Build a `SignalingServiceImpl` backed by this server's queue.
    pub fn signaling_service(&self) -> SignalingServiceImpl {
        SignalingServiceImpl::new(
            Arc::clone(&self.queue),
            self.shutdown.clone(),
            &self.config,
        )
    }

    /// Serve on an already-bound listener until shutdown.
    pub async fn serve_with_listener(self, listener: TcpListener) -> Result<(), ServerError> {
        let local_addr: SocketAddr = listener.local_addr()?;
        let signaling = self.signaling_service();

        let (health_reporter, health_service) = tonic_health::server::health_reporter();
        health_reporter
            .set_serving::<SignalingServiceServer<SignalingServiceImpl>>()
            .await;

        let mut shutdown = self.shutdown.clone();
        let shutdown_signal = async move {
            drain::shutdown_requested(&mut shutdown).await;
            health_reporter
                .set_not_serving::<SignalingServiceServer<SignalingServiceImpl>>()
                .await;
            info!("Shutdown requested, draining connections");
        };

        info!(addr = %local_addr, "Starting gRPC server on TCP");

        Server::builder()
            .http2_keepalive_interval(Some(self.config.keepalive_interval))
            .http2_keepalive_timeout(Some(self.config.keepalive_timeout))
            .add_service(health_service)
            .add_service(SignalingServiceServer::new(signaling))
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown_signal)
            .await?;

        info!(addr = %local_addr, "gRPC server stopped");
        Ok(())
    }
}
