//! `SignalingService` gRPC implementation.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};
use tracing::{Instrument, debug, info, instrument};

use sigrelay_proto::v1::signaling_service_server::SignalingService;
use sigrelay_proto::v1::{Empty, MessageRequest, MessageResponse};

use crate::queue::MessageQueue;
use crate::server::config::ServerConfig;
use crate::server::drain::{CancelReason, DrainLoop};

type MessageStream =
    Pin<Box<dyn tokio_stream::Stream<Item = Result<MessageResponse, Status>> + Send>>;

/// Acknowledgment returned by `SendMessage`.
pub fn acknowledgment(content: &str) -> String {
    format!("Message received: {content}")
}

#[derive(Clone)]
pub struct SignalingServiceImpl {
    queue: Arc<MessageQueue>,
    shutdown: watch::Receiver<bool>,
    poll_interval: Duration,
    stream_buffer: usize,
    active_streams: Arc<AtomicUsize>,
    next_stream_id: Arc<AtomicU64>,
}

impl SignalingServiceImpl {
    pub fn new(
        queue: Arc<MessageQueue>,
        shutdown: watch::Receiver<bool>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            queue,
            shutdown,
            poll_interval: config.poll_interval,
            stream_buffer: config.stream_buffer.max(1),
            active_streams: Arc::new(AtomicUsize::new(0)),
            next_stream_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub const fn queue(&self) -> &Arc<MessageQueue> {
        &self.queue
    }

    /// Number of `ReceiveMessages` streams whose drain task is still running.
    pub fn active_streams(&self) -> usize {
        self.active_streams.load(Ordering::SeqCst)
    }
}

/// Counts a drain task as active for as long as it is alive.
struct ActiveStreamGuard(Arc<AtomicUsize>);

impl ActiveStreamGuard {
    fn register(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for ActiveStreamGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[tonic::async_trait]
impl SignalingService for SignalingServiceImpl {
    type ReceiveMessagesStream = MessageStream;

    #[instrument(skip(self, request), fields(rpc = "SendMessage"))]
    async fn send_message(
        &self,
        request: Request<MessageRequest>,
    ) -> Result<Response<MessageResponse>, Status> {
        let content = request.into_inner().content;
        let ack = acknowledgment(&content);

        let bytes = content.len();
        self.queue.push(content);
        debug!(bytes, queued = self.queue.len(), "Message queued");

        Ok(Response::new(MessageResponse { content: ack }))
    }

    #[instrument(skip(self, _request), fields(rpc = "ReceiveMessages"))]
    async fn receive_messages(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<Self::ReceiveMessagesStream>, Status> {
        let stream_id = self.next_stream_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.stream_buffer);

        let guard = ActiveStreamGuard::register(&self.active_streams);
        let drain = DrainLoop::new(
            Arc::clone(&self.queue),
            tx,
            self.shutdown.clone(),
            self.poll_interval,
        );

        info!(
            stream_id,
            active = self.active_streams(),
            "Drain stream opened"
        );

        tokio::spawn(
            async move {
                let outcome = drain.run().await;
                drop(guard);
                match outcome.reason {
                    CancelReason::ClientDisconnected => info!(
                        stream_id,
                        delivered = outcome.delivered,
                        "Drain stream closed by client"
                    ),
                    CancelReason::ServerShutdown => info!(
                        stream_id,
                        delivered = outcome.delivered,
                        "Drain stream interrupted by shutdown"
                    ),
                }
            }
            .instrument(tracing::Span::current()),
        );

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }
}
