//! Relay connection client.
//!
//! Manages the gRPC connection to a sigrelay server.

use std::time::Duration;

use thiserror::Error;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Request, Status, Streaming};
use tracing::{debug, info};

use sigrelay_proto::v1::signaling_service_client::SignalingServiceClient;
use sigrelay_proto::v1::{Empty, MessageRequest, MessageResponse};

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Relay address, e.g. `http://127.0.0.1:50051`.
    pub addr: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Timeout for unary requests. Drain streams are never timed out.
    pub request_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            addr: "http://127.0.0.1:50051".to_string(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Invalid relay address {addr}: {source}")]
    InvalidAddress {
        addr: String,
        source: tonic::transport::Error,
    },

    #[error("Failed to connect to relay: {0}")]
    Connect(#[source] tonic::transport::Error),

    #[error("Relay call failed: {}", .0.message())]
    Rpc(#[from] Status),
}

/// Check if a gRPC status means the stream was cut off rather than failed:
/// the relay interrupted it (`CANCELLED`) or the transport went away.
///
/// The substring checks cover transport drops that surface as
/// `Internal`/`Unknown`; their wording comes from hyper/h2 and may change.
pub fn is_stream_interrupted(status: &Status) -> bool {
    match status.code() {
        Code::Cancelled | Code::Unavailable => return true,
        _ => {}
    }

    let msg = status.message();
    msg.contains("h2 protocol error")
        || msg.contains("broken pipe")
        || msg.contains("connection reset")
}

/// Connected `SignalingService` client.
pub struct RelayConnection {
    client: SignalingServiceClient<Channel>,
    request_timeout: Duration,
}

impl RelayConnection {
    /// Connect to the relay described by `config`.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, ConnectionError> {
        let endpoint = Endpoint::from_shared(config.addr.clone())
            .map_err(|source| ConnectionError::InvalidAddress {
                addr: config.addr.clone(),
                source,
            })?
            .connect_timeout(config.connect_timeout);

        let channel = endpoint.connect().await.map_err(ConnectionError::Connect)?;
        info!(addr = %config.addr, "Connected to relay");

        Ok(Self {
            client: SignalingServiceClient::new(channel),
            request_timeout: config.request_timeout,
        })
    }

    /// Push a message, returning the relay's acknowledgment text.
    pub async fn send(&mut self, content: &str) -> Result<String, ConnectionError> {
        let mut request = Request::new(MessageRequest {
            content: content.to_string(),
        });
        request.set_timeout(self.request_timeout);

        let ack = self.client.send_message(request).await?;
        let ack = ack.into_inner().content;
        debug!(ack = %ack, "Message acknowledged");
        Ok(ack)
    }

    /// Open a drain stream.
    pub async fn receive(&mut self) -> Result<Streaming<MessageResponse>, ConnectionError> {
        Ok(self.client.receive_messages(Empty {}).await?.into_inner())
    }
}
