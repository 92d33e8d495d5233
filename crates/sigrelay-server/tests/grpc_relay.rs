#![allow(clippy::unwrap_used, clippy::expect_used)] // Integration tests use unwrap for brevity

//! End-to-end tests: a real server on a loopback socket, driven through the
//! generated tonic client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tonic::Code;
use tonic::transport::Channel;
use tonic_health::pb::HealthCheckRequest;
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;

use sigrelay_proto::SIGNALING_SERVICE_NAME;
use sigrelay_proto::v1::signaling_service_client::SignalingServiceClient;
use sigrelay_proto::v1::{Empty, MessageRequest};
use sigrelay_server::{GrpcServer, MessageQueue, ServerConfig, ServerError};

const POLL: Duration = Duration::from_millis(100);

struct TestRelay {
    addr: SocketAddr,
    queue: Arc<MessageQueue>,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<Result<(), ServerError>>,
}

impl TestRelay {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let config = ServerConfig::tcp(addr).with_poll_interval(POLL);
        let server = GrpcServer::new(config, shutdown_rx);
        let queue = Arc::clone(server.queue());
        let handle = tokio::spawn(server.serve_with_listener(listener));
        Self {
            addr,
            queue,
            shutdown,
            handle,
        }
    }

    async fn channel(&self) -> Channel {
        Channel::from_shared(format!("http://{}", self.addr))
            .unwrap()
            .connect()
            .await
            .unwrap()
    }

    async fn client(&self) -> SignalingServiceClient<Channel> {
        SignalingServiceClient::new(self.channel().await)
    }
}

async fn send(client: &mut SignalingServiceClient<Channel>, content: &str) -> String {
    client
        .send_message(MessageRequest {
            content: content.to_string(),
        })
        .await
        .unwrap()
        .into_inner()
        .content
}

#[tokio::test]
async fn send_then_receive_over_the_wire() {
    let relay = TestRelay::start().await;
    let mut client = relay.client().await;

    let mut stream = client
        .receive_messages(Empty {})
        .await
        .unwrap()
        .into_inner();

    assert_eq!(send(&mut client, "a").await, "Message received: a");
    assert_eq!(send(&mut client, "").await, "Message received: ");
    assert_eq!(send(&mut client, "b").await, "Message received: b");

    for expected in ["a", "", "b"] {
        let response = tokio::time::timeout(POLL * 10, stream.message())
            .await
            .expect("no message within the poll window")
            .unwrap()
            .unwrap();
        assert_eq!(response.content, expected);
    }
    assert!(relay.queue.is_empty());
}

#[tokio::test]
async fn sends_without_a_drain_wait_in_the_server_queue() {
    let relay = TestRelay::start().await;
    let mut client = relay.client().await;

    send(&mut client, "first").await;
    send(&mut client, "second").await;

    assert_eq!(relay.queue.len(), 2);
    assert_eq!(relay.queue.pop().as_deref(), Some("first"));
}

#[tokio::test]
async fn separate_clients_share_one_queue() {
    let relay = TestRelay::start().await;
    let mut sender = relay.client().await;
    let mut receiver = relay.client().await;

    send(&mut sender, "offer").await;

    let mut stream = receiver
        .receive_messages(Empty {})
        .await
        .unwrap()
        .into_inner();
    let response = tokio::time::timeout(POLL * 10, stream.message())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(response.content, "offer");
}

#[tokio::test]
async fn health_reports_signaling_service_serving() {
    let relay = TestRelay::start().await;
    let mut health = HealthClient::new(relay.channel().await);

    let status = health
        .check(HealthCheckRequest {
            service: SIGNALING_SERVICE_NAME.to_string(),
        })
        .await
        .unwrap()
        .into_inner()
        .status;
    assert_eq!(status, ServingStatus::Serving as i32);
}

#[tokio::test]
async fn shutdown_interrupts_open_streams_and_stops_server() {
    let relay = TestRelay::start().await;
    let mut client = relay.client().await;
    let mut stream = client
        .receive_messages(Empty {})
        .await
        .unwrap()
        .into_inner();

    // Make sure the stream is live before shutting down.
    send(&mut client, "ping").await;
    let first = tokio::time::timeout(POLL * 10, stream.message())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(first.content, "ping");

    relay.shutdown.send(true).unwrap();

    let status = tokio::time::timeout(Duration::from_secs(2), stream.message())
        .await
        .expect("stream was not interrupted")
        .unwrap_err();
    assert_eq!(status.code(), Code::Cancelled);

    tokio::time::timeout(Duration::from_secs(5), relay.handle)
        .await
        .expect("server did not stop after shutdown")
        .unwrap()
        .unwrap();
}
