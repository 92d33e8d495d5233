//! sigrelay Server Library
//!
//! Core functionality for the sigrelay relay:
//! - In-memory FIFO message queue shared by all callers
//! - `SignalingService` gRPC implementation (send + streaming drain)
//! - Server wiring with health reporting and graceful shutdown

pub mod queue;
pub mod server;

pub use queue::MessageQueue;
pub use server::{GrpcServer, ServerConfig, ServerError};
