//! sigrelay Protocol Buffers
//!
//! Generated protobuf code for the sigrelay gRPC API.
//!
//! This crate contains:
//! - `SignalingService` for pushing and draining relayed messages
//! - the `MessageRequest`, `MessageResponse` and `Empty` messages

#![allow(clippy::derive_partial_eq_without_eq)]

/// sigrelay v1 API definitions.
///
/// All generated types and services are included here.
pub mod v1 {
    tonic::include_proto!("sigrelay.v1");
}

// Re-export v1 as the default API version for convenience
pub use v1::*;

/// Fully-qualified gRPC service name, as reported by the health service.
pub const SIGNALING_SERVICE_NAME: &str = "sigrelay.v1.SignalingService";
