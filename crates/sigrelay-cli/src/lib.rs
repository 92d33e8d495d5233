//! sigrelay CLI Library
//!
//! Command-line client for a sigrelay server: push messages and stream
//! them back.

pub mod commands;
pub mod connection;
