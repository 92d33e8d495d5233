//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use sigrelay_core::config::ServerSettings;

/// Floor for the idle poll interval; zero would spin the drain loop.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP bind address.
    pub addr: SocketAddr,

    /// Longest an idle drain stream waits before re-checking the queue.
    /// Never below [`MIN_POLL_INTERVAL`].
    pub poll_interval: Duration,

    /// Capacity of each drain stream's response channel. Always at least 1.
    pub stream_buffer: usize,

    /// HTTP/2 keepalive ping interval.
    pub keepalive_interval: Duration,

    /// HTTP/2 keepalive ping timeout.
    pub keepalive_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&ServerSettings::default())
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            addr: settings.addr,
            poll_interval: settings.poll_interval().max(MIN_POLL_INTERVAL),
            stream_buffer: settings.stream_buffer.max(1),
            keepalive_interval: Duration::from_secs(settings.keepalive_interval_secs),
            keepalive_timeout: Duration::from_secs(settings.keepalive_timeout_secs),
        }
    }
}

impl ServerConfig {
    /// Create a new server config bound to `addr`.
    pub fn tcp(addr: SocketAddr) -> Self {
        Self {
            addr,
            ..Default::default()
        }
    }

    /// Set the idle poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Set the per-stream response buffer (clamped to at least 1).
    #[must_use]
    pub fn with_stream_buffer(mut self, size: usize) -> Self {
        self.stream_buffer = size.max(1);
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.addr.port(), 50051);
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.stream_buffer, 16);
    }

    #[test]
    fn tcp_config() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let config = ServerConfig::tcp(addr);
        assert_eq!(config.addr, addr);
        assert_eq!(config.keepalive_interval, Duration::from_secs(30));
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let config = ServerConfig::default().with_poll_interval(Duration::ZERO);
        assert_eq!(config.poll_interval, MIN_POLL_INTERVAL);
    }

    #[test]
    fn zero_stream_buffer_is_clamped() {
        let config = ServerConfig::default().with_stream_buffer(0);
        assert_eq!(config.stream_buffer, 1);

        let settings = ServerSettings {
            stream_buffer: 0,
            ..Default::default()
        };
        assert_eq!(ServerConfig::from(&settings).stream_buffer, 1);
    }
}
