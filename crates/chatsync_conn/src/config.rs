//! Configuration for the connection manager.

use chatsync_proto::DEFAULT_MAX_FRAME_LEN;
use std::time::Duration;

/// Configuration for one client's connection.
#[derive(Debug, Clone)]
pub struct ConnConfig {
    /// Server address.
    pub addr: String,
    /// Identifier of the logging-in user.
    pub user_id: String,
    /// Auth token.
    pub token: String,
    /// Platform identifier.
    pub platform_id: u32,
    /// Whether frames are gzip-compressed.
    pub compression: bool,
    /// Maximum serialized frame size.
    pub max_frame_len: usize,
    /// Write deadline for outbound frames and pings.
    pub write_timeout: Duration,
    /// Deadline for one dial attempt.
    pub dial_timeout: Duration,
    /// Inbound read limit applied to a fresh connection.
    pub read_limit: usize,
}

impl ConnConfig {
    /// Creates a configuration with the usual defaults.
    pub fn new(
        addr: impl Into<String>,
        user_id: impl Into<String>,
        token: impl Into<String>,
        platform_id: u32,
    ) -> Self {
        Self {
            addr: addr.into(),
            user_id: user_id.into(),
            token: token.into(),
            platform_id,
            compression: false,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            write_timeout: Duration::from_secs(30),
            dial_timeout: Duration::from_secs(60),
            read_limit: 30 * 1024 * 1024,
        }
    }

    /// Enables or disables frame compression.
    pub fn with_compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the maximum serialized frame size.
    pub fn with_max_frame_len(mut self, max: usize) -> Self {
        self.max_frame_len = max;
        self
    }

    /// Sets the write deadline.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Sets the dial deadline.
    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Sets the inbound read limit.
    pub fn with_read_limit(mut self, limit: usize) -> Self {
        self.read_limit = limit;
        self
    }
}
