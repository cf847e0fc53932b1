//! Error types for the connection manager.

use chatsync_proto::ProtoError;
use thiserror::Error;

/// Result type for connection operations.
pub type ConnResult<T> = Result<T, ConnError>;

/// Errors that can occur while managing the connection.
#[derive(Error, Debug)]
pub enum ConnError {
    /// Connect failed for an authentication reason; terminal per session.
    #[error("fatal auth failure (code {code}): {message}")]
    FatalAuth {
        /// Server status code.
        code: u32,
        /// Server-supplied failure message.
        message: String,
    },

    /// The session was displaced by a newer login; terminal per session.
    #[error("kicked offline")]
    KickedOffline,

    /// Connect failed transiently; the caller's policy may retry.
    #[error("connect failed (code {code:?}): {message}")]
    ConnectFailed {
        /// Server status code, if any.
        code: Option<u32>,
        /// Failure message.
        message: String,
    },

    /// An operation was attempted from a terminal state.
    #[error("connection is in terminal state {state}")]
    Terminal {
        /// The terminal state name.
        state: &'static str,
    },

    /// No live connection.
    #[error("not connected")]
    NotConnected,

    /// Frame encoding failed (including oversized frames).
    #[error(transparent)]
    Frame(#[from] ProtoError),

    /// The transport failed mid-session (write or heartbeat).
    #[error("transport error: {0}")]
    Transport(String),
}

impl ConnError {
    /// Returns true when the caller's reconnection policy may retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            ConnError::ConnectFailed { .. }
            | ConnError::NotConnected
            | ConnError::Transport(_) => true,
            ConnError::FatalAuth { .. }
            | ConnError::KickedOffline
            | ConnError::Terminal { .. }
            | ConnError::Frame(_) => false,
        }
    }
}
