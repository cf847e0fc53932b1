//! Error types for the client layer.

use chatsync_conn::ConnError;
use chatsync_engine::EngineError;
use chatsync_store::StoreError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the client layer.
#[derive(Error, Debug)]
pub enum ClientError {
    /// A local store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A reconciliation pass or pooled task failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The connection layer failed.
    #[error(transparent)]
    Conn(#[from] ConnError),

    /// The mandatory server read acknowledgement failed.
    #[error("read acknowledgement failed: {0}")]
    Ack(String),
}

impl ClientError {
    /// Creates an acknowledgement error.
    pub fn ack(message: impl Into<String>) -> Self {
        Self::Ack(message.into())
    }
}
