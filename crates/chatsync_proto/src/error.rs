//! Error types for the wire protocol.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtoResult<T> = Result<T, ProtoError>;

/// Errors that can occur while encoding or decoding frames.
#[derive(Error, Debug)]
pub enum ProtoError {
    /// The serialized frame exceeds the configured maximum size.
    ///
    /// This is raised before any compression or transmission attempt;
    /// oversized frames are never truncated or fragmented.
    #[error("frame too large: {len} bytes exceeds maximum {max}")]
    Oversized {
        /// Serialized frame length.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Frame serialization failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// Frame deserialization failed.
    #[error("decode error: {0}")]
    Decode(String),

    /// Compression or decompression failed.
    #[error("compression error: {0}")]
    Compression(#[from] std::io::Error),
}
