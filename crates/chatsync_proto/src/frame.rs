//! Frame envelope encoding.
//!
//! Every outbound request and inbound response travels in a single binary
//! envelope. The envelope is bincode-serialized; when compression is
//! enabled the whole serialized envelope is gzip-compressed, and reads
//! apply the exact inverse. A configured maximum serialized size is
//! enforced before compression or transmission.

use crate::error::{ProtoError, ProtoResult};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Default ceiling on the serialized envelope size, in bytes.
pub const DEFAULT_MAX_FRAME_LEN: usize = 51_200;

/// A single request/response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameEnvelope {
    /// Command identifier routing the payload.
    pub command: u32,
    /// Per-attempt operation identifier, carried for tracing.
    pub operation_id: String,
    /// Identifier of the sending user.
    pub sender_id: String,
    /// Opaque serialized payload.
    pub data: Vec<u8>,
}

impl FrameEnvelope {
    /// Creates a new envelope.
    pub fn new(
        command: u32,
        operation_id: impl Into<String>,
        sender_id: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            command,
            operation_id: operation_id.into(),
            sender_id: sender_id.into(),
            data,
        }
    }
}

/// Options governing frame encoding.
#[derive(Debug, Clone, Copy)]
pub struct FrameOptions {
    /// Whether the serialized envelope is gzip-compressed as a whole.
    pub compression: bool,
    /// Maximum serialized envelope size, checked before compression.
    pub max_frame_len: usize,
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            compression: false,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl FrameOptions {
    /// Enables or disables compression.
    pub fn with_compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the maximum serialized frame size.
    pub fn with_max_frame_len(mut self, max: usize) -> Self {
        self.max_frame_len = max;
        self
    }
}

/// Encodes an envelope into wire bytes.
///
/// Returns [`ProtoError::Oversized`] when the serialized envelope exceeds
/// the configured maximum; no partial data is produced in that case.
pub fn encode_frame(envelope: &FrameEnvelope, options: &FrameOptions) -> ProtoResult<Vec<u8>> {
    let serialized =
        bincode::serialize(envelope).map_err(|e| ProtoError::Encode(e.to_string()))?;

    if serialized.len() > options.max_frame_len {
        return Err(ProtoError::Oversized {
            len: serialized.len(),
            max: options.max_frame_len,
        });
    }

    if options.compression {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&serialized)?;
        Ok(encoder.finish()?)
    } else {
        Ok(serialized)
    }
}

/// Decodes wire bytes into an envelope. Exact inverse of [`encode_frame`].
pub fn decode_frame(bytes: &[u8], options: &FrameOptions) -> ProtoResult<FrameEnvelope> {
    let serialized = if options.compression {
        let mut decoder = GzDecoder::new(bytes);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        out
    } else {
        bytes.to_vec()
    };

    bincode::deserialize(&serialized).map_err(|e| ProtoError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(data: Vec<u8>) -> FrameEnvelope {
        FrameEnvelope::new(1003, "op-1", "user-1", data)
    }

    #[test]
    fn roundtrip_uncompressed() {
        let options = FrameOptions::default();
        let env = envelope(vec![1, 2, 3, 4, 5]);

        let bytes = encode_frame(&env, &options).unwrap();
        let decoded = decode_frame(&bytes, &options).unwrap();
        assert_eq!(decoded, env);
    }

    #[test]
    fn roundtrip_compressed_is_byte_identical() {
        let options = FrameOptions::default().with_compression(true);
        let payload: Vec<u8> = (0..2048).map(|i| (i % 251) as u8).collect();
        let env = envelope(payload.clone());

        let bytes = encode_frame(&env, &options).unwrap();
        let decoded = decode_frame(&bytes, &options).unwrap();
        assert_eq!(decoded.data, payload);
        assert_eq!(decoded, env);
    }

    #[test]
    fn compressed_repetitive_payload_shrinks() {
        let options = FrameOptions::default().with_compression(true);
        let env = envelope(vec![0u8; 10_000]);

        let compressed = encode_frame(&env, &options).unwrap();
        let plain = encode_frame(&env, &FrameOptions::default()).unwrap();
        assert!(compressed.len() < plain.len());
    }

    #[test]
    fn oversized_frame_rejected_before_compression() {
        // Compression would shrink this well under the limit; the check
        // applies to the serialized size regardless.
        let options = FrameOptions::default()
            .with_compression(true)
            .with_max_frame_len(64);
        let env = envelope(vec![0u8; 1024]);

        let err = encode_frame(&env, &options).unwrap_err();
        assert!(matches!(err, ProtoError::Oversized { max: 64, .. }));
    }

    #[test]
    fn decode_garbage_fails() {
        let options = FrameOptions::default().with_compression(true);
        assert!(decode_frame(&[0xde, 0xad, 0xbe, 0xef], &options).is_err());
    }
}
