//! Server-pushed read-receipt tips.

use serde::{Deserialize, Serialize};

/// A small server-pushed notice that someone read messages.
///
/// When `user_id` is the local user this is an echo of a read action from
/// another device (advance the watermark); otherwise a peer or group
/// member read messages the local user sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceiptTip {
    /// The conversation the receipt applies to.
    pub conversation_id: String,
    /// The user who marked messages as read.
    pub user_id: String,
    /// Watermark: highest seq the user has acknowledged.
    pub has_read_seq: i64,
    /// Optional explicit list of message seqs covered by the receipt.
    pub seqs: Vec<i64>,
    /// Server timestamp of the read action, milliseconds.
    pub read_time: i64,
}

impl ReadReceiptTip {
    /// Creates a watermark-only tip.
    pub fn watermark(
        conversation_id: impl Into<String>,
        user_id: impl Into<String>,
        has_read_seq: i64,
        read_time: i64,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            user_id: user_id.into(),
            has_read_seq,
            seqs: Vec::new(),
            read_time,
        }
    }

    /// Attaches an explicit seq list.
    pub fn with_seqs(mut self, seqs: Vec<i64>) -> Self {
        self.seqs = seqs;
        self
    }
}
