//! Per-conversation read-state tracking.
//!
//! The tracker reconciles three inputs against the local replica: the
//! local user marking messages read, echoes of the user's own reads from
//! other devices, and receipts from peers reading messages the local user
//! sent. The server acknowledgement is the source of truth for the read
//! watermark: it is sent before any local mutation, and its failure aborts
//! the whole action. Local metadata writes after a successful ack are
//! best-effort; failures are logged and the flow continues.

use crate::error::{ClientError, ClientResult};
use chatsync_conn::{ConnManager, Dialer};
use chatsync_engine::{C2cReadReceipt, GroupReadReceipt, Notifier};
use chatsync_proto::{FrameEnvelope, ReadReceiptTip};
use chatsync_store::{ConversationType, Message, ReadStore};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Command identifier for a conversation-level read acknowledgement.
pub const CMD_MARK_CONVERSATION_READ: u32 = 2031;
/// Command identifier for a message-list read acknowledgement.
pub const CMD_MARK_MSGS_READ: u32 = 2032;

/// The mandatory server read acknowledgement.
pub trait ReadAck: Send + Sync {
    /// Acknowledges the conversation as read up to `has_read_seq`.
    fn ack_conversation_read(&self, conversation_id: &str, has_read_seq: i64) -> ClientResult<()>;

    /// Acknowledges an explicit list of message seqs as read.
    fn ack_msgs_read(&self, conversation_id: &str, seqs: &[i64]) -> ClientResult<()>;
}

impl<A: ReadAck> ReadAck for Arc<A> {
    fn ack_conversation_read(&self, conversation_id: &str, has_read_seq: i64) -> ClientResult<()> {
        self.as_ref().ack_conversation_read(conversation_id, has_read_seq)
    }

    fn ack_msgs_read(&self, conversation_id: &str, seqs: &[i64]) -> ClientResult<()> {
        self.as_ref().ack_msgs_read(conversation_id, seqs)
    }
}

#[derive(Serialize, Deserialize)]
struct MarkConversationReadReq {
    conversation_id: String,
    has_read_seq: i64,
}

#[derive(Serialize, Deserialize)]
struct MarkMsgsReadReq {
    conversation_id: String,
    seqs: Vec<i64>,
}

/// Frames read acknowledgements through the connection manager.
pub struct ConnAcker<D: Dialer> {
    conn: Arc<ConnManager<D>>,
    user_id: String,
    op_counter: AtomicU64,
}

impl<D: Dialer> ConnAcker<D> {
    /// Creates an acker sending as `user_id` over `conn`.
    pub fn new(conn: Arc<ConnManager<D>>, user_id: impl Into<String>) -> Self {
        Self {
            conn,
            user_id: user_id.into(),
            op_counter: AtomicU64::new(0),
        }
    }

    fn next_operation_id(&self) -> String {
        let n = self.op_counter.fetch_add(1, Ordering::Relaxed);
        format!("read-{}-{n}", self.user_id)
    }

    fn send(&self, command: u32, payload: &impl Serialize) -> ClientResult<()> {
        let data =
            bincode::serialize(payload).map_err(|e| ClientError::ack(e.to_string()))?;
        let envelope = FrameEnvelope::new(command, self.next_operation_id(), &self.user_id, data);
        self.conn.send(&envelope)?;
        Ok(())
    }
}

impl<D: Dialer> ReadAck for ConnAcker<D> {
    fn ack_conversation_read(&self, conversation_id: &str, has_read_seq: i64) -> ClientResult<()> {
        self.send(
            CMD_MARK_CONVERSATION_READ,
            &MarkConversationReadReq {
                conversation_id: conversation_id.to_string(),
                has_read_seq,
            },
        )
    }

    fn ack_msgs_read(&self, conversation_id: &str, seqs: &[i64]) -> ClientResult<()> {
        self.send(
            CMD_MARK_MSGS_READ,
            &MarkMsgsReadReq {
                conversation_id: conversation_id.to_string(),
                seqs: seqs.to_vec(),
            },
        )
    }
}

/// A scriptable acknowledgement endpoint for tests.
#[derive(Default)]
pub struct MockAcker {
    calls: parking_lot::Mutex<Vec<(String, Vec<i64>)>>,
    fail: parking_lot::Mutex<bool>,
}

impl MockAcker {
    /// Creates an acker that accepts every acknowledgement.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent acknowledgements fail.
    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock() = fail;
    }

    /// Acknowledgements received so far, as `(conversation_id, seqs)`.
    pub fn calls(&self) -> Vec<(String, Vec<i64>)> {
        self.calls.lock().clone()
    }

    fn record(&self, conversation_id: &str, seqs: Vec<i64>) -> ClientResult<()> {
        if *self.fail.lock() {
            return Err(ClientError::ack("scripted failure"));
        }
        self.calls.lock().push((conversation_id.to_string(), seqs));
        Ok(())
    }
}

impl ReadAck for MockAcker {
    fn ack_conversation_read(&self, conversation_id: &str, has_read_seq: i64) -> ClientResult<()> {
        self.record(conversation_id, vec![has_read_seq])
    }

    fn ack_msgs_read(&self, conversation_id: &str, seqs: &[i64]) -> ClientResult<()> {
        self.record(conversation_id, seqs.to_vec())
    }
}

/// Maintains unread counters, read watermarks and receipt propagation.
pub struct ReadStateTracker<S, A> {
    store: Arc<S>,
    acker: A,
    notifier: Arc<Notifier>,
    local_user_id: String,
}

impl<S: ReadStore, A: ReadAck> ReadStateTracker<S, A> {
    /// Creates a tracker for `local_user_id`.
    pub fn new(
        store: Arc<S>,
        acker: A,
        notifier: Arc<Notifier>,
        local_user_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            acker,
            notifier,
            local_user_id: local_user_id.into(),
        }
    }

    /// Marks every unread message of a conversation as read.
    ///
    /// Unread means not yet read and not sent by the local user; when
    /// nothing qualifies the server is not contacted at all. The ack goes
    /// out before any local mutation and its failure aborts the action.
    pub fn mark_conversation_read(&self, conversation_id: &str) -> ClientResult<()> {
        self.store.conversation(conversation_id)?;
        let unread = self.qualifying_unread(self.store.unread_messages(conversation_id)?);
        if unread.is_empty() {
            debug!(conversation_id, "nothing unread, skipping ack");
            return Ok(());
        }

        let max_seq = self.store.max_seq(conversation_id)?;
        let peer_max_seq = self
            .store
            .peer_max_seq(conversation_id, &self.local_user_id)?;
        self.acker.ack_conversation_read(conversation_id, max_seq)?;

        let ids: Vec<String> = unread.iter().map(|m| m.client_msg_id.clone()).collect();
        let flipped = self.flip_read(conversation_id, &ids);
        self.apply_counters(conversation_id, flipped, max_seq);

        // The latest message only becomes "read" when the newest message in
        // the conversation came from a peer; a trailing own-sent message
        // keeps the event quiet.
        self.emit_conversation_events(conversation_id, peer_max_seq == max_seq);
        Ok(())
    }

    /// Marks an explicit set of messages as read.
    ///
    /// Already-read and own-sent messages are filtered out before the
    /// network call, so re-marking is idempotent and costs no server call.
    pub fn mark_messages_read(&self, conversation_id: &str, msg_ids: &[String]) -> ClientResult<()> {
        self.store.conversation(conversation_id)?;
        let qualifying =
            self.qualifying_unread(self.store.messages_by_ids(conversation_id, msg_ids)?);
        if qualifying.is_empty() {
            debug!(conversation_id, "no messages need marking, skipping ack");
            return Ok(());
        }

        let seqs: Vec<i64> = qualifying.iter().map(|m| m.seq).collect();
        self.acker.ack_msgs_read(conversation_id, &seqs)?;

        let ids: Vec<String> = qualifying.iter().map(|m| m.client_msg_id.clone()).collect();
        let watermark = seqs.iter().copied().max().unwrap_or(0);
        let flipped = self.flip_read(conversation_id, &ids);
        self.apply_counters(conversation_id, flipped, watermark);

        let max_seq = self.store.max_seq(conversation_id).unwrap_or(0);
        self.emit_conversation_events(conversation_id, watermark == max_seq);
        Ok(())
    }

    /// Applies a server-pushed read receipt.
    ///
    /// An echo of the local user's own read from another device replays
    /// the watermark advance locally; a peer receipt only updates read
    /// metadata on the local user's sent messages and surfaces a
    /// receipt callback.
    pub fn handle_read_receipt(&self, tip: &ReadReceiptTip) -> ClientResult<()> {
        let conversation = self.store.conversation(&tip.conversation_id)?;
        if tip.user_id == self.local_user_id {
            self.replay_own_read(&tip.conversation_id, conversation.has_read_seq, tip)
        } else {
            self.apply_peer_receipt(
                &tip.conversation_id,
                conversation.group_id,
                conversation.conversation_type,
                tip,
            );
            Ok(())
        }
    }

    fn replay_own_read(
        &self,
        conversation_id: &str,
        prev: i64,
        tip: &ReadReceiptTip,
    ) -> ClientResult<()> {
        let new = tip.has_read_seq;
        if new <= prev {
            warn!(conversation_id, prev, new, "stale read watermark echo");
            return Ok(());
        }

        let seqs: Vec<i64> = (prev + 1..=new).collect();
        let replayed = match self.store.messages_by_seqs(conversation_id, &seqs) {
            Ok(messages) => self.qualifying_unread(messages),
            Err(err) => {
                warn!(conversation_id, error = %err, "replay load failed");
                Vec::new()
            }
        };

        let ids: Vec<String> = replayed.iter().map(|m| m.client_msg_id.clone()).collect();
        let flipped = self.flip_read(conversation_id, &ids);
        self.apply_counters(conversation_id, flipped, new);

        let max_seq = self.store.max_seq(conversation_id).unwrap_or(0);
        self.emit_conversation_events(conversation_id, new == max_seq);
        Ok(())
    }

    fn apply_peer_receipt(
        &self,
        conversation_id: &str,
        group_id: String,
        kind: ConversationType,
        tip: &ReadReceiptTip,
    ) {
        let messages = match self.store.messages_by_seqs(conversation_id, &tip.seqs) {
            Ok(messages) => messages,
            Err(err) => {
                warn!(conversation_id, error = %err, "receipt load failed");
                return;
            }
        };

        let mut msg_ids = Vec::new();
        for mut message in messages {
            // Receipts only apply to messages the local user sent.
            if message.send_id != self.local_user_id {
                continue;
            }
            match kind {
                ConversationType::Single => message.is_read = true,
                ConversationType::Group => {
                    message.group_read.merge_reader(&tip.user_id, tip.read_time);
                }
            }
            let id = message.client_msg_id.clone();
            match self.store.update_message(message) {
                Ok(()) => msg_ids.push(id),
                Err(err) => {
                    warn!(conversation_id, msg_id = %id, error = %err, "receipt update failed")
                }
            }
        }
        if msg_ids.is_empty() {
            return;
        }

        match kind {
            ConversationType::Single => {
                self.notifier.message().on_c2c_read_receipt(&C2cReadReceipt {
                    conversation_id: conversation_id.to_string(),
                    user_id: tip.user_id.clone(),
                    msg_ids,
                    read_time: tip.read_time,
                });
            }
            ConversationType::Group => {
                self.notifier
                    .message()
                    .on_group_read_receipt(&GroupReadReceipt {
                        conversation_id: conversation_id.to_string(),
                        group_id,
                        msg_ids,
                        read_time: tip.read_time,
                    });
            }
        }
    }

    fn qualifying_unread(&self, messages: Vec<Message>) -> Vec<Message> {
        messages
            .into_iter()
            .filter(|m| !m.is_read && m.send_id != self.local_user_id)
            .collect()
    }

    fn flip_read(&self, conversation_id: &str, ids: &[String]) -> u32 {
        match self.store.mark_messages_read(conversation_id, ids) {
            Ok(flipped) => flipped,
            Err(err) => {
                warn!(conversation_id, error = %err, "mark read failed");
                0
            }
        }
    }

    fn apply_counters(&self, conversation_id: &str, flipped: u32, watermark: i64) {
        if let Err(err) = self.store.decr_unread(conversation_id, flipped) {
            warn!(conversation_id, error = %err, "unread decrement failed");
        }
        if let Err(err) = self.store.set_has_read_seq(conversation_id, watermark) {
            warn!(conversation_id, error = %err, "watermark persist failed");
        }
    }

    fn emit_conversation_events(&self, conversation_id: &str, caught_up: bool) {
        if caught_up {
            self.notifier
                .conversation()
                .on_latest_message_changed(conversation_id);
        }
        match self.store.conversation(conversation_id) {
            Ok(conversation) => self
                .notifier
                .conversation()
                .on_conversation_changed(&conversation),
            Err(err) => warn!(conversation_id, error = %err, "conversation reload failed"),
        }
        match self.store.total_unread() {
            Ok(total) => self.notifier.conversation().on_total_unread_changed(total),
            Err(err) => warn!(error = %err, "total unread reload failed"),
        }
    }
}
