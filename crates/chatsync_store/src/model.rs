//! Local replica entity types.
//!
//! Keys are stable for an entity's lifetime: groups by `group_id`, members
//! by `(group_id, user_id)`, requests by `(group_id, user_id)`,
//! conversations by `conversation_id`, messages by
//! `(conversation_id, client_msg_id)`. The server assigns `seq`
//! monotonically per conversation.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GroupStatus {
    /// Group is active.
    #[default]
    Ok,
    /// Group was dismissed by its owner.
    Dismissed,
}

/// A group the local user has joined.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Group {
    /// Unique group identifier.
    pub group_id: String,
    /// Display name.
    pub group_name: String,
    /// Avatar URL.
    pub face_url: String,
    /// Owner's user identifier.
    pub owner_user_id: String,
    /// Member count as reported by the server.
    pub member_count: u32,
    /// Lifecycle status.
    pub status: GroupStatus,
}

/// A member of a group, keyed by `(group_id, user_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroupMember {
    /// Owning group.
    pub group_id: String,
    /// Member's user identifier.
    pub user_id: String,
    /// In-group nickname.
    pub nickname: String,
    /// Avatar URL.
    pub face_url: String,
    /// Role level (owner/admin/member ordering is server-defined).
    pub role_level: i32,
}

impl GroupMember {
    /// The composite key of this member.
    pub fn key(&self) -> (String, String) {
        (self.group_id.clone(), self.user_id.clone())
    }
}

/// Outcome of a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HandleResult {
    /// Not yet handled.
    #[default]
    Unprocessed,
    /// Approved.
    Agree,
    /// Rejected.
    Refuse,
}

/// A pending or handled request to join a group.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroupRequest {
    /// Target group.
    pub group_id: String,
    /// Applicant.
    pub user_id: String,
    /// Handling outcome.
    pub handle_result: HandleResult,
    /// Free-form request message.
    pub req_msg: String,
}

/// Whether a conversation is peer-to-peer or a group chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConversationType {
    /// Peer-to-peer chat.
    #[default]
    Single,
    /// Group chat.
    Group,
}

/// Per-conversation read state and display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation identifier.
    pub conversation_id: String,
    /// Peer-to-peer or group chat.
    pub conversation_type: ConversationType,
    /// Peer user (single chats).
    pub user_id: String,
    /// Group (group chats).
    pub group_id: String,
    /// Number of messages not yet read by the local user. Never negative.
    pub unread_count: u32,
    /// Watermark: highest seq the local user has acknowledged as read.
    /// Monotonically non-decreasing.
    pub has_read_seq: i64,
    /// Display name.
    pub show_name: String,
    /// Avatar URL.
    pub face_url: String,
    /// Send time of the latest message, milliseconds.
    pub latest_msg_send_time: i64,
}

/// Visibility status of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MessageStatus {
    /// Normal, visible message.
    #[default]
    Normal,
    /// Deleted; retained as a tombstone.
    Deleted,
}

/// Read metadata for group messages: which members have read it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroupReadInfo {
    /// Users who acknowledged the message, deduplicated.
    pub read_user_ids: Vec<String>,
    /// Cached count of `read_user_ids`.
    pub read_count: u32,
    /// Time of the most recent acknowledgement, milliseconds.
    pub read_time: i64,
}

impl GroupReadInfo {
    /// Merges a reader into the set and recomputes the count.
    pub fn merge_reader(&mut self, user_id: &str, read_time: i64) {
        if !self.read_user_ids.iter().any(|u| u == user_id) {
            self.read_user_ids.push(user_id.to_string());
        }
        self.read_count = self.read_user_ids.len() as u32;
        self.read_time = read_time;
    }
}

/// A chat message in the local replica.
///
/// Immutable once persisted except for read metadata and the deletion flag.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// Owning conversation.
    pub conversation_id: String,
    /// Client-side unique identifier.
    pub client_msg_id: String,
    /// Server-assigned, monotonically increasing per-conversation sequence.
    pub seq: i64,
    /// Sender's user identifier.
    pub send_id: String,
    /// Send time, milliseconds.
    pub send_time: i64,
    /// Whether the local user has read this message (peer-to-peer only).
    pub is_read: bool,
    /// Group read metadata.
    pub group_read: GroupReadInfo,
    /// Visibility status.
    pub status: MessageStatus,
}
