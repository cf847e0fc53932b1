//! Store traits the sync layers run against.

use crate::error::StoreResult;
use crate::model::{Conversation, Group, GroupMember, GroupRequest, Message};

/// Persistence operations for groups, members and join requests.
///
/// The reconciliation targets in the client crate persist through this
/// trait; any backend implementing it can host a full entity sync.
pub trait GroupStore: Send + Sync {
    /// All locally known joined groups.
    fn groups(&self) -> StoreResult<Vec<Group>>;
    /// Fetches one group.
    fn group(&self, group_id: &str) -> StoreResult<Option<Group>>;
    /// Inserts a group.
    fn insert_group(&self, group: Group) -> StoreResult<()>;
    /// Replaces a group by its ID.
    fn update_group(&self, group: Group) -> StoreResult<()>;
    /// Deletes a group.
    fn delete_group(&self, group_id: &str) -> StoreResult<()>;
    /// Inserts many groups in one write.
    fn batch_insert_groups(&self, groups: Vec<Group>) -> StoreResult<()>;
    /// Deletes every locally known group.
    fn delete_all_groups(&self) -> StoreResult<()>;

    /// All locally known members of a group.
    fn group_members(&self, group_id: &str) -> StoreResult<Vec<GroupMember>>;
    /// Inserts a member.
    fn insert_member(&self, member: GroupMember) -> StoreResult<()>;
    /// Replaces a member by `(group_id, user_id)`.
    fn update_member(&self, member: GroupMember) -> StoreResult<()>;
    /// Deletes a member.
    fn delete_member(&self, group_id: &str, user_id: &str) -> StoreResult<()>;
    /// Inserts many members in one write.
    fn batch_insert_members(&self, members: Vec<GroupMember>) -> StoreResult<()>;
    /// Deletes all members of a group.
    fn delete_group_members(&self, group_id: &str) -> StoreResult<()>;

    /// All locally known join requests.
    fn group_requests(&self) -> StoreResult<Vec<GroupRequest>>;
    /// Inserts a join request.
    fn insert_request(&self, request: GroupRequest) -> StoreResult<()>;
    /// Replaces a join request by `(group_id, user_id)`.
    fn update_request(&self, request: GroupRequest) -> StoreResult<()>;
    /// Deletes a join request.
    fn delete_request(&self, group_id: &str, user_id: &str) -> StoreResult<()>;
}

/// Persistence operations the read-state tracker needs.
pub trait ReadStore: Send + Sync {
    /// Fetches a conversation; `NotFound` when absent.
    fn conversation(&self, conversation_id: &str) -> StoreResult<Conversation>;

    /// Creates or replaces a conversation.
    fn upsert_conversation(&self, conversation: Conversation) -> StoreResult<()>;

    /// Messages of a conversation not yet marked read, ascending by seq.
    /// Tombstoned messages are excluded.
    fn unread_messages(&self, conversation_id: &str) -> StoreResult<Vec<Message>>;

    /// Messages with the given client message IDs, ascending by seq.
    fn messages_by_ids(&self, conversation_id: &str, ids: &[String]) -> StoreResult<Vec<Message>>;

    /// Messages with the given seqs, ascending by seq.
    fn messages_by_seqs(&self, conversation_id: &str, seqs: &[i64]) -> StoreResult<Vec<Message>>;

    /// Highest seq of any visible message in the conversation, 0 when empty.
    fn max_seq(&self, conversation_id: &str) -> StoreResult<i64>;

    /// Highest seq of a visible message not sent by `local_user_id`,
    /// 0 when none.
    fn peer_max_seq(&self, conversation_id: &str, local_user_id: &str) -> StoreResult<i64>;

    /// Flips `is_read` for the given message IDs. Returns how many messages
    /// actually changed (already-read ones do not count).
    fn mark_messages_read(&self, conversation_id: &str, ids: &[String]) -> StoreResult<u32>;

    /// Flips `is_read` for the given seqs. Returns how many changed.
    fn mark_read_by_seqs(&self, conversation_id: &str, seqs: &[i64]) -> StoreResult<u32>;

    /// Decrements the conversation's unread counter, saturating at zero.
    fn decr_unread(&self, conversation_id: &str, by: u32) -> StoreResult<()>;

    /// Persists a new read watermark.
    fn set_has_read_seq(&self, conversation_id: &str, has_read_seq: i64) -> StoreResult<()>;

    /// Replaces a message (read metadata updates) by its client message ID.
    fn update_message(&self, message: Message) -> StoreResult<()>;

    /// Inserts a message.
    fn insert_message(&self, message: Message) -> StoreResult<()>;

    /// Sum of unread counters across all conversations.
    fn total_unread(&self) -> StoreResult<u32>;
}
