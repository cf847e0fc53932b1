//! Listener fan-out.
//!
//! One registry slot per logical domain (group, conversation, message),
//! owned by a single client instance. Registries are created at login and
//! dropped at logout; they are never process-wide, so multiple logical
//! sessions can coexist in one process.

use chatsync_store::{Conversation, Group, GroupMember, GroupRequest};
use parking_lot::RwLock;
use std::sync::Arc;

/// Callbacks for group and membership changes.
///
/// All methods have no-op defaults so hosts override only what they need.
pub trait GroupListener: Send + Sync {
    /// The local user joined a group.
    fn on_joined_group_added(&self, _group: &Group) {}
    /// The local user left or was removed from a group.
    fn on_joined_group_deleted(&self, _group: &Group) {}
    /// Group metadata changed.
    fn on_group_info_changed(&self, _group: &Group) {}
    /// The group was dismissed by its owner.
    fn on_group_dismissed(&self, _group: &Group) {}
    /// A member joined.
    fn on_group_member_added(&self, _member: &GroupMember) {}
    /// A member left or was removed.
    fn on_group_member_deleted(&self, _member: &GroupMember) {}
    /// Member metadata changed.
    fn on_group_member_info_changed(&self, _member: &GroupMember) {}
    /// A join request was created.
    fn on_application_added(&self, _request: &GroupRequest) {}
    /// A join request was approved.
    fn on_application_accepted(&self, _request: &GroupRequest) {}
    /// A join request was rejected.
    fn on_application_rejected(&self, _request: &GroupRequest) {}
}

/// Callbacks for conversation-level changes.
pub trait ConversationListener: Send + Sync {
    /// A conversation's persisted state changed.
    fn on_conversation_changed(&self, _conversation: &Conversation) {}
    /// The reader caught up with the conversation's latest message.
    fn on_latest_message_changed(&self, _conversation_id: &str) {}
    /// The total unread count across conversations changed.
    fn on_total_unread_changed(&self, _total: u32) {}
}

/// A peer-to-peer read receipt: a single acknowledging user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct C2cReadReceipt {
    /// The conversation the receipt applies to.
    pub conversation_id: String,
    /// The acknowledging peer.
    pub user_id: String,
    /// Messages covered by the receipt.
    pub msg_ids: Vec<String>,
    /// Read time, milliseconds.
    pub read_time: i64,
}

/// A group read receipt: reader lists accumulate per message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupReadReceipt {
    /// The conversation the receipt applies to.
    pub conversation_id: String,
    /// The group the conversation belongs to.
    pub group_id: String,
    /// Messages covered by the receipt.
    pub msg_ids: Vec<String>,
    /// Read time, milliseconds.
    pub read_time: i64,
}

/// Callbacks for message-level changes.
pub trait MessageListener: Send + Sync {
    /// A peer read messages the local user sent.
    fn on_c2c_read_receipt(&self, _receipt: &C2cReadReceipt) {}
    /// Group members read messages the local user sent.
    fn on_group_read_receipt(&self, _receipt: &GroupReadReceipt) {}
}

struct NoopListener;

impl GroupListener for NoopListener {}
impl ConversationListener for NoopListener {}
impl MessageListener for NoopListener {}

/// Per-instance listener registries.
pub struct Notifier {
    group: RwLock<Arc<dyn GroupListener>>,
    conversation: RwLock<Arc<dyn ConversationListener>>,
    message: RwLock<Arc<dyn MessageListener>>,
}

impl Notifier {
    /// Creates a notifier with no-op listeners in every slot.
    pub fn new() -> Self {
        Self {
            group: RwLock::new(Arc::new(NoopListener)),
            conversation: RwLock::new(Arc::new(NoopListener)),
            message: RwLock::new(Arc::new(NoopListener)),
        }
    }

    /// Replaces the group listener.
    pub fn set_group_listener(&self, listener: Arc<dyn GroupListener>) {
        *self.group.write() = listener;
    }

    /// Replaces the conversation listener.
    pub fn set_conversation_listener(&self, listener: Arc<dyn ConversationListener>) {
        *self.conversation.write() = listener;
    }

    /// Replaces the message listener.
    pub fn set_message_listener(&self, listener: Arc<dyn MessageListener>) {
        *self.message.write() = listener;
    }

    /// The current group listener.
    pub fn group(&self) -> Arc<dyn GroupListener> {
        Arc::clone(&self.group.read())
    }

    /// The current conversation listener.
    pub fn conversation(&self) -> Arc<dyn ConversationListener> {
        Arc::clone(&self.conversation.read())
    }

    /// The current message listener.
    pub fn message(&self) -> Arc<dyn MessageListener> {
        Arc::clone(&self.message.read())
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
