//! In-memory store.
//!
//! Backs tests and lightweight embeddings. All collections live behind
//! `parking_lot` locks; operations mirror what a persisted backend would
//! expose, including upsert semantics for version records and saturating
//! unread decrements.

use crate::error::{StoreError, StoreResult};
use crate::model::{Conversation, Group, GroupMember, GroupRequest, Message, MessageStatus};
use crate::store::{GroupStore, ReadStore};
use crate::version::{VersionRecord, VersionStore};
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory implementation of every store trait.
#[derive(Default)]
pub struct MemoryStore {
    groups: RwLock<HashMap<String, Group>>,
    members: RwLock<HashMap<(String, String), GroupMember>>,
    requests: RwLock<HashMap<(String, String), GroupRequest>>,
    conversations: RwLock<HashMap<String, Conversation>>,
    /// Messages per conversation, unordered; readers sort by seq.
    messages: RwLock<HashMap<String, Vec<Message>>>,
    versions: RwLock<HashMap<(String, String), VersionRecord>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn visible(message: &Message) -> bool {
        message.status != MessageStatus::Deleted
    }

    fn sorted_by_seq(mut messages: Vec<Message>) -> Vec<Message> {
        messages.sort_by_key(|m| m.seq);
        messages
    }
}

impl GroupStore for MemoryStore {
    fn groups(&self) -> StoreResult<Vec<Group>> {
        Ok(self.groups.read().values().cloned().collect())
    }

    fn group(&self, group_id: &str) -> StoreResult<Option<Group>> {
        Ok(self.groups.read().get(group_id).cloned())
    }

    fn insert_group(&self, group: Group) -> StoreResult<()> {
        let mut groups = self.groups.write();
        if groups.contains_key(&group.group_id) {
            return Err(StoreError::duplicate("group", group.group_id));
        }
        groups.insert(group.group_id.clone(), group);
        Ok(())
    }

    fn update_group(&self, group: Group) -> StoreResult<()> {
        let mut groups = self.groups.write();
        if !groups.contains_key(&group.group_id) {
            return Err(StoreError::not_found("group", group.group_id));
        }
        groups.insert(group.group_id.clone(), group);
        Ok(())
    }

    fn delete_group(&self, group_id: &str) -> StoreResult<()> {
        self.groups
            .write()
            .remove(group_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("group", group_id))
    }

    fn batch_insert_groups(&self, new: Vec<Group>) -> StoreResult<()> {
        let mut groups = self.groups.write();
        for group in new {
            groups.insert(group.group_id.clone(), group);
        }
        Ok(())
    }

    fn delete_all_groups(&self) -> StoreResult<()> {
        self.groups.write().clear();
        Ok(())
    }

    fn group_members(&self, group_id: &str) -> StoreResult<Vec<GroupMember>> {
        Ok(self
            .members
            .read()
            .values()
            .filter(|m| m.group_id == group_id)
            .cloned()
            .collect())
    }

    fn insert_member(&self, member: GroupMember) -> StoreResult<()> {
        let mut members = self.members.write();
        let key = member.key();
        if members.contains_key(&key) {
            return Err(StoreError::duplicate("member", format!("{key:?}")));
        }
        members.insert(key, member);
        Ok(())
    }

    fn update_member(&self, member: GroupMember) -> StoreResult<()> {
        let mut members = self.members.write();
        let key = member.key();
        if !members.contains_key(&key) {
            return Err(StoreError::not_found("member", format!("{key:?}")));
        }
        members.insert(key, member);
        Ok(())
    }

    fn delete_member(&self, group_id: &str, user_id: &str) -> StoreResult<()> {
        self.members
            .write()
            .remove(&(group_id.to_string(), user_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("member", format!("{group_id}/{user_id}")))
    }

    fn batch_insert_members(&self, new: Vec<GroupMember>) -> StoreResult<()> {
        let mut members = self.members.write();
        for member in new {
            members.insert(member.key(), member);
        }
        Ok(())
    }

    fn delete_group_members(&self, group_id: &str) -> StoreResult<()> {
        self.members.write().retain(|_, m| m.group_id != group_id);
        Ok(())
    }

    fn group_requests(&self) -> StoreResult<Vec<GroupRequest>> {
        Ok(self.requests.read().values().cloned().collect())
    }

    fn insert_request(&self, request: GroupRequest) -> StoreResult<()> {
        self.requests
            .write()
            .insert((request.group_id.clone(), request.user_id.clone()), request);
        Ok(())
    }

    fn update_request(&self, request: GroupRequest) -> StoreResult<()> {
        let key = (request.group_id.clone(), request.user_id.clone());
        let mut requests = self.requests.write();
        if !requests.contains_key(&key) {
            return Err(StoreError::not_found("request", format!("{key:?}")));
        }
        requests.insert(key, request);
        Ok(())
    }

    fn delete_request(&self, group_id: &str, user_id: &str) -> StoreResult<()> {
        self.requests
            .write()
            .remove(&(group_id.to_string(), user_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("request", format!("{group_id}/{user_id}")))
    }
}

impl ReadStore for MemoryStore {
    fn conversation(&self, conversation_id: &str) -> StoreResult<Conversation> {
        self.conversations
            .read()
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("conversation", conversation_id))
    }

    fn upsert_conversation(&self, conversation: Conversation) -> StoreResult<()> {
        self.conversations
            .write()
            .insert(conversation.conversation_id.clone(), conversation);
        Ok(())
    }

    fn unread_messages(&self, conversation_id: &str) -> StoreResult<Vec<Message>> {
        let messages = self.messages.read();
        let unread = messages
            .get(conversation_id)
            .map(|msgs| {
                msgs.iter()
                    .filter(|m| Self::visible(m) && !m.is_read)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self::sorted_by_seq(unread))
    }

    fn messages_by_ids(&self, conversation_id: &str, ids: &[String]) -> StoreResult<Vec<Message>> {
        let messages = self.messages.read();
        let found = messages
            .get(conversation_id)
            .map(|msgs| {
                msgs.iter()
                    .filter(|m| ids.contains(&m.client_msg_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self::sorted_by_seq(found))
    }

    fn messages_by_seqs(&self, conversation_id: &str, seqs: &[i64]) -> StoreResult<Vec<Message>> {
        let messages = self.messages.read();
        let found = messages
            .get(conversation_id)
            .map(|msgs| {
                msgs.iter()
                    .filter(|m| seqs.contains(&m.seq))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self::sorted_by_seq(found))
    }

    fn max_seq(&self, conversation_id: &str) -> StoreResult<i64> {
        Ok(self
            .messages
            .read()
            .get(conversation_id)
            .and_then(|msgs| msgs.iter().filter(|m| Self::visible(m)).map(|m| m.seq).max())
            .unwrap_or(0))
    }

    fn peer_max_seq(&self, conversation_id: &str, local_user_id: &str) -> StoreResult<i64> {
        Ok(self
            .messages
            .read()
            .get(conversation_id)
            .and_then(|msgs| {
                msgs.iter()
                    .filter(|m| Self::visible(m) && m.send_id != local_user_id)
                    .map(|m| m.seq)
                    .max()
            })
            .unwrap_or(0))
    }

    fn mark_messages_read(&self, conversation_id: &str, ids: &[String]) -> StoreResult<u32> {
        let mut messages = self.messages.write();
        let mut flipped = 0;
        if let Some(msgs) = messages.get_mut(conversation_id) {
            for msg in msgs.iter_mut() {
                if !msg.is_read && ids.contains(&msg.client_msg_id) {
                    msg.is_read = true;
                    flipped += 1;
                }
            }
        }
        Ok(flipped)
    }

    fn mark_read_by_seqs(&self, conversation_id: &str, seqs: &[i64]) -> StoreResult<u32> {
        let mut messages = self.messages.write();
        let mut flipped = 0;
        if let Some(msgs) = messages.get_mut(conversation_id) {
            for msg in msgs.iter_mut() {
                if !msg.is_read && seqs.contains(&msg.seq) {
                    msg.is_read = true;
                    flipped += 1;
                }
            }
        }
        Ok(flipped)
    }

    fn decr_unread(&self, conversation_id: &str, by: u32) -> StoreResult<()> {
        let mut conversations = self.conversations.write();
        let conversation = conversations
            .get_mut(conversation_id)
            .ok_or_else(|| StoreError::not_found("conversation", conversation_id))?;
        conversation.unread_count = conversation.unread_count.saturating_sub(by);
        Ok(())
    }

    fn set_has_read_seq(&self, conversation_id: &str, has_read_seq: i64) -> StoreResult<()> {
        let mut conversations = self.conversations.write();
        let conversation = conversations
            .get_mut(conversation_id)
            .ok_or_else(|| StoreError::not_found("conversation", conversation_id))?;
        // Watermarks never move backwards.
        if has_read_seq > conversation.has_read_seq {
            conversation.has_read_seq = has_read_seq;
        }
        Ok(())
    }

    fn update_message(&self, message: Message) -> StoreResult<()> {
        let mut messages = self.messages.write();
        let msgs = messages
            .get_mut(&message.conversation_id)
            .ok_or_else(|| StoreError::not_found("conversation", &message.conversation_id))?;
        let slot = msgs
            .iter_mut()
            .find(|m| m.client_msg_id == message.client_msg_id)
            .ok_or_else(|| StoreError::not_found("message", &message.client_msg_id))?;
        *slot = message;
        Ok(())
    }

    fn insert_message(&self, message: Message) -> StoreResult<()> {
        let mut messages = self.messages.write();
        let msgs = messages.entry(message.conversation_id.clone()).or_default();
        if msgs.iter().any(|m| m.client_msg_id == message.client_msg_id) {
            return Err(StoreError::duplicate("message", message.client_msg_id));
        }
        msgs.push(message);
        Ok(())
    }

    fn total_unread(&self) -> StoreResult<u32> {
        Ok(self
            .conversations
            .read()
            .values()
            .map(|c| c.unread_count)
            .sum())
    }
}

impl VersionStore for MemoryStore {
    fn get_version(
        &self,
        table_name: &str,
        entity_id: &str,
    ) -> StoreResult<Option<VersionRecord>> {
        Ok(self
            .versions
            .read()
            .get(&(table_name.to_string(), entity_id.to_string()))
            .cloned())
    }

    fn set_version(&self, record: VersionRecord) -> StoreResult<()> {
        self.versions.write().insert(
            (record.table_name.clone(), record.entity_id.clone()),
            record,
        );
        Ok(())
    }

    fn delete_version(&self, table_name: &str, entity_id: &str) -> StoreResult<()> {
        self.versions
            .write()
            .remove(&(table_name.to_string(), entity_id.to_string()));
        Ok(())
    }
}
