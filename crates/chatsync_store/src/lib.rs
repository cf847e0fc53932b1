//! # chatsync local store
//!
//! The data model of the local replica (groups, members, requests,
//! conversations, messages) plus the store traits the sync layers run
//! against, and an in-memory implementation used by tests and
//! lightweight embeddings.
//!
//! The concrete persisted backend (SQL or key-value) is an external
//! collaborator; any backend implementing these traits satisfies the
//! reconciliation and read-tracking contracts.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod model;
mod store;
mod version;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use model::{
    Conversation, ConversationType, Group, GroupMember, GroupReadInfo, GroupRequest, GroupStatus,
    HandleResult, Message, MessageStatus,
};
pub use store::{GroupStore, ReadStore};
pub use version::{VersionRecord, VersionStore};
