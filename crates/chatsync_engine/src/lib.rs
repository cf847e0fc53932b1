//! # chatsync engine
//!
//! The generic machinery shared by every synced entity kind:
//!
//! - [`Reconciler`]: diffs an authoritative server collection against the
//!   local replica and applies the minimal insert/update/delete set
//! - [`TaskPool`]: fixed-size worker pool with a bounded submission queue,
//!   used to fan out independent per-scope reconciliation passes
//! - [`Notifier`]: per-domain listener registries (group, conversation,
//!   message) owned by one client instance
//!
//! ## Key invariants
//!
//! - Server is authoritative: after a full sync the local key-set equals
//!   the server key-set
//! - The update hook runs unconditionally on every matched key; the hook
//!   decides whether a persisted write is needed
//! - A pass short-circuits on the first error with no rollback; the next
//!   pass converges further
//! - Notifications are emitted only after the persistence call succeeded

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod notify;
mod pool;
mod reconciler;

pub use error::{EngineError, EngineResult};
pub use notify::{
    C2cReadReceipt, ConversationListener, GroupListener, GroupReadReceipt, MessageListener,
    Notifier,
};
pub use pool::TaskPool;
pub use reconciler::{Change, ChangeKind, Reconciler, SyncSummary, SyncTarget};
