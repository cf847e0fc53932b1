//! # chatsync client layer
//!
//! The pieces scoped to one logged-in user: per-conversation read-state
//! tracking (unread counters, watermarks, receipt propagation), group
//! domain synchronization built on the generic reconciler, and the
//! session object owning listener registries and the connection.
//!
//! ## Key invariants
//!
//! - The server acknowledgement precedes every local read mutation and is
//!   the only failure that aborts a read action
//! - Unread counters decrement by exactly the number of messages the store
//!   actually flipped and never go negative
//! - The "latest message changed" event fires only when the reader has
//!   caught up with the conversation's newest peer message
//! - All listener registries live on the session, never process-wide

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod groups;
mod read_state;
mod session;

pub use error::{ClientError, ClientResult};
pub use groups::{GroupSync, PageFetcher};
pub use read_state::{
    ConnAcker, MockAcker, ReadAck, ReadStateTracker, CMD_MARK_CONVERSATION_READ,
    CMD_MARK_MSGS_READ,
};
pub use session::ClientSession;
