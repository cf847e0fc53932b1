//! # chatsync connection manager
//!
//! Owns the single active streaming connection of one client instance:
//! connect/reconnect, failure classification, outbound framing with
//! optional compression, and heartbeats.
//!
//! ## Key invariants
//!
//! - One physical connection at a time; a new connect first closes any
//!   existing one under the same exclusive lock that serializes writes
//! - `Failed` and `KickedOffline` are terminal: no reconnect is attempted
//!   from them
//! - Oversized frames are rejected before transmission, never truncated
//! - The manager classifies failures; the caller owns the retry policy

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod manager;
mod transport;

pub use config::ConnConfig;
pub use error::{ConnError, ConnResult};
pub use manager::{ConnListener, ConnManager, ConnState, SyncSignal};
pub use transport::{Connection, DialFailure, Dialer, MockConnState, MockConnection, MockDialer};
