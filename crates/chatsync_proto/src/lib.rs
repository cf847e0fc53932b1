//! # chatsync wire protocol
//!
//! Boundary types shared by the connection manager and the sync layers:
//!
//! - Frame envelope with binary encoding, optional whole-frame gzip
//!   compression and a hard serialized-size ceiling
//! - Connect failure status codes and their classification
//!   (fatal-auth / kicked / transient)
//! - Pagination request/response carriers for server page fetches
//! - Server-pushed read-receipt tip payload
//!
//! This crate deliberately does not prescribe a concrete transport; it only
//! fixes the shapes that any transport choice must satisfy.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod connect;
mod error;
mod frame;
mod page;
mod tip;

pub use connect::{classify, ConnectCode, ConnectParams, FailureClass};
pub use error::{ProtoError, ProtoResult};
pub use frame::{decode_frame, encode_frame, FrameEnvelope, FrameOptions, DEFAULT_MAX_FRAME_LEN};
pub use page::{PageRequest, Paged};
pub use tip::ReadReceiptTip;
