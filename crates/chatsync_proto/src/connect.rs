//! Connect failure status codes and their classification.
//!
//! A failed connect attempt may carry a server-supplied status code. The
//! classification decides whether the session is still eligible for retry:
//! token problems and identity mismatches are fatal per session, a kicked
//! session is terminal with its own callback, and everything else
//! (including the absence of a code) is transient.

use serde::{Deserialize, Serialize};

/// Server-supplied status codes on connect failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum ConnectCode {
    /// The auth token has expired.
    TokenExpired = 1501,
    /// The auth token is invalid.
    TokenInvalid = 1502,
    /// The auth token is malformed.
    TokenMalformed = 1503,
    /// The auth token is not yet valid.
    TokenNotValidYet = 1504,
    /// The auth token failed verification for an unknown reason.
    TokenUnknown = 1505,
    /// The session was kicked by a newer login.
    Kicked = 1506,
    /// The token was issued for a different platform.
    PlatformMismatch = 1507,
    /// The token was issued for a different user.
    UserMismatch = 1508,
}

impl ConnectCode {
    /// Maps a raw status code to a known connect code.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1501 => Some(Self::TokenExpired),
            1502 => Some(Self::TokenInvalid),
            1503 => Some(Self::TokenMalformed),
            1504 => Some(Self::TokenNotValidYet),
            1505 => Some(Self::TokenUnknown),
            1506 => Some(Self::Kicked),
            1507 => Some(Self::PlatformMismatch),
            1508 => Some(Self::UserMismatch),
            _ => None,
        }
    }

    /// Returns the raw status code.
    pub fn code(&self) -> u32 {
        *self as u32
    }
}

/// How a connect failure is treated by the connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Terminal per session; requires re-authentication, never auto-retried.
    FatalAuth,
    /// Terminal per session; a newer login displaced this one.
    Kicked,
    /// Eligible for the caller's reconnection policy.
    Transient,
}

/// Classifies an optional server status code.
///
/// Absent or unrecognized codes are transient.
pub fn classify(code: Option<u32>) -> FailureClass {
    match code.and_then(ConnectCode::from_code) {
        Some(ConnectCode::Kicked) => FailureClass::Kicked,
        Some(_) => FailureClass::FatalAuth,
        None => FailureClass::Transient,
    }
}

/// Query parameters carried by every connect attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    /// Identifier of the logging-in user.
    pub user_id: String,
    /// Auth token.
    pub token: String,
    /// Platform identifier.
    pub platform_id: u32,
    /// Per-attempt operation identifier.
    pub operation_id: String,
    /// Whether the client requests gzip compression.
    pub compression: bool,
}
