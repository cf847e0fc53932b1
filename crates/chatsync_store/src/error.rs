//! Error types for the local store.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The requested entity does not exist.
    #[error("not found: {kind} {id}")]
    NotFound {
        /// Entity kind, e.g. "conversation".
        kind: &'static str,
        /// Entity identifier.
        id: String,
    },

    /// Inserting an entity whose key already exists.
    #[error("duplicate key: {kind} {id}")]
    DuplicateKey {
        /// Entity kind.
        kind: &'static str,
        /// Entity identifier.
        id: String,
    },

    /// Backend-specific failure.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Creates a not-found error.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Creates a duplicate-key error.
    pub fn duplicate(kind: &'static str, id: impl Into<String>) -> Self {
        Self::DuplicateKey {
            kind,
            id: id.into(),
        }
    }
}
