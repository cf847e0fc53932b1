//! Error types for the engine.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur during reconciliation or pooled tasks.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A persistence call failed during a pass.
    #[error("store error: {0}")]
    Store(#[from] chatsync_store::StoreError),

    /// A server page fetch failed.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// A submitted task failed.
    #[error("task failed: {0}")]
    Task(String),
}

impl EngineError {
    /// Creates a fetch error.
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch(message.into())
    }

    /// Creates a task error.
    pub fn task(message: impl Into<String>) -> Self {
        Self::Task(message.into())
    }
}
