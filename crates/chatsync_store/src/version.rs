//! Version-sync records.
//!
//! A version record maps `(table_name, entity_id)` to an opaque version
//! marker. It is created on the first full sync of a collection, consulted
//! to decide whether a full resync is needed, and deleted when the owning
//! entity is deleted.

use crate::error::StoreResult;
use serde::{Deserialize, Serialize};

/// Persisted version marker for one synced collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Logical table the record belongs to.
    pub table_name: String,
    /// Identifier of the owning entity (e.g. a group ID).
    pub entity_id: String,
    /// Opaque server version marker.
    pub version: String,
}

impl VersionRecord {
    /// Creates a new version record.
    pub fn new(
        table_name: impl Into<String>,
        entity_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            entity_id: entity_id.into(),
            version: version.into(),
        }
    }
}

/// Store operations for version-sync records.
pub trait VersionStore: Send + Sync {
    /// Fetches the version record for `(table_name, entity_id)`, if any.
    fn get_version(&self, table_name: &str, entity_id: &str)
        -> StoreResult<Option<VersionRecord>>;

    /// Creates or replaces a version record.
    fn set_version(&self, record: VersionRecord) -> StoreResult<()>;

    /// Deletes the version record for `(table_name, entity_id)`.
    /// Deleting an absent record is not an error.
    fn delete_version(&self, table_name: &str, entity_id: &str) -> StoreResult<()>;
}
