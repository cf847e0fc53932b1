//! Generic entity reconciliation.
//!
//! A [`SyncTarget`] is the capability set a caller supplies once per entity
//! kind: key extraction, persistence hooks, page fetching and change
//! notification. The [`Reconciler`] drives a full sync pass over one scope:
//! load local, fetch all server pages, then apply the minimal
//! insert/update/delete set.
//!
//! A pass is sequential; callers parallelize independent scopes through the
//! task pool. Overlapping passes for the same key are the caller's mistake.

use crate::error::EngineResult;
use chatsync_proto::PageRequest;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use tracing::debug;

/// The kind of change applied to the local replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Entity present on the server but not locally.
    Insert,
    /// Entity present on both sides.
    Update,
    /// Entity present locally but absent from the server.
    Delete,
    /// Whole server sequence inserted in one write (empty-local fast path).
    BatchInsert,
    /// Entire scope removed.
    DeleteAll,
}

/// A change notification, produced and consumed within one pass.
#[derive(Debug, Clone)]
pub enum Change<T> {
    /// A server entity was inserted.
    Insert {
        /// The server value, as persisted.
        server: T,
    },
    /// A matched entity was updated.
    Update {
        /// The server value, as persisted.
        server: T,
        /// The previous local value.
        local: T,
    },
    /// A local entity absent from the server was deleted.
    Delete {
        /// The deleted local value.
        local: T,
    },
    /// The full server sequence was batch-inserted.
    BatchInsert {
        /// The inserted entities, in server order.
        server: Vec<T>,
    },
    /// The whole scope was removed.
    DeleteAll {
        /// The scope that was removed.
        scope_id: String,
    },
}

impl<T> Change<T> {
    /// Returns the kind of this change.
    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::Insert { .. } => ChangeKind::Insert,
            Change::Update { .. } => ChangeKind::Update,
            Change::Delete { .. } => ChangeKind::Delete,
            Change::BatchInsert { .. } => ChangeKind::BatchInsert,
            Change::DeleteAll { .. } => ChangeKind::DeleteAll,
        }
    }
}

/// The capability set supplied once per synced entity kind.
///
/// Persistence hooks return errors to short-circuit the pass; the `notify`
/// hook is called only after the corresponding persistence call succeeded,
/// so pass-level decisions can rely on the already-persisted value.
pub trait SyncTarget: Send + Sync {
    /// The entity type being synced.
    type Entity: Clone;
    /// The entity's stable unique key.
    type Key: Eq + Hash + Clone + fmt::Debug;
    /// One server page of entities.
    type Page;

    /// Extracts the key of an entity.
    fn key(&self, entity: &Self::Entity) -> Self::Key;

    /// Loads the local entities of a scope.
    fn local_entities(&self, scope_id: &str) -> EngineResult<Vec<Self::Entity>>;

    /// Fetches one server page.
    fn fetch_page(&self, request: &PageRequest) -> EngineResult<Self::Page>;

    /// Converts a page into an ordered entity sequence.
    fn page_entities(&self, page: &Self::Page) -> Vec<Self::Entity>;

    /// Whether further pages exist after this one.
    fn page_has_more(&self, page: &Self::Page) -> bool;

    /// Requested page size.
    fn page_size(&self) -> u32 {
        100
    }

    /// Persists a new entity.
    fn insert(&self, entity: &Self::Entity) -> EngineResult<()>;

    /// Persists a matched entity. Called unconditionally for every matched
    /// key; the hook decides whether a write is actually necessary.
    fn update(&self, server: &Self::Entity, local: &Self::Entity) -> EngineResult<()>;

    /// Removes a local entity the server no longer has.
    fn delete(&self, entity: &Self::Entity) -> EngineResult<()>;

    /// Persists the whole server sequence in one write.
    fn batch_insert(&self, entities: &[Self::Entity]) -> EngineResult<()> {
        for entity in entities {
            self.insert(entity)?;
        }
        Ok(())
    }

    /// Removes every entity of a scope.
    fn delete_all(&self, scope_id: &str) -> EngineResult<()>;

    /// Observes a successfully applied change.
    fn notify(&self, change: &Change<Self::Entity>);
}

/// Counts of operations applied by one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Individual inserts applied.
    pub inserted: usize,
    /// Updates applied.
    pub updated: usize,
    /// Deletes applied.
    pub deleted: usize,
    /// Entities written through the batch fast path.
    pub batch_inserted: usize,
}

/// Drives full sync passes for one entity kind.
pub struct Reconciler<T: SyncTarget> {
    target: T,
}

impl<T: SyncTarget> Reconciler<T> {
    /// Creates a reconciler over a target.
    pub fn new(target: T) -> Self {
        Self { target }
    }

    /// The underlying target.
    pub fn target(&self) -> &T {
        &self.target
    }

    /// Runs one full sync pass for a scope.
    ///
    /// The first error from any hook aborts the remaining walk and is
    /// returned; entities already applied stay applied. There is no
    /// rollback; the next pass converges further.
    pub fn full_sync(&self, scope_id: &str) -> EngineResult<SyncSummary> {
        let mut local: HashMap<T::Key, T::Entity> = self
            .target
            .local_entities(scope_id)?
            .into_iter()
            .map(|e| (self.target.key(&e), e))
            .collect();

        let server = self.fetch_all(scope_id)?;
        debug!(
            scope_id,
            local = local.len(),
            server = server.len(),
            "full sync pass"
        );

        let mut summary = SyncSummary::default();

        // Fast path: nothing local, one batch write instead of N inserts.
        if local.is_empty() && !server.is_empty() {
            self.target.batch_insert(&server)?;
            summary.batch_inserted = server.len();
            self.target.notify(&Change::BatchInsert { server });
            return Ok(summary);
        }

        for entity in server {
            let key = self.target.key(&entity);
            match local.remove(&key) {
                None => {
                    self.target.insert(&entity)?;
                    summary.inserted += 1;
                    self.target.notify(&Change::Insert { server: entity });
                }
                Some(previous) => {
                    self.target.update(&entity, &previous)?;
                    summary.updated += 1;
                    self.target.notify(&Change::Update {
                        server: entity,
                        local: previous,
                    });
                }
            }
        }

        // Whatever was not visited exists only locally.
        for (_, entity) in local {
            self.target.delete(&entity)?;
            summary.deleted += 1;
            self.target.notify(&Change::Delete { local: entity });
        }

        Ok(summary)
    }

    /// Removes every entity of a scope and emits one `DeleteAll` change.
    pub fn delete_all(&self, scope_id: &str) -> EngineResult<()> {
        self.target.delete_all(scope_id)?;
        self.target.notify(&Change::DeleteAll {
            scope_id: scope_id.to_string(),
        });
        Ok(())
    }

    fn fetch_all(&self, scope_id: &str) -> EngineResult<Vec<T::Entity>> {
        let mut entities = Vec::new();
        let mut request = PageRequest::first(scope_id, self.target.page_size());
        loop {
            let page = self.target.fetch_page(&request)?;
            entities.extend(self.target.page_entities(&page));
            if !self.target.page_has_more(&page) {
                return Ok(entities);
            }
            request = request.next();
        }
    }
}
