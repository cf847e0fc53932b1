//! Pagination carriers for server page fetches.

use serde::{Deserialize, Serialize};

/// A page fetch request: scope plus pagination cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// The identifier partitioning the fetch (e.g. one group's member list).
    pub scope_id: String,
    /// 1-based page number.
    pub page_number: u32,
    /// Requested page size.
    pub show_number: u32,
}

impl PageRequest {
    /// Creates the first page request for a scope.
    pub fn first(scope_id: impl Into<String>, show_number: u32) -> Self {
        Self {
            scope_id: scope_id.into(),
            page_number: 1,
            show_number,
        }
    }

    /// Advances to the next page.
    pub fn next(&self) -> Self {
        Self {
            scope_id: self.scope_id.clone(),
            page_number: self.page_number + 1,
            show_number: self.show_number,
        }
    }
}

/// A page of entities plus a has-more indicator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paged<T> {
    /// Entities in this page, in server order.
    pub entities: Vec<T>,
    /// Whether further pages exist.
    pub has_more: bool,
}

impl<T> Paged<T> {
    /// Creates a new page.
    pub fn new(entities: Vec<T>, has_more: bool) -> Self {
        Self { entities, has_more }
    }

    /// Creates the final (or only) page.
    pub fn last(entities: Vec<T>) -> Self {
        Self::new(entities, false)
    }

    /// An empty final page.
    pub fn empty() -> Self {
        Self::new(Vec::new(), false)
    }
}
