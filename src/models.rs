//! Core data models used throughout the indexer.
//!
//! These types represent the addressed batches, change events, and document
//! identifiers that flow from the changefeed to the document store.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Logical table a changefeed batch belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableAddress {
    pub database: String,
    pub schema: String,
    pub table: String,
}

impl fmt::Display for TableAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.database, self.schema, self.table)
    }
}

/// One row-level change decoded from a batch.
///
/// `after == None` is a delete of `row_key`; otherwise `after` is the full
/// new value of the row.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub row_key: Vec<String>,
    pub after: Option<Map<String, Value>>,
    /// Changefeed `updated` timestamp, when the feed was created `WITH updated`.
    pub updated: Option<String>,
}

impl ChangeEvent {
    pub fn is_delete(&self) -> bool {
        self.after.is_none()
    }
}

/// Store-safe document identifier derived from a row key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub(crate) fn new(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the document store answered for a single write.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreOutcome {
    /// HTTP-style status code reported by the store.
    pub status: u16,
    /// `false` when a delete targeted a document that did not exist.
    pub found: bool,
    pub body: Option<Value>,
}

/// Aggregate result of ingesting one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    /// `None` when the batch token did not resolve and was ignored.
    pub address: Option<TableAddress>,
    pub events: usize,
    pub upserted: usize,
    pub deleted: usize,
    /// Deletes of documents that were already gone.
    pub absent: usize,
    pub failed: usize,
}

impl IngestSummary {
    /// Summary for a batch whose token was not recognised.
    pub fn ignored() -> Self {
        Self::default()
    }

    pub fn is_ignored(&self) -> bool {
        self.address.is_none()
    }
}
