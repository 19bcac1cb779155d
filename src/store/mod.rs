//! Document store abstraction.
//!
//! The [`DocumentStore`] trait is the only way the ingestion path touches the
//! search backend, so the backend can be swapped (Elasticsearch over HTTP,
//! in-memory for tests) without changing the projector.
//!
//! Implementations must be `Send + Sync`; one instance is shared by every
//! concurrent request.

pub mod elastic;
pub mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::models::{DocumentId, StoreOutcome};

pub use elastic::ElasticStore;
pub use memory::MemoryStore;

/// Result of an idempotent index provisioning request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    Created,
    AlreadyExists,
}

/// Keyed document store addressed by `(index, id)`.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`put`](DocumentStore::put) | Replace the whole document at `id` |
/// | [`delete`](DocumentStore::delete) | Remove `id`; absent is not an error |
/// | [`create_index`](DocumentStore::create_index) | Provision an index, idempotently |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Writes `doc` as the full new value of `id`. No merge, last write wins.
    async fn put(
        &self,
        index: &str,
        id: &DocumentId,
        doc: &Map<String, Value>,
    ) -> Result<StoreOutcome, StoreError>;

    /// Removes `id`. A missing document yields `Ok` with `found == false`.
    async fn delete(&self, index: &str, id: &DocumentId) -> Result<StoreOutcome, StoreError>;

    async fn create_index(&self, index: &str) -> Result<IndexStatus, StoreError>;
}
