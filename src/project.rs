//! Idempotent projection of change events onto the document store.
//!
//! Every event addresses its document by an identifier derived from the row
//! key alone, so applying an event twice leaves the store exactly as applying
//! it once. Upserts replace the whole document; deletes of missing documents
//! succeed. There is no version check: the last applied write for an id wins.

use std::sync::Arc;

use tracing::debug;

use crate::doc_id;
use crate::error::ProjectError;
use crate::models::{ChangeEvent, StoreOutcome, TableAddress};
use crate::store::DocumentStore;

/// What a successful projection did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Upserted,
    Deleted,
    /// Delete of a document that was already gone.
    AlreadyAbsent,
}

/// Applies change events to a [`DocumentStore`], one write per event.
#[derive(Clone)]
pub struct Projector {
    store: Arc<dyn DocumentStore>,
}

impl Projector {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Applies `event` to the document for its row in `address`.
    ///
    /// The index is the source database name; the document id comes from
    /// [`doc_id::derive`]. Store failures are returned, never retried here.
    pub async fn apply(
        &self,
        event: &ChangeEvent,
        address: &TableAddress,
    ) -> Result<(Applied, StoreOutcome), ProjectError> {
        let id = doc_id::derive(&address.schema, &address.table, &event.row_key)?;
        let index = address.database.as_str();

        match &event.after {
            None => {
                let outcome = self.store.delete(index, &id).await?;
                debug!(index, %id, status = outcome.status, found = outcome.found, "deleted");
                let applied = if outcome.found {
                    Applied::Deleted
                } else {
                    Applied::AlreadyAbsent
                };
                Ok((applied, outcome))
            }
            Some(doc) => {
                let outcome = self.store.put(index, &id, doc).await?;
                debug!(index, %id, status = outcome.status, "upserted");
                Ok((Applied::Upserted, outcome))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;
    use crate::store::MemoryStore;
    use serde_json::{json, Map, Value};

    fn address() -> TableAddress {
        TableAddress {
            database: "shop".to_string(),
            schema: "public".to_string(),
            table: "orders".to_string(),
        }
    }

    fn upsert(key: &str, v: i64) -> ChangeEvent {
        let mut after = Map::new();
        after.insert("id".to_string(), Value::String(key.to_string()));
        after.insert("v".to_string(), json!(v));
        ChangeEvent {
            row_key: vec![key.to_string()],
            after: Some(after),
            updated: None,
        }
    }

    fn delete(key: &str) -> ChangeEvent {
        ChangeEvent {
            row_key: vec![key.to_string()],
            after: None,
            updated: None,
        }
    }

    fn setup() -> (Arc<MemoryStore>, Projector) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), Projector::new(store))
    }

    #[tokio::test]
    async fn applying_twice_equals_applying_once() {
        let (store, projector) = setup();
        let event = upsert("x", 1);

        projector.apply(&event, &address()).await.unwrap();
        let once = store.snapshot();
        projector.apply(&event, &address()).await.unwrap();
        assert_eq!(store.snapshot(), once);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn delete_of_absent_is_noop() {
        let (store, projector) = setup();
        let (applied, outcome) = projector.apply(&delete("nope"), &address()).await.unwrap();
        assert_eq!(applied, Applied::AlreadyAbsent);
        assert!(!outcome.found);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_document() {
        let (store, projector) = setup();
        projector.apply(&upsert("x", 1), &address()).await.unwrap();
        let (applied, _) = projector.apply(&delete("x"), &address()).await.unwrap();
        assert_eq!(applied, Applied::Deleted);
        assert!(store.is_empty());

        let (again, _) = projector.apply(&delete("x"), &address()).await.unwrap();
        assert_eq!(again, Applied::AlreadyAbsent);
    }

    #[tokio::test]
    async fn last_applied_wins_on_redelivery() {
        let (store, projector) = setup();
        projector.apply(&upsert("x", 1), &address()).await.unwrap();
        projector.apply(&upsert("x", 2), &address()).await.unwrap();
        projector.apply(&upsert("x", 1), &address()).await.unwrap();

        let id = doc_id::derive("public", "orders", &["x"]).unwrap();
        let doc = store.get("shop", &id).unwrap();
        assert_eq!(doc["v"], json!(1));
    }

    #[tokio::test]
    async fn empty_key_is_rejected_without_touching_store() {
        let (store, projector) = setup();
        let event = ChangeEvent {
            row_key: Vec::new(),
            after: Some(Map::new()),
            updated: None,
        };
        let err = projector.apply(&event, &address()).await.unwrap_err();
        assert!(matches!(err, ProjectError::InvalidKey(IngestError::InvalidKey)));
        assert!(store.is_empty());
    }
}
