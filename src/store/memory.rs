//! In-memory [`DocumentStore`] for tests and embedding.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. Status codes mimic what
//! Elasticsearch answers for the same operations.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::error::StoreError;
use crate::models::{DocumentId, StoreOutcome};

use super::{DocumentStore, IndexStatus};

type Key = (String, DocumentId);

/// In-memory store keyed by `(index, id)`.
pub struct MemoryStore {
    docs: RwLock<HashMap<Key, Map<String, Value>>>,
    indices: RwLock<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
            indices: RwLock::new(HashSet::new()),
        }
    }

    /// Current value of `id` in `index`, if any.
    pub fn get(&self, index: &str, id: &DocumentId) -> Option<Map<String, Value>> {
        self.docs
            .read()
            .unwrap()
            .get(&(index.to_string(), id.clone()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.docs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full copy of the stored documents, for state comparisons.
    pub fn snapshot(&self) -> HashMap<Key, Map<String, Value>> {
        self.docs.read().unwrap().clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn put(
        &self,
        index: &str,
        id: &DocumentId,
        doc: &Map<String, Value>,
    ) -> Result<StoreOutcome, StoreError> {
        let previous = self
            .docs
            .write()
            .unwrap()
            .insert((index.to_string(), id.clone()), doc.clone());
        let (status, result) = match previous {
            Some(_) => (200, "updated"),
            None => (201, "created"),
        };
        Ok(StoreOutcome {
            status,
            found: true,
            body: Some(json!({ "_index": index, "_id": id.as_str(), "result": result })),
        })
    }

    async fn delete(&self, index: &str, id: &DocumentId) -> Result<StoreOutcome, StoreError> {
        let removed = self
            .docs
            .write()
            .unwrap()
            .remove(&(index.to_string(), id.clone()));
        let (status, found, result) = match removed {
            Some(_) => (200, true, "deleted"),
            None => (404, false, "not_found"),
        };
        Ok(StoreOutcome {
            status,
            found,
            body: Some(json!({ "_index": index, "_id": id.as_str(), "result": result })),
        })
    }

    async fn create_index(&self, index: &str) -> Result<IndexStatus, StoreError> {
        if self.indices.write().unwrap().insert(index.to_string()) {
            Ok(IndexStatus::Created)
        } else {
            Ok(IndexStatus::AlreadyExists)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc_id::derive;

    fn doc(v: i64) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("v".to_string(), json!(v));
        m
    }

    #[tokio::test]
    async fn put_replaces_whole_document() {
        let store = MemoryStore::new();
        let id = derive("public", "t", &["1"]).unwrap();
        let mut first = doc(1);
        first.insert("extra".to_string(), json!("gone"));
        assert_eq!(store.put("db", &id, &first).await.unwrap().status, 201);
        assert_eq!(store.put("db", &id, &doc(2)).await.unwrap().status, 200);
        assert_eq!(store.get("db", &id), Some(doc(2)));
    }

    #[tokio::test]
    async fn delete_absent_is_ok() {
        let store = MemoryStore::new();
        let id = derive("public", "t", &["1"]).unwrap();
        let outcome = store.delete("db", &id).await.unwrap();
        assert!(!outcome.found);
        assert_eq!(outcome.status, 404);
    }

    #[tokio::test]
    async fn indices_are_scoped() {
        let store = MemoryStore::new();
        let id = derive("public", "t", &["1"]).unwrap();
        store.put("a", &id, &doc(1)).await.unwrap();
        assert!(store.get("b", &id).is_none());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn create_index_is_idempotent() {
        let store = MemoryStore::new();
        assert_eq!(store.create_index("db").await.unwrap(), IndexStatus::Created);
        assert_eq!(
            store.create_index("db").await.unwrap(),
            IndexStatus::AlreadyExists
        );
    }
}
