//! In-memory document store backed by a tokio `RwLock`.
//!
//! Suitable for tests and single-process use. Writes hold the lock for the
//! whole read-modify-write, so `mutate_document_if` is trivially atomic.

use super::{Document, DocumentStore, Filter, OrderBy, merge_patch, sort_documents};
use crate::errors::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::trace;

#[derive(Debug, Clone)]
struct StoredDocument {
    /// Insertion sequence, used as the default query order
    seq: u64,
    version: i64,
    data: Value,
}

#[derive(Debug, Default)]
struct Collections {
    next_seq: u64,
    collections: HashMap<String, HashMap<String, StoredDocument>>,
}

/// Process-local store; every collection lives in one map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub async fn len(&self, collection: &str) -> usize {
        self.inner
            .read()
            .await
            .collections
            .get(collection)
            .map_or(0, HashMap::len)
    }

    pub async fn is_empty(&self, collection: &str) -> bool {
        self.len(collection).await == 0
    }
}

fn not_found(collection: &str, id: &str) -> Error {
    Error::NotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn query_collection(
        &self,
        collection: &str,
        filter: &Filter,
        order: Option<&OrderBy>,
    ) -> Result<Vec<Document>> {
        let guard = self.inner.read().await;
        let Some(documents) = guard.collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<(u64, Document)> = documents
            .iter()
            .filter(|(_, stored)| filter.matches(&stored.data))
            .map(|(id, stored)| {
                (
                    stored.seq,
                    Document {
                        id: id.clone(),
                        version: stored.version,
                        data: stored.data.clone(),
                    },
                )
            })
            .collect();
        matched.sort_by_key(|(seq, _)| *seq);

        let mut result: Vec<Document> = matched.into_iter().map(|(_, doc)| doc).collect();
        if let Some(order) = order {
            sort_documents(&mut result, order);
        }
        trace!(collection, count = result.len(), "memory query");
        Ok(result)
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let guard = self.inner.read().await;
        Ok(guard
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|stored| Document {
                id: id.to_string(),
                version: stored.version,
                data: stored.data.clone(),
            }))
    }

    async fn create_document(&self, collection: &str, data: Value) -> Result<String> {
        let mut body = Value::Object(serde_json::Map::new());
        merge_patch(&mut body, data)?;

        let id = uuid::Uuid::new_v4().to_string();
        let mut guard = self.inner.write().await;
        guard.next_seq += 1;
        let seq = guard.next_seq;
        guard
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(
                id.clone(),
                StoredDocument {
                    seq,
                    version: 1,
                    data: body,
                },
            );
        trace!(collection, %id, "memory create");
        Ok(id)
    }

    async fn mutate_document(&self, collection: &str, id: &str, patch: Value) -> Result<()> {
        let mut guard = self.inner.write().await;
        let stored = guard
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| not_found(collection, id))?;

        merge_patch(&mut stored.data, patch)?;
        stored.version += 1;
        Ok(())
    }

    async fn mutate_document_if(
        &self,
        collection: &str,
        id: &str,
        expected_version: i64,
        patch: Value,
    ) -> Result<bool> {
        let mut guard = self.inner.write().await;
        let stored = guard
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| not_found(collection, id))?;

        if stored.version != expected_version {
            trace!(collection, id, expected_version, actual = stored.version, "memory version mismatch");
            return Ok(false);
        }

        let mut data = stored.data.clone();
        merge_patch(&mut data, patch)?;
        stored.data = data;
        stored.version += 1;
        Ok(true)
    }
}
