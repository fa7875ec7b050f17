//! In-memory [`DocumentStore`] implementation.
//!
//! Uses a `HashMap` behind a `std::sync::RwLock`; vector search is a
//! brute-force cosine scan over all stored records. Intended for tests and
//! small embedded deployments. The single write lock makes insert/delete
//! for any id trivially linearizable.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{DocumentRecord, ScoredDocument};

use super::{rank, DocumentStore, SearchScope, StoreError};

pub struct InMemoryStore {
    dims: usize,
    docs: RwLock<HashMap<String, DocumentRecord>>,
}

impl InMemoryStore {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            docs: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn insert(&self, record: &DocumentRecord) -> Result<(), StoreError> {
        if record.embedding.len() != self.dims {
            return Err(StoreError::DimensionMismatch {
                expected: self.dims,
                got: record.embedding.len(),
            });
        }
        let mut docs = self.docs.write().unwrap();
        docs.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn fetch(&self, id: &str, owner_id: &str) -> Result<DocumentRecord, StoreError> {
        let docs = self.docs.read().unwrap();
        docs.get(id)
            .filter(|doc| doc.owner_id == owner_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn delete(&self, id: &str, owner_id: &str) -> Result<(), StoreError> {
        let mut docs = self.docs.write().unwrap();
        if docs.get(id).is_some_and(|doc| doc.owner_id == owner_id) {
            docs.remove(id);
        }
        Ok(())
    }

    async fn find_by_fingerprint(
        &self,
        owner_id: &str,
        fingerprint: &str,
    ) -> Result<Option<DocumentRecord>, StoreError> {
        let docs = self.docs.read().unwrap();
        let mut matches: Vec<&DocumentRecord> = docs
            .values()
            .filter(|doc| {
                doc.owner_id == owner_id && doc.fingerprint.as_deref() == Some(fingerprint)
            })
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(matches.first().map(|doc| (*doc).clone()))
    }

    async fn list(&self, owner_id: &str) -> Result<Vec<DocumentRecord>, StoreError> {
        let docs = self.docs.read().unwrap();
        let mut records: Vec<DocumentRecord> = docs
            .values()
            .filter(|doc| doc.owner_id == owner_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn nearest_neighbors(
        &self,
        query: &[f32],
        scope: &SearchScope,
        k: usize,
        min_similarity: f32,
    ) -> Result<Vec<ScoredDocument>, StoreError> {
        if query.len() != self.dims {
            return Err(StoreError::DimensionMismatch {
                expected: self.dims,
                got: query.len(),
            });
        }

        let docs = self.docs.read().unwrap();
        let mut results: Vec<ScoredDocument> = docs
            .values()
            .filter(|doc| match scope {
                SearchScope::Document(id) => &doc.id == id,
                SearchScope::Corpus(owner_id) => &doc.owner_id == owner_id,
            })
            .map(|doc| ScoredDocument {
                score: cosine_similarity(query, &doc.embedding),
                record: doc.clone(),
            })
            .collect();

        rank(&mut results, k, min_similarity);
        Ok(results)
    }
}
