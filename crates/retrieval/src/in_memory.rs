//! In-memory vector store, for testing and small catalogues.

use async_trait::async_trait;
use flowplan_core::{Candidate, IndexRecord, VectorStore, VectorStoreError};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::vector::cosine_distance;

/// A brute-force cosine-distance store over a `Vec` of records.
pub struct InMemoryVectorStore {
    collection: String,
    records: Arc<RwLock<Vec<IndexRecord>>>,
}

impl InMemoryVectorStore {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<Candidate>, VectorStoreError> {
        let records = self.records.read().await;
        if let Some(first) = records.first() {
            if first.vector.len() != vector.len() {
                return Err(VectorStoreError::DimensionMismatch {
                    expected: first.vector.len(),
                    got: vector.len(),
                });
            }
        }

        let mut candidates: Vec<Candidate> = records
            .iter()
            .map(|r| Candidate {
                chunk_id: r.id.clone(),
                distance: cosine_distance(&r.vector, vector),
                metadata: r.metadata,
            })
            .collect();

        // Ties broken by id so results are reproducible.
        candidates.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        candidates.truncate(top_k);
        Ok(candidates)
    }

    async fn upsert(&self, incoming: Vec<IndexRecord>) -> Result<(), VectorStoreError> {
        let mut records = self.records.write().await;
        let expected = records
            .first()
            .or(incoming.first())
            .map(|r| r.vector.len());

        if let Some(expected) = expected {
            if let Some(bad) = incoming.iter().find(|r| r.vector.len() != expected) {
                return Err(VectorStoreError::DimensionMismatch {
                    expected,
                    got: bad.vector.len(),
                });
            }
        }

        for record in incoming {
            match records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => records.push(record),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowplan_core::{ChunkCategory, ChunkMetadata, ChunkRole, Topic};

    fn record(id: &str, topic: Topic, vector: Vec<f32>) -> IndexRecord {
        IndexRecord {
            id: id.into(),
            vector,
            metadata: ChunkMetadata {
                category: ChunkCategory::Rule,
                topic,
                role: ChunkRole::Router,
                priority: 10,
            },
        }
    }

    #[tokio::test]
    async fn query_orders_by_ascending_distance() {
        let store = InMemoryVectorStore::new("rules");
        store
            .upsert(vec![
                record("far", Topic::Loops, vec![0.0, 1.0]),
                record("near", Topic::Conditions, vec![1.0, 0.0]),
                record("mid", Topic::UserMgmt, vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = store.query(&[1.0, 0.0], 10).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
        assert!(hits[0].distance < hits[1].distance);
        assert_eq!(hits[0].metadata.topic, Topic::Conditions);
    }

    #[tokio::test]
    async fn query_respects_top_k() {
        let store = InMemoryVectorStore::new("rules");
        store
            .upsert(
                (0..5)
                    .map(|i| record(&format!("r{i}"), Topic::Loops, vec![1.0, i as f32]))
                    .collect(),
            )
            .await
            .unwrap();
        assert_eq!(store.query(&[1.0, 0.0], 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let store = InMemoryVectorStore::new("rules");
        store.upsert(vec![record("a", Topic::Loops, vec![1.0, 0.0])]).await.unwrap();
        store.upsert(vec![record("a", Topic::Conditions, vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(store.len().await, 1);
        let hits = store.query(&[0.0, 1.0], 1).await.unwrap();
        assert_eq!(hits[0].metadata.topic, Topic::Conditions);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_an_error() {
        let store = InMemoryVectorStore::new("rules");
        store.upsert(vec![record("a", Topic::Loops, vec![1.0, 0.0])]).await.unwrap();

        let err = store.query(&[1.0, 0.0, 0.0], 3).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::DimensionMismatch { expected: 2, got: 3 }));

        let err = store
            .upsert(vec![record("b", Topic::Loops, vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn empty_store_returns_nothing() {
        let store = InMemoryVectorStore::new("rules");
        assert!(store.is_empty().await);
        assert!(store.query(&[1.0], 5).await.unwrap().is_empty());
        assert_eq!(store.collection(), "rules");
    }
}
