//! Per-topic centroid vectors.
//!
//! A centroid is the mean of a topic's router-signature embeddings. The
//! artifact is produced offline and keyed by `(collection, embedding model)`;
//! a store loaded for a different key is rejected, since distances between
//! vectors from different models are meaningless.

use flowplan_core::{CentroidError, Topic};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::vector::{cosine_distance, mean_vector};

/// On-disk form of the centroid store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidArtifact {
    pub collection: String,
    pub embedding_model: String,
    pub centroids: BTreeMap<Topic, Vec<f32>>,
}

/// Read-only map `topic -> centroid`, shared via `Arc` after loading.
#[derive(Debug, Clone)]
pub struct CentroidStore {
    collection: String,
    embedding_model: String,
    dimension: usize,
    centroids: BTreeMap<Topic, Vec<f32>>,
}

impl CentroidStore {
    /// Validate an artifact against the expected key.
    pub fn from_artifact(
        artifact: CentroidArtifact,
        collection: &str,
        embedding_model: &str,
    ) -> Result<Self, CentroidError> {
        if artifact.collection != collection || artifact.embedding_model != embedding_model {
            return Err(CentroidError::KeyMismatch {
                expected_collection: collection.to_string(),
                expected_model: embedding_model.to_string(),
                found_collection: artifact.collection,
                found_model: artifact.embedding_model,
            });
        }

        let dimension = artifact
            .centroids
            .values()
            .next()
            .map(Vec::len)
            .unwrap_or(0);
        for (topic, centroid) in &artifact.centroids {
            if centroid.len() != dimension {
                return Err(CentroidError::DimensionMismatch {
                    topic: topic.to_string(),
                    expected: dimension,
                    got: centroid.len(),
                });
            }
        }

        Ok(Self {
            collection: artifact.collection,
            embedding_model: artifact.embedding_model,
            dimension,
            centroids: artifact.centroids,
        })
    }

    /// Build centroids from grouped signature embeddings. Topics with no
    /// vectors are skipped.
    pub fn from_embeddings(
        collection: &str,
        embedding_model: &str,
        groups: &BTreeMap<Topic, Vec<Vec<f32>>>,
    ) -> Result<Self, CentroidError> {
        let mut centroids = BTreeMap::new();
        for (topic, vectors) in groups {
            if vectors.is_empty() {
                continue;
            }
            let mean = mean_vector(vectors).ok_or_else(|| CentroidError::DimensionMismatch {
                topic: topic.to_string(),
                expected: vectors[0].len(),
                got: vectors.iter().map(Vec::len).find(|&l| l != vectors[0].len()).unwrap_or(0),
            })?;
            centroids.insert(*topic, mean);
        }
        Self::from_artifact(
            CentroidArtifact {
                collection: collection.to_string(),
                embedding_model: embedding_model.to_string(),
                centroids,
            },
            collection,
            embedding_model,
        )
    }

    /// Load and validate the JSON artifact at `path`.
    pub fn load(
        path: &Path,
        collection: &str,
        embedding_model: &str,
    ) -> Result<Self, CentroidError> {
        let content = std::fs::read_to_string(path).map_err(|e| CentroidError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let artifact: CentroidArtifact =
            serde_json::from_str(&content).map_err(|e| CentroidError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let store = Self::from_artifact(artifact, collection, embedding_model)?;
        tracing::info!(
            path = %path.display(),
            topics = store.len(),
            dimension = store.dimension,
            "Loaded centroid artifact"
        );
        Ok(store)
    }

    /// Load the artifact if configured. Any failure is logged at `warn` and
    /// yields `None`, which makes the router fall back to nearest-neighbor
    /// ranking.
    pub fn load_or_degrade(
        path: Option<&Path>,
        collection: &str,
        embedding_model: &str,
    ) -> Option<Self> {
        let path = path?;
        match Self::load(path, collection, embedding_model) {
            Ok(store) => Some(store),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Centroid artifact unavailable, routing degrades to nearest-neighbor ranking"
                );
                None
            }
        }
    }

    /// Write the store as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), CentroidError> {
        let json =
            serde_json::to_string_pretty(&self.to_artifact()).map_err(|e| CentroidError::Write {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        std::fs::write(path, json).map_err(|e| CentroidError::Write {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn to_artifact(&self) -> CentroidArtifact {
        CentroidArtifact {
            collection: self.collection.clone(),
            embedding_model: self.embedding_model.clone(),
            centroids: self.centroids.clone(),
        }
    }

    pub fn get(&self, topic: Topic) -> Option<&[f32]> {
        self.centroids.get(&topic).map(Vec::as_slice)
    }

    /// Cosine distance from `query` to the topic's centroid.
    ///
    /// `None` when the topic has no centroid or the dimensions differ.
    pub fn distance(&self, topic: Topic, query: &[f32]) -> Option<f32> {
        let centroid = self.get(topic)?;
        if centroid.len() != query.len() {
            tracing::warn!(
                topic = %topic,
                expected = centroid.len(),
                got = query.len(),
                "Centroid dimension differs from query embedding, skipping"
            );
            return None;
        }
        Some(cosine_distance(query, centroid))
    }

    pub fn topics(&self) -> impl Iterator<Item = Topic> + '_ {
        self.centroids.keys().copied()
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> CentroidArtifact {
        CentroidArtifact {
            collection: "workflow_rules_v1".into(),
            embedding_model: "text-embedding-3-small".into(),
            centroids: BTreeMap::from([
                (Topic::Conditions, vec![1.0, 0.0]),
                (Topic::Loops, vec![0.0, 1.0]),
            ]),
        }
    }

    #[test]
    fn key_mismatch_is_rejected() {
        let err =
            CentroidStore::from_artifact(artifact(), "workflow_rules_v2", "text-embedding-3-small")
                .unwrap_err();
        assert!(matches!(err, CentroidError::KeyMismatch { .. }));
    }

    #[test]
    fn ragged_artifact_is_rejected() {
        let mut a = artifact();
        a.centroids.insert(Topic::UserMgmt, vec![1.0, 0.0, 0.0]);
        let err = CentroidStore::from_artifact(a, "workflow_rules_v1", "text-embedding-3-small")
            .unwrap_err();
        assert!(matches!(err, CentroidError::DimensionMismatch { .. }));
    }

    #[test]
    fn distance_uses_cosine() {
        let store =
            CentroidStore::from_artifact(artifact(), "workflow_rules_v1", "text-embedding-3-small")
                .unwrap();
        assert_eq!(store.dimension(), 2);
        assert!(store.distance(Topic::Conditions, &[1.0, 0.0]).unwrap().abs() < 1e-6);
        assert!((store.distance(Topic::Loops, &[1.0, 0.0]).unwrap() - 1.0).abs() < 1e-6);
        assert!(store.distance(Topic::UserMgmt, &[1.0, 0.0]).is_none());
        assert!(store.distance(Topic::Conditions, &[1.0, 0.0, 0.0]).is_none());
    }

    #[test]
    fn from_embeddings_averages_each_group() {
        let groups = BTreeMap::from([
            (Topic::Conditions, vec![vec![1.0, 0.0], vec![0.0, 1.0]]),
            (Topic::Loops, vec![]),
        ]);
        let store = CentroidStore::from_embeddings("c", "m", &groups).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(Topic::Conditions).unwrap(), &[0.5, 0.5]);
        assert!(store.get(Topic::Loops).is_none());
    }

    #[test]
    fn save_and_load_preserve_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("centroids.json");
        let store =
            CentroidStore::from_artifact(artifact(), "workflow_rules_v1", "text-embedding-3-small")
                .unwrap();
        store.save(&path).unwrap();

        let loaded =
            CentroidStore::load(&path, "workflow_rules_v1", "text-embedding-3-small").unwrap();
        assert_eq!(loaded.to_artifact(), artifact());
    }

    #[test]
    fn broken_artifact_degrades_to_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("centroids.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(CentroidStore::load_or_degrade(Some(&path), "c", "m").is_none());
        let missing = dir.path().join("missing.json");
        assert!(CentroidStore::load_or_degrade(Some(&missing), "c", "m").is_none());
        assert!(CentroidStore::load_or_degrade(None, "c", "m").is_none());
    }
}
