//! The chunk registry: an immutable, deduplicated catalogue.
//!
//! Built once by merging a primary (curated, authoritative) source with a
//! secondary (legacy) source, then shared read-only via `Arc`.

use flowplan_core::{Chunk, ChunkKey, ChunkRole, Origin, RegistryError, Topic};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::source::ChunkSource;

const PRIMARY_CATALOGUE: &str = include_str!("../data/primary.toml");
const SECONDARY_CATALOGUE: &str = include_str!("../data/legacy.toml");

/// What a merge did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub primary_count: usize,
    pub secondary_count: usize,
    pub merged_count: usize,
    /// Keys whose body was replaced by a strictly longer secondary body.
    pub secondary_overrides: Vec<ChunkKey>,
    /// Keys only the secondary source supplied.
    pub secondary_additions: Vec<ChunkKey>,
}

/// Immutable chunk catalogue keyed by `(category, topic, role)`.
#[derive(Debug, Clone)]
pub struct ChunkRegistry {
    chunks: Vec<Chunk>,
    index: HashMap<ChunkKey, usize>,
}

impl ChunkRegistry {
    /// Build a registry from chunks that must already have unique keys.
    pub fn from_chunks(chunks: Vec<Chunk>) -> Result<Self, RegistryError> {
        let mut sorted = chunks;
        sorted.sort_by_key(|c| c.key());
        if let Some(pair) = sorted.windows(2).find(|w| w[0].key() == w[1].key()) {
            return Err(RegistryError::DuplicateKey {
                key: pair[0].key().to_string(),
                source_name: "<chunks>".into(),
            });
        }
        Ok(Self::from_sorted(sorted))
    }

    /// Merge a primary and a secondary source.
    ///
    /// The primary source is authoritative and may not repeat a key. A
    /// secondary chunk fills a missing key, or replaces an existing body only
    /// when its own body is strictly longer; the existing signature and
    /// priority are kept in that case.
    pub fn merge(
        primary: &ChunkSource,
        secondary: &ChunkSource,
    ) -> Result<(Self, MergeReport), RegistryError> {
        let mut report = MergeReport::default();
        let mut merged: Vec<Chunk> = Vec::with_capacity(primary.len() + secondary.len());
        let mut index: HashMap<ChunkKey, usize> = HashMap::new();

        for chunk in primary.chunks() {
            let key = chunk.key();
            if index.contains_key(&key) {
                return Err(RegistryError::DuplicateKey {
                    key: key.to_string(),
                    source_name: primary.name().to_string(),
                });
            }
            index.insert(key, merged.len());
            merged.push(Chunk {
                origin: Origin::Primary,
                ..chunk.clone()
            });
            report.primary_count += 1;
        }

        for chunk in secondary.chunks() {
            let key = chunk.key();
            report.secondary_count += 1;

            match index.get(&key) {
                None => {
                    index.insert(key, merged.len());
                    merged.push(Chunk {
                        origin: Origin::Secondary,
                        ..chunk.clone()
                    });
                    report.secondary_additions.push(key);
                }
                Some(&pos) => {
                    let existing = &mut merged[pos];
                    if chunk.body.chars().count() > existing.body.chars().count() {
                        existing.body = chunk.body.clone();
                        existing.origin = Origin::Secondary;
                        if !report.secondary_overrides.contains(&key) {
                            report.secondary_overrides.push(key);
                        }
                    }
                }
            }
        }

        report.merged_count = merged.len();
        merged.sort_by_key(|c| c.key());

        tracing::info!(
            primary = report.primary_count,
            secondary = report.secondary_count,
            merged = report.merged_count,
            overrides = report.secondary_overrides.len(),
            "Chunk registry built"
        );

        Ok((Self::from_sorted(merged), report))
    }

    /// The curated catalogue merged with the legacy catalogue shipped in this crate.
    pub fn builtin() -> Result<(Self, MergeReport), RegistryError> {
        let primary =
            ChunkSource::from_toml_str("primary.toml", Origin::Primary, PRIMARY_CATALOGUE)?;
        let secondary =
            ChunkSource::from_toml_str("legacy.toml", Origin::Secondary, SECONDARY_CATALOGUE)?;
        Self::merge(&primary, &secondary)
    }

    fn from_sorted(chunks: Vec<Chunk>) -> Self {
        let index = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| (c.key(), i))
            .collect();
        Self { chunks, index }
    }

    /// All chunks, ordered by key.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    pub fn get(&self, key: &ChunkKey) -> Option<&Chunk> {
        self.index.get(key).map(|&i| &self.chunks[i])
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Distinct topics present in the registry.
    pub fn topics(&self) -> BTreeSet<Topic> {
        self.chunks.iter().map(|c| c.topic).collect()
    }

    pub fn with_role(&self, role: ChunkRole) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter().filter(move |c| c.role == role)
    }

    /// Chunks whose signatures belong in the vector index. Static chunks are
    /// always injected and never embedded.
    pub fn embeddable(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter().filter(|c| c.role != ChunkRole::Static)
    }
}
