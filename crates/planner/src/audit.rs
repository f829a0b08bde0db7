//! Prompt audit record.
//!
//! What went into a prompt and why: sizes, per-section / role / category /
//! topic breakdowns, and every chunk in prompt order with its content
//! fingerprint. Built once per assembly and never mutated.

use flowplan_core::{Chunk, ChunkCategory, ChunkKey, ChunkRole, Origin, Section, Topic};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::context::token::{approx_tokens, char_count};
use crate::routing::RoutingResult;

/// One chunk as it appears in the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    /// Zero-based block position in the prompt.
    pub position: usize,
    pub section: Section,
    pub key: ChunkKey,
    pub priority: u32,
    pub origin: Origin,
    pub chars: usize,
    pub fingerprint: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub chars: usize,
    pub approx_tokens: usize,
    pub chunks_count: usize,
    pub by_section: BTreeMap<&'static str, usize>,
    pub by_role: BTreeMap<ChunkRole, usize>,
    pub by_category: BTreeMap<ChunkCategory, usize>,
    pub by_topic: BTreeMap<Topic, usize>,
    pub chunks: Vec<AuditEntry>,
    /// Enforcement addenda appended after the query block.
    pub addenda: usize,
    #[serde(skip)]
    pub routing: RoutingResult,
}

impl AuditRecord {
    /// Audit `prompt`, built from `placed` chunks in order.
    pub fn build(
        prompt: &str,
        placed: &[(Section, &Chunk)],
        addenda: usize,
        routing: RoutingResult,
    ) -> Self {
        let mut by_section = BTreeMap::new();
        let mut by_role = BTreeMap::new();
        let mut by_category = BTreeMap::new();
        let mut by_topic = BTreeMap::new();

        let chunks: Vec<AuditEntry> = placed
            .iter()
            .enumerate()
            .map(|(position, (section, chunk))| {
                *by_section.entry(section.as_str()).or_insert(0) += 1;
                *by_role.entry(chunk.role).or_insert(0) += 1;
                *by_category.entry(chunk.category).or_insert(0) += 1;
                *by_topic.entry(chunk.topic).or_insert(0) += 1;
                AuditEntry {
                    position,
                    section: *section,
                    key: chunk.key(),
                    priority: chunk.priority,
                    origin: chunk.origin,
                    chars: char_count(chunk.body.trim()),
                    fingerprint: chunk.fingerprint(),
                }
            })
            .collect();

        Self {
            chars: char_count(prompt),
            approx_tokens: approx_tokens(prompt),
            chunks_count: chunks.len(),
            by_section,
            by_role,
            by_category,
            by_topic,
            chunks,
            addenda,
            routing,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = ChunkKey> + '_ {
        self.chunks.iter().map(|e| e.key)
    }

    pub fn contains_topic(&self, topic: Topic) -> bool {
        self.by_topic.contains_key(&topic)
    }

    pub fn section_count(&self, section: Section) -> usize {
        self.by_section.get(section.as_str()).copied().unwrap_or(0)
    }
}
