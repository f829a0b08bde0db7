//! Prompt assembly pipeline.
//!
//! Builds the final prompt from five sections plus the query block:
//!
//! | Section | Source | Cap |
//! |---------|--------|-----|
//! | 1. Static | every `static`-role chunk | none |
//! | 2. Always-inject | chunks of the always-inject topics | none |
//! | 3. Router | routed + expanded `router` chunks | `max_router_blocks` |
//! | 4. Support | routed + expanded `support` chunks | `max_support_blocks` |
//! | 5. Catalogue | routed `catalog` chunks | `max_catalogue_blocks` |
//!
//! Each section is deduplicated by content fingerprint, sorted by priority
//! and collapsed by containment. Caps are checked after collapse and are
//! never enforced by truncation: an over-full section is an error.
//!
//! # Determinism
//!
//! Identical inputs always produce identical prompts. No state accumulates
//! between calls.

use flowplan_catalog::ChunkRegistry;
use flowplan_config::AssemblerSettings;
use flowplan_core::{AssemblyError, Chunk, ChunkCategory, ChunkRole, Section, Topic};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::audit::AuditRecord;
use crate::context::addenda::enforcement_addenda;
use crate::context::collapse::{
    collapse_contained, drop_contained_in, drop_fingerprints, normalize_bucket,
};
use crate::context::token::{approx_tokens, char_count};
use crate::expand::SupportExpander;
use crate::manifest::{BuildInfo, Manifest, ManifestWriter};
use crate::routing::{RoutingResult, TopicRouter};

// ── Types ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct AssembleOptions {
    /// Prepend a `[debug] allowed_topics: ...` header line.
    pub debug: bool,
}

/// A prompt ready for the generator, with its audit.
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    pub prompt: String,
    pub audit: AuditRecord,
    /// Set when a manifest was written for this prompt.
    pub manifest_path: Option<PathBuf>,
}

impl AssembledPrompt {
    pub fn routing(&self) -> &RoutingResult {
        &self.audit.routing
    }
}

/// Section buckets after deduplication and collapse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Buckets {
    pub statics: Vec<Chunk>,
    pub always: Vec<Chunk>,
    pub router: Vec<Chunk>,
    pub support: Vec<Chunk>,
    pub catalogue: Vec<Chunk>,
}

impl Buckets {
    /// Chunks in prompt order, tagged with their section.
    pub fn placed(&self) -> Vec<(Section, &Chunk)> {
        let sections = [
            (Section::Static, &self.statics),
            (Section::AlwaysInject, &self.always),
            (Section::Router, &self.router),
            (Section::Support, &self.support),
            (Section::Catalogue, &self.catalogue),
        ];
        sections
            .into_iter()
            .flat_map(|(section, chunks)| chunks.iter().map(move |c| (section, c)))
            .collect()
    }
}

// ── Assembler ─────────────────────────────────────────────────────────────

pub struct PromptAssembler {
    registry: Arc<ChunkRegistry>,
    router: Arc<TopicRouter>,
    expander: SupportExpander,
    settings: AssemblerSettings,
    manifest: Option<(ManifestWriter, BuildInfo)>,
}

impl PromptAssembler {
    pub fn new(
        registry: Arc<ChunkRegistry>,
        router: Arc<TopicRouter>,
        expander: SupportExpander,
        settings: AssemblerSettings,
    ) -> Self {
        Self {
            registry,
            router,
            expander,
            settings,
            manifest: None,
        }
    }

    /// Write a manifest for every assembled prompt.
    pub fn with_manifest(mut self, writer: ManifestWriter, build: BuildInfo) -> Self {
        self.manifest = Some((writer, build));
        self
    }

    pub fn settings(&self) -> &AssemblerSettings {
        &self.settings
    }

    pub fn router(&self) -> &TopicRouter {
        &self.router
    }

    /// Route `query`, expand the topics and assemble the prompt.
    pub async fn assemble(
        &self,
        query: &str,
        options: AssembleOptions,
    ) -> Result<AssembledPrompt, AssemblyError> {
        let routing = self.router.route(query).await?;
        self.compose(query, routing, options)
    }

    /// Assemble the prompt for an already-routed query.
    pub fn compose(
        &self,
        query: &str,
        routing: RoutingResult,
        options: AssembleOptions,
    ) -> Result<AssembledPrompt, AssemblyError> {
        let buckets = self.buckets(&routing.topics);
        self.check_caps(&buckets)?;

        let addenda = if self.settings.enforcement_addenda {
            enforcement_addenda(&routing.topics)
        } else {
            Vec::new()
        };

        let placed = buckets.placed();
        let mut parts: Vec<&str> = placed.iter().map(|(_, c)| c.body.trim()).collect();
        let query_block = format!("USER.QUERY\n{}", query.trim());
        parts.push(&query_block);
        parts.extend(addenda.iter().copied());
        parts.retain(|p| !p.is_empty());

        let mut prompt = parts.join(&self.settings.separator);
        if options.debug {
            prompt = format!("{}\n\n{prompt}", debug_header(&routing.topics));
        }

        let tokens = approx_tokens(&prompt);
        if tokens > self.settings.max_prompt_tokens_approx {
            return Err(AssemblyError::PromptTooLarge {
                approx_tokens: tokens,
                limit: self.settings.max_prompt_tokens_approx,
                chars: char_count(&prompt),
            });
        }

        let audit = AuditRecord::build(&prompt, &placed, addenda.len(), routing);

        info!(
            topics = ?audit.routing.topics.iter().map(Topic::as_str).collect::<Vec<_>>(),
            chunks = audit.chunks_count,
            router = buckets.router.len(),
            support = buckets.support.len(),
            catalogue = buckets.catalogue.len(),
            chars = audit.chars,
            approx_tokens = audit.approx_tokens,
            "Assembled prompt"
        );

        let manifest_path = self.write_manifest(query, &audit);

        Ok(AssembledPrompt {
            prompt,
            audit,
            manifest_path,
        })
    }

    /// Fill, dedupe and collapse every section for a topic list.
    pub fn buckets(&self, topics: &[Topic]) -> Buckets {
        let statics: Vec<Chunk> = self
            .registry
            .with_role(ChunkRole::Static)
            .cloned()
            .collect();
        let always: Vec<Chunk> = self
            .registry
            .iter()
            .filter(|c| {
                c.role != ChunkRole::Static && self.settings.always_inject.contains(&c.topic)
            })
            .cloned()
            .collect();

        let expansion = self.expander.expand(topics);
        let mut router = Vec::new();
        let mut support = Vec::new();
        let mut catalogue = Vec::new();
        for chunk in expansion.chunks {
            match (chunk.role, chunk.category) {
                (ChunkRole::Router, _) => router.push(chunk),
                (_, ChunkCategory::Catalog) => catalogue.push(chunk),
                _ => support.push(chunk),
            }
        }

        let statics = collapse_contained(normalize_bucket(statics));
        let always = collapse_contained(normalize_bucket(always));
        let mut router = collapse_contained(normalize_bucket(router));
        let mut support = collapse_contained(normalize_bucket(support));
        let mut catalogue = collapse_contained(normalize_bucket(catalogue));

        support = drop_contained_in(support, &router);
        catalogue = drop_contained_in(catalogue, &router);

        let taken: HashSet<String> = statics
            .iter()
            .chain(always.iter())
            .map(Chunk::fingerprint)
            .collect();
        router = drop_fingerprints(router, &taken);
        support = drop_fingerprints(support, &taken);
        catalogue = drop_fingerprints(catalogue, &taken);

        Buckets {
            statics,
            always,
            router,
            support,
            catalogue,
        }
    }

    fn check_caps(&self, buckets: &Buckets) -> Result<(), AssemblyError> {
        let caps = [
            (Section::Router, buckets.router.len(), self.settings.max_router_blocks),
            (Section::Support, buckets.support.len(), self.settings.max_support_blocks),
            (
                Section::Catalogue,
                buckets.catalogue.len(),
                self.settings.max_catalogue_blocks,
            ),
        ];
        for (section, count, limit) in caps {
            if count > limit {
                return Err(AssemblyError::SectionCapExceeded {
                    section,
                    count,
                    limit,
                });
            }
        }
        Ok(())
    }

    fn write_manifest(&self, query: &str, audit: &AuditRecord) -> Option<PathBuf> {
        let (writer, build) = self.manifest.as_ref()?;
        let manifest = Manifest::new(query, audit, build.clone());
        match writer.write(&manifest) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "Failed to write prompt manifest");
                None
            }
        }
    }
}

fn debug_header(topics: &[Topic]) -> String {
    let line = if topics.is_empty() {
        "(none)".to_string()
    } else {
        topics.iter().map(Topic::as_str).collect::<Vec<_>>().join(", ")
    };
    format!("[debug] allowed_topics: {line}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{RankingSource, RoutingTiming, RoutingTrace};
    use async_trait::async_trait;
    use flowplan_config::{ExpanderSettings, RouterSettings};
    use flowplan_core::{
        Candidate, Embedder, EmbeddingError, IndexRecord, Origin, VectorStore, VectorStoreError,
    };

    // ── Test helpers ──────────────────────────────────────────────────────

    struct Unreachable;

    #[async_trait]
    impl Embedder for Unreachable {
        fn model_id(&self) -> &str {
            "unreachable"
        }
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::Network("offline".into()))
        }
    }

    #[async_trait]
    impl VectorStore for Unreachable {
        fn collection(&self) -> &str {
            "unreachable"
        }
        async fn query(&self, _v: &[f32], _k: usize) -> Result<Vec<Candidate>, VectorStoreError> {
            Err(VectorStoreError::QueryFailed("offline".into()))
        }
        async fn upsert(&self, _r: Vec<IndexRecord>) -> Result<(), VectorStoreError> {
            Ok(())
        }
    }

    fn chunk(
        category: ChunkCategory,
        topic: Topic,
        role: ChunkRole,
        priority: u32,
        body: &str,
    ) -> Chunk {
        Chunk {
            category,
            topic,
            priority,
            role,
            signature: format!("sig {topic}"),
            body: body.into(),
            origin: Origin::Primary,
        }
    }

    fn rule(topic: Topic, role: ChunkRole, priority: u32, body: &str) -> Chunk {
        chunk(ChunkCategory::Rule, topic, role, priority, body)
    }

    fn registry() -> ChunkRegistry {
        use ChunkRole::{Router, Support};
        ChunkRegistry::from_chunks(vec![
            chunk(
                ChunkCategory::Core,
                Topic::CoreIntro,
                ChunkRole::Static,
                999,
                "You are a workflow planner.",
            ),
            rule(Topic::PlannerPolicy, Support, 80, "PLANNER POLICY: minimal steps."),
            rule(Topic::OutputContract, Support, 90, "OUTPUT CONTRACT: markdown sections."),
            chunk(
                ChunkCategory::Catalog,
                Topic::TriggersCatalog,
                Support,
                40,
                "TRIGGERS: TRG_API, TRG_DB",
            ),
            rule(Topic::Conditions, Router, 100, "CONDITIONS: use CNDN_BIN for two branches."),
            rule(Topic::Conditions, Support, 100, "CNDN_BIN for two branches"),
            rule(Topic::ConditionsBin, Router, 95, "CNDN_BIN: IF TRUE / IF FALSE"),
            rule(Topic::ConditionsGuardrails, Support, 85, "PLANNER POLICY: minimal steps."),
            rule(Topic::Loops, Router, 88, "LOOPS: EVNT_LOOP_FOR (count: N)"),
            rule(Topic::FlowFormatting, Support, 80, "FLOW FORMATTING: bullets inside loops"),
            rule(
                Topic::StaticVsDynamic,
                Router,
                130,
                "STATIC: use _STC events for roles/departments",
            ),
            rule(Topic::ActionsBuiltinFiltering, Router, 120, "SIMPLE WHERE FILTER RULE"),
        ])
        .unwrap()
    }

    fn assembler_with(settings: AssemblerSettings) -> PromptAssembler {
        assembler_over(registry(), settings)
    }

    fn assembler_over(registry: ChunkRegistry, settings: AssemblerSettings) -> PromptAssembler {
        let registry = Arc::new(registry);
        let router = TopicRouter::new(
            Arc::new(Unreachable),
            Arc::new(Unreachable),
            None,
            RouterSettings::default(),
        );
        let expander = SupportExpander::new(registry.clone(), ExpanderSettings::default());
        PromptAssembler::new(registry, Arc::new(router), expander, settings)
    }

    fn assembler() -> PromptAssembler {
        assembler_with(AssemblerSettings::default())
    }

    fn routed(topics: &[Topic]) -> RoutingResult {
        RoutingResult {
            topics: topics.to_vec(),
            ranking: RankingSource::Centroid,
            forced_by: None,
            trace: RoutingTrace::default(),
            timing: RoutingTiming::default(),
        }
    }

    // ── Tests ─────────────────────────────────────────────────────────────

    #[test]
    fn sections_are_ordered_and_query_is_last_block() {
        let a = assembler();
        let out = a
            .compose(
                "if amount > 100 then notify",
                routed(&[Topic::Conditions]),
                AssembleOptions::default(),
            )
            .unwrap();

        let sections: Vec<Section> = out.audit.chunks.iter().map(|e| e.section).collect();
        let mut sorted = sections.clone();
        sorted.sort_by_key(|s| match s {
            Section::Static => 0,
            Section::AlwaysInject => 1,
            Section::Router => 2,
            Section::Support => 3,
            Section::Catalogue => 4,
        });
        assert_eq!(sections, sorted);
        assert!(out.prompt.starts_with("You are a workflow planner."));
        assert!(out.prompt.contains("---\n\nUSER.QUERY\nif amount > 100 then notify"));
    }

    #[test]
    fn support_contained_in_router_is_dropped() {
        let buckets = assembler().buckets(&[Topic::Conditions]);
        assert!(buckets.support.iter().all(|c| c.key().topic != Topic::Conditions));
    }

    #[test]
    fn chunk_matching_always_inject_content_is_dropped() {
        let buckets = assembler().buckets(&[Topic::Conditions]);
        assert!(buckets.support.iter().all(|c| c.topic != Topic::ConditionsGuardrails));
        assert!(buckets.support.iter().all(|c| c.topic != Topic::PlannerPolicy));
        assert_eq!(buckets.always.len(), 3);
    }

    #[test]
    fn catalogue_only_for_routed_catalog_topics() {
        let buckets = assembler().buckets(&[Topic::Loops]);
        assert!(buckets.catalogue.is_empty());
        // Triggers catalogue is always injected, never duplicated as a catalogue block.
        let buckets = assembler().buckets(&[Topic::TriggersCatalog]);
        assert!(buckets.catalogue.is_empty());
    }

    #[test]
    fn router_cap_is_an_error_not_a_truncation() {
        let mut settings = AssemblerSettings::default();
        settings.max_router_blocks = 2;
        let err = assembler_with(settings)
            .compose("q", routed(&[Topic::Conditions, Topic::Loops]), AssembleOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::SectionCapExceeded {
                section: Section::Router,
                count: 3,
                limit: 2
            }
        ));
    }

    /// Topics outside every mutual-exclusion family and the always-inject set.
    const FREE_TOPICS: &[Topic] = &[
        Topic::NotificationsIntent,
        Topic::DataOpsRules,
        Topic::Conditions,
        Topic::ConditionsBin,
        Topic::ConditionsSeq,
        Topic::ConditionsDom,
        Topic::ConditionsDistinctionTable,
        Topic::ConditionsGuardrails,
        Topic::Loops,
        Topic::FlowFormatting,
        Topic::DataExtraction,
        Topic::DataExtractionJmes,
        Topic::DataExtractionFltr,
        Topic::DataOps,
    ];

    fn distinct_blocks(category: ChunkCategory, n: usize) -> (ChunkRegistry, Vec<Topic>) {
        let topics = FREE_TOPICS[..n].to_vec();
        let chunks = topics
            .iter()
            .enumerate()
            .map(|(i, &t)| {
                let body = format!("block {i} covers {t}.");
                chunk(category, t, ChunkRole::Support, 50, &body)
            })
            .collect();
        (ChunkRegistry::from_chunks(chunks).unwrap(), topics)
    }

    #[test]
    fn support_cap_is_enforced_after_collapse() {
        let (registry, topics) = distinct_blocks(ChunkCategory::Rule, 13);
        let err = assembler_over(registry, AssemblerSettings::default())
            .compose("q", routed(&topics), AssembleOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::SectionCapExceeded {
                section: Section::Support,
                count: 13,
                limit: 12
            }
        ));
    }

    #[test]
    fn support_section_at_the_cap_composes() {
        let (registry, topics) = distinct_blocks(ChunkCategory::Rule, 12);
        let out = assembler_over(registry, AssemblerSettings::default())
            .compose("q", routed(&topics), AssembleOptions::default())
            .unwrap();
        assert_eq!(out.audit.section_count(Section::Support), 12);
    }

    #[test]
    fn catalogue_cap_is_enforced_after_collapse() {
        let (registry, topics) = distinct_blocks(ChunkCategory::Catalog, 7);
        let err = assembler_over(registry, AssemblerSettings::default())
            .compose("q", routed(&topics), AssembleOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::SectionCapExceeded {
                section: Section::Catalogue,
                count: 7,
                limit: 6
            }
        ));
    }

    #[test]
    fn catalogue_section_at_the_cap_composes() {
        let (registry, topics) = distinct_blocks(ChunkCategory::Catalog, 6);
        let out = assembler_over(registry, AssemblerSettings::default())
            .compose("q", routed(&topics), AssembleOptions::default())
            .unwrap();
        assert_eq!(out.audit.section_count(Section::Catalogue), 6);
    }

    #[test]
    fn prompt_too_large_is_reported() {
        let mut settings = AssemblerSettings::default();
        settings.max_prompt_tokens_approx = 10;
        let err = assembler_with(settings)
            .compose("q", routed(&[Topic::Loops]), AssembleOptions::default())
            .unwrap_err();
        match err {
            AssemblyError::PromptTooLarge {
                approx_tokens,
                limit,
                chars,
            } => {
                assert_eq!(limit, 10);
                assert!(approx_tokens > 10);
                assert!(chars >= approx_tokens * 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn debug_header_lists_topics() {
        let a = assembler();
        let out = a
            .compose("q", routed(&[Topic::Loops]), AssembleOptions { debug: true })
            .unwrap();
        assert!(out.prompt.starts_with("[debug] allowed_topics: loops\n\n"));

        let out = a.compose("q", routed(&[]), AssembleOptions { debug: true }).unwrap();
        assert!(out.prompt.starts_with("[debug] allowed_topics: (none)\n\n"));
    }

    #[test]
    fn addenda_follow_the_query_block() {
        let out = assembler()
            .compose("repeat 3 times", routed(&[Topic::Loops]), AssembleOptions::default())
            .unwrap();
        let query_at = out.prompt.find("USER.QUERY").unwrap();
        let loops_at = out.prompt.find("LOOPS ENFORCEMENT").unwrap();
        assert!(loops_at > query_at);
        assert_eq!(out.audit.addenda, 1);

        let mut settings = AssemblerSettings::default();
        settings.enforcement_addenda = false;
        let out = assembler_with(settings)
            .compose("repeat 3 times", routed(&[Topic::Loops]), AssembleOptions::default())
            .unwrap();
        assert!(!out.prompt.contains("LOOPS ENFORCEMENT"));
        assert!(out.prompt.ends_with("USER.QUERY\nrepeat 3 times"));
    }

    #[test]
    fn compose_is_deterministic() {
        let a = assembler();
        let topics = [Topic::Conditions, Topic::Loops];
        let first = a.compose("q", routed(&topics), AssembleOptions::default()).unwrap();
        let second = a.compose("q", routed(&topics), AssembleOptions::default()).unwrap();
        assert_eq!(first.prompt, second.prompt);
        assert_eq!(first.audit.chunks, second.audit.chunks);
    }

    #[tokio::test]
    async fn gated_query_assembles_without_embeddings() {
        let out = assembler()
            .assemble("update role from admin to user", AssembleOptions::default())
            .await
            .unwrap();
        assert_eq!(out.routing().topics, vec![Topic::StaticVsDynamic]);
        assert!(out.prompt.contains("STATIC: use _STC events"));
        assert!(!out.prompt.contains("SIMPLE WHERE FILTER RULE"));
        assert!(out.prompt.contains("META.STATIC_ONLY"));
    }

    #[tokio::test]
    async fn routing_failure_surfaces_as_assembly_error() {
        let err = assembler()
            .assemble("send an email", AssembleOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AssemblyError::Routing(_)));
    }

    #[test]
    fn manifest_is_written_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let a = assembler().with_manifest(ManifestWriter::new(dir.path()), BuildInfo::default());
        let out = a
            .compose("repeat 3 times", routed(&[Topic::Loops]), AssembleOptions::default())
            .unwrap();
        let path = out.manifest_path.unwrap();
        assert!(path.starts_with(dir.path()));
        assert!(path.exists());
    }
}
