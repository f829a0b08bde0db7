//! End-to-end wiring from configuration.

use flowplan_catalog::{ChunkRegistry, MergeReport};
use flowplan_config::FlowplanConfig;
use flowplan_core::{AssemblyError, Embedder, RegistryError, VectorStore};
use flowplan_retrieval::CentroidStore;
use std::sync::Arc;

use crate::context::{AssembleOptions, AssembledPrompt, PromptAssembler};
use crate::expand::SupportExpander;
use crate::manifest::{BuildInfo, ManifestWriter, RegistryCounts};
use crate::routing::TopicRouter;

/// Registry, router, expander and assembler built from one configuration.
pub struct Pipeline {
    registry: Arc<ChunkRegistry>,
    merge_report: MergeReport,
    assembler: PromptAssembler,
}

impl Pipeline {
    /// Build over the catalogues shipped with the crate.
    pub fn from_config(
        config: &FlowplanConfig,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self, RegistryError> {
        let (registry, report) = ChunkRegistry::builtin()?;
        Ok(Self::with_registry(config, registry, report, embedder, store))
    }

    pub fn with_registry(
        config: &FlowplanConfig,
        registry: ChunkRegistry,
        merge_report: MergeReport,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        let registry = Arc::new(registry);

        let centroids = CentroidStore::load_or_degrade(
            config.centroids.path.as_deref(),
            &config.index.collection,
            embedder.model_id(),
        )
        .map(Arc::new);

        let build = BuildInfo {
            embedding_model: embedder.model_id().to_string(),
            collection: config.index.collection.clone(),
            registry: RegistryCounts::from(&merge_report),
        };

        let router = TopicRouter::new(embedder, store, centroids, config.router.clone());
        let expander = SupportExpander::new(registry.clone(), config.expander.clone());
        let mut assembler = PromptAssembler::new(
            registry.clone(),
            Arc::new(router),
            expander,
            config.assembler.clone(),
        );
        if let Some(writer) = ManifestWriter::from_config(&config.manifest) {
            assembler = assembler.with_manifest(writer, build);
        }

        Self {
            registry,
            merge_report,
            assembler,
        }
    }

    pub async fn assemble(
        &self,
        query: &str,
        options: AssembleOptions,
    ) -> Result<AssembledPrompt, AssemblyError> {
        self.assembler.assemble(query, options).await
    }

    pub fn registry(&self) -> &ChunkRegistry {
        &self.registry
    }

    pub fn merge_report(&self) -> &MergeReport {
        &self.merge_report
    }

    pub fn assembler(&self) -> &PromptAssembler {
        &self.assembler
    }
}
