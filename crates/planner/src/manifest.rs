//! Prompt manifests.
//!
//! A manifest is the machine-checkable record of one assembly: routing
//! decision, audit, and the build the prompt came from. Written as pretty
//! JSON to a timestamped file.

use chrono::{DateTime, Utc};
use flowplan_catalog::MergeReport;
use flowplan_config::ManifestConfig;
use flowplan_core::Topic;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::audit::AuditRecord;
use crate::routing::{RankingSource, RoutingResult, RoutingTrace};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to write manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Registry merge counts carried into the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryCounts {
    pub primary: usize,
    pub secondary: usize,
    pub merged: usize,
    pub secondary_overrides: usize,
    pub secondary_additions: usize,
}

impl From<&MergeReport> for RegistryCounts {
    fn from(report: &MergeReport) -> Self {
        Self {
            primary: report.primary_count,
            secondary: report.secondary_count,
            merged: report.merged_count,
            secondary_overrides: report.secondary_overrides.len(),
            secondary_additions: report.secondary_additions.len(),
        }
    }
}

/// Where a prompt came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
    pub embedding_model: String,
    pub collection: String,
    pub registry: RegistryCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoutingSummary {
    pub winner: Option<Topic>,
    pub secondary: Option<Topic>,
    pub topics: Vec<Topic>,
    pub ranking: RankingSource,
    pub forced_by: Option<&'static str>,
    pub trace: RoutingTrace,
}

impl From<&RoutingResult> for RoutingSummary {
    fn from(r: &RoutingResult) -> Self {
        Self {
            winner: r.winner(),
            secondary: r.secondary(),
            topics: r.topics.clone(),
            ranking: r.ranking,
            forced_by: r.forced_by,
            trace: r.trace.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub query: String,
    pub build: BuildInfo,
    pub routing: RoutingSummary,
    pub audit: AuditRecord,
}

impl Manifest {
    pub fn new(query: &str, audit: &AuditRecord, build: BuildInfo) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            query: query.to_string(),
            build,
            routing: RoutingSummary::from(&audit.routing),
            audit: audit.clone(),
        }
    }

    /// `prompt_manifest_<UTC timestamp>_<short id>.json`
    pub fn file_name(&self) -> String {
        let short = self.id.simple().to_string();
        format!(
            "prompt_manifest_{}_{}.json",
            self.created_at.format("%Y%m%d_%H%M%S"),
            &short[..8]
        )
    }
}

/// Writes manifests into one directory, creating it on demand.
#[derive(Debug, Clone)]
pub struct ManifestWriter {
    dir: PathBuf,
}

impl ManifestWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `None` when manifests are disabled.
    pub fn from_config(config: &ManifestConfig) -> Option<Self> {
        config.enabled.then(|| Self::new(&config.dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, manifest: &Manifest) -> Result<PathBuf, ManifestError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| ManifestError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.dir.join(manifest.file_name());
        let json = serde_json::to_string_pretty(manifest)?;
        std::fs::write(&path, json).map_err(|source| ManifestError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(path = %path.display(), "Wrote prompt manifest");
        Ok(path)
    }
}
