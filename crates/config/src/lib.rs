//! Configuration loading, validation, and management for flowplan.
//!
//! Loads configuration from `flowplan.toml` (or the path in
//! `FLOWPLAN_CONFIG`) with environment variable overrides. Validates all
//! settings at startup. Topic tables deserialize into the closed
//! [`Topic`] enum, so a misspelled topic fails here rather than at query time.

pub mod logging;

use flowplan_core::Topic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub use logging::LoggingConfig;

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowplanConfig {
    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Vector index configuration
    #[serde(default)]
    pub index: IndexConfig,

    /// Centroid artifact configuration
    #[serde(default)]
    pub centroids: CentroidConfig,

    /// Topic router thresholds and topic tables
    #[serde(default)]
    pub router: RouterSettings,

    /// Support expander topic tables
    #[serde(default)]
    pub expander: ExpanderSettings,

    /// Prompt assembler caps and ordering
    #[serde(default)]
    pub assembler: AssemblerSettings,

    /// Manifest persistence
    #[serde(default)]
    pub manifest: ManifestConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ── Embedding ─────────────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding model identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// OpenAI-compatible base URL
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    /// API key (usually supplied through `OPENAI_API_KEY`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            base_url: default_embedding_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

// ── Index / centroids / manifest ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Vector-store collection identifier
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_collection() -> String {
    "workflow_rules_v1".into()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CentroidConfig {
    /// Path to the centroid artifact. `None` disables centroid re-ranking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_manifest_dir")]
    pub dir: PathBuf,
}

fn default_manifest_dir() -> PathBuf {
    PathBuf::from("manifests")
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_manifest_dir(),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────────

/// Thresholds and topic tables for the topic router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterSettings {
    /// Candidates retrieved from the vector store
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Router-role candidates kept after retrieval
    #[serde(default = "default_top_router")]
    pub top_router: usize,

    /// Groups with fewer candidates are dropped
    #[serde(default = "default_min_group_size")]
    pub min_group_size: usize,

    /// Distance band inside which priority may reorder adjacent groups
    #[serde(default = "default_priority_epsilon")]
    pub priority_epsilon: f32,

    /// General multi-topic bound (absolute)
    #[serde(default = "default_max_abs_gap")]
    pub max_abs_gap: f32,

    /// General multi-topic bound (relative)
    #[serde(default = "default_max_rel_gap")]
    pub max_rel_gap: f32,

    /// Minimum separation for a second topic on the nearest-neighbor path
    #[serde(default = "default_min_gap_to_allow_multi")]
    pub min_gap_to_allow_multi: f32,

    /// Ambiguity window (absolute)
    #[serde(default = "default_ambiguity_abs_gap")]
    pub ambiguity_abs_gap: f32,

    /// Ambiguity window (relative)
    #[serde(default = "default_ambiguity_rel_gap")]
    pub ambiguity_rel_gap: f32,

    /// Margin a stop-early topic needs over the runner-up to win
    #[serde(default = "default_stop_early_min_margin")]
    pub stop_early_min_margin: f32,

    /// Maximum number of topics in a routing result
    #[serde(default = "default_max_topics")]
    pub max_topics: usize,

    /// Topics whose selection suppresses all other topics
    #[serde(default = "default_stop_early_topics")]
    pub stop_early_topics: Vec<Topic>,

    /// Topics never surfaced in a routing result
    #[serde(default = "default_blacklist")]
    pub blacklist: Vec<Topic>,

    /// Legacy topic → canonical topic
    #[serde(default = "default_aliases")]
    pub aliases: BTreeMap<Topic, Topic>,
}

fn default_top_k() -> usize {
    12
}
fn default_top_router() -> usize {
    8
}
fn default_min_group_size() -> usize {
    1
}
fn default_priority_epsilon() -> f32 {
    0.03
}
fn default_max_abs_gap() -> f32 {
    0.28
}
fn default_max_rel_gap() -> f32 {
    1.35
}
fn default_min_gap_to_allow_multi() -> f32 {
    0.08
}
fn default_ambiguity_abs_gap() -> f32 {
    0.05
}
fn default_ambiguity_rel_gap() -> f32 {
    1.15
}
fn default_stop_early_min_margin() -> f32 {
    0.03
}
fn default_max_topics() -> usize {
    2
}
fn default_stop_early_topics() -> Vec<Topic> {
    vec![Topic::UserMgmt, Topic::StaticVsDynamic]
}
fn default_blacklist() -> Vec<Topic> {
    vec![Topic::RouterDisambiguation]
}
fn default_aliases() -> BTreeMap<Topic, Topic> {
    BTreeMap::from([
        (Topic::DataExtraction, Topic::DataRetrievalFiltering),
        (Topic::DataExtractionJmes, Topic::DataRetrievalFiltering),
        (Topic::DataExtractionFltr, Topic::DataRetrievalFiltering),
        (Topic::DataExtractionRcrdInfo, Topic::DataRetrievalFiltering),
        (Topic::ActionsCreate, Topic::ActionsBuiltinFiltering),
        (Topic::ActionsUpdate, Topic::ActionsBuiltinFiltering),
        (Topic::ActionsDelete, Topic::ActionsBuiltinFiltering),
        (Topic::ActionsDuplicate, Topic::ActionsBuiltinFiltering),
        (Topic::ActionsRestore, Topic::ActionsBuiltinFiltering),
        (Topic::DataOps, Topic::DataOpsRules),
        (Topic::DataOpsGuardrails, Topic::DataOpsRules),
        (Topic::Notifications, Topic::NotificationsIntent),
        (Topic::NotificationsMap, Topic::NotificationsIntent),
        (Topic::UserMgmtStop, Topic::UserMgmt),
        (Topic::StaticVsDynamicStop, Topic::StaticVsDynamic),
    ])
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            top_router: default_top_router(),
            min_group_size: default_min_group_size(),
            priority_epsilon: default_priority_epsilon(),
            max_abs_gap: default_max_abs_gap(),
            max_rel_gap: default_max_rel_gap(),
            min_gap_to_allow_multi: default_min_gap_to_allow_multi(),
            ambiguity_abs_gap: default_ambiguity_abs_gap(),
            ambiguity_rel_gap: default_ambiguity_rel_gap(),
            stop_early_min_margin: default_stop_early_min_margin(),
            max_topics: default_max_topics(),
            stop_early_topics: default_stop_early_topics(),
            blacklist: default_blacklist(),
            aliases: default_aliases(),
        }
    }
}

impl RouterSettings {
    pub fn is_stop_early(&self, topic: Topic) -> bool {
        self.stop_early_topics.contains(&topic)
    }
}

// ── Expander ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpanderSettings {
    /// Topics unioned into every expansion. Keep this tiny.
    #[serde(default = "default_always_include")]
    pub always_include: Vec<Topic>,
}

fn default_always_include() -> Vec<Topic> {
    vec![Topic::PlannerPolicy]
}

impl Default for ExpanderSettings {
    fn default() -> Self {
        Self {
            always_include: default_always_include(),
        }
    }
}

// ── Assembler ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblerSettings {
    #[serde(default = "default_max_router_blocks")]
    pub max_router_blocks: usize,

    #[serde(default = "default_max_support_blocks")]
    pub max_support_blocks: usize,

    #[serde(default = "default_max_catalogue_blocks")]
    pub max_catalogue_blocks: usize,

    #[serde(default = "default_max_prompt_tokens_approx")]
    pub max_prompt_tokens_approx: usize,

    /// Topics whose chunks are injected into every prompt
    #[serde(default = "default_always_inject")]
    pub always_inject: Vec<Topic>,

    /// Separator placed between prompt blocks
    #[serde(default = "default_separator")]
    pub separator: String,

    /// Append topic-keyed enforcement addenda
    #[serde(default = "default_true")]
    pub enforcement_addenda: bool,
}

fn default_max_router_blocks() -> usize {
    6
}
fn default_max_support_blocks() -> usize {
    12
}
fn default_max_catalogue_blocks() -> usize {
    6
}
fn default_max_prompt_tokens_approx() -> usize {
    12_000
}
fn default_always_inject() -> Vec<Topic> {
    vec![
        Topic::PlannerPolicy,
        Topic::TriggersRules,
        Topic::TriggersCatalog,
        Topic::OutputContract,
    ]
}
fn default_separator() -> String {
    "\n\n---\n\n".into()
}
fn default_true() -> bool {
    true
}

impl Default for AssemblerSettings {
    fn default() -> Self {
        Self {
            max_router_blocks: default_max_router_blocks(),
            max_support_blocks: default_max_support_blocks(),
            max_catalogue_blocks: default_max_catalogue_blocks(),
            max_prompt_tokens_approx: default_max_prompt_tokens_approx(),
            always_inject: default_always_inject(),
            separator: default_separator(),
            enforcement_addenda: true,
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────

impl FlowplanConfig {
    /// Load configuration from `FLOWPLAN_CONFIG` or `./flowplan.toml`, then
    /// apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("FLOWPLAN_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("flowplan.toml"));
        Self::load_with_env(&path, |name| std::env::var(name).ok())
    }

    /// Load `path`, apply overrides from `lookup`, then validate once.
    ///
    /// A file value that fails validation on its own is accepted when an
    /// override replaces it.
    pub fn load_with_env<F>(path: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config = Self::parse(content)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            reason: e.to_string(),
        })
    }

    /// Apply overrides from the historical environment variable names.
    ///
    /// `lookup` abstracts the environment so overrides can be tested
    /// without mutating process state.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.embedding.api_key.is_none() {
            self.embedding.api_key =
                lookup("FLOWPLAN_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(model) = lookup("EMBED_MODEL") {
            self.embedding.model = model;
        }
        if let Some(url) = lookup("EMBED_BASE_URL") {
            self.embedding.base_url = url;
        }
        if let Some(collection) = lookup("CHROMA_COLLECTION") {
            self.index.collection = collection;
        }
        if let Some(path) = lookup("CENTROIDS_PATH") {
            self.centroids.path = Some(PathBuf::from(path));
        }

        let r = &mut self.router;
        override_parsed(&lookup, "ROUTER_TOP_K", &mut r.top_k)?;
        override_parsed(&lookup, "TOP_ROUTER", &mut r.top_router)?;
        override_parsed(&lookup, "MIN_GROUP_SIZE", &mut r.min_group_size)?;
        override_parsed(&lookup, "PRIORITY_EPSILON", &mut r.priority_epsilon)?;
        override_parsed(&lookup, "ROUTER_MAX_ABS_GAP", &mut r.max_abs_gap)?;
        override_parsed(&lookup, "ROUTER_MAX_REL_GAP", &mut r.max_rel_gap)?;
        override_parsed(&lookup, "ROUTER_MIN_GAP_TO_ALLOW_MULTI", &mut r.min_gap_to_allow_multi)?;
        override_parsed(&lookup, "ROUTER_AMBIGUITY_ABS_GAP", &mut r.ambiguity_abs_gap)?;
        override_parsed(&lookup, "ROUTER_AMBIGUITY_REL_GAP", &mut r.ambiguity_rel_gap)?;
        override_parsed(&lookup, "STOP_EARLY_MIN_MARGIN", &mut r.stop_early_min_margin)?;
        override_parsed(&lookup, "MAX_ALLOWED_TOPICS", &mut r.max_topics)?;

        let a = &mut self.assembler;
        override_parsed(&lookup, "MAX_ROUTER_BLOCKS", &mut a.max_router_blocks)?;
        override_parsed(&lookup, "MAX_SUPPORT_BLOCKS", &mut a.max_support_blocks)?;
        override_parsed(&lookup, "MAX_CATALOGUE_BLOCKS", &mut a.max_catalogue_blocks)?;
        override_parsed(&lookup, "MAX_PROMPT_TOKENS_APPROX", &mut a.max_prompt_tokens_approx)?;

        if let Some(filter) = lookup("FLOWPLAN_LOG") {
            self.logging.filter = filter;
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.router;
        if r.top_k == 0 || r.top_router == 0 {
            return Err(ConfigError::ValidationError(
                "router.top_k and router.top_router must be > 0".into(),
            ));
        }
        if r.top_router > r.top_k {
            return Err(ConfigError::ValidationError(format!(
                "router.top_router ({}) must not exceed router.top_k ({})",
                r.top_router, r.top_k
            )));
        }
        if r.max_topics == 0 {
            return Err(ConfigError::ValidationError(
                "router.max_topics must be >= 1".into(),
            ));
        }
        let thresholds = [
            ("priority_epsilon", r.priority_epsilon),
            ("max_abs_gap", r.max_abs_gap),
            ("max_rel_gap", r.max_rel_gap),
            ("min_gap_to_allow_multi", r.min_gap_to_allow_multi),
            ("ambiguity_abs_gap", r.ambiguity_abs_gap),
            ("ambiguity_rel_gap", r.ambiguity_rel_gap),
            ("stop_early_min_margin", r.stop_early_min_margin),
        ];
        if let Some((name, _)) = thresholds.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "router.{name} must be a non-negative number"
            )));
        }
        if let Some((legacy, _)) = r.aliases.iter().find(|(from, to)| from == to) {
            return Err(ConfigError::ValidationError(format!(
                "router.aliases maps '{legacy}' onto itself"
            )));
        }

        let a = &self.assembler;
        if a.max_router_blocks == 0
            || a.max_support_blocks == 0
            || a.max_catalogue_blocks == 0
            || a.max_prompt_tokens_approx == 0
        {
            return Err(ConfigError::ValidationError(
                "assembler caps must be > 0".into(),
            ));
        }
        if a.separator.is_empty() {
            return Err(ConfigError::ValidationError(
                "assembler.separator must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

fn override_parsed<T, F>(lookup: &F, name: &str, slot: &mut T) -> Result<(), ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = raw.trim().parse().map_err(|e: T::Err| ConfigError::EnvError {
            var: name.to_string(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid value in environment variable {var}: {reason}")]
    EnvError { var: String, reason: String },

    #[error("Config validation error: {0}")]
    ValidationError(String),

    #[error("Failed to initialise logging: {0}")]
    LoggingError(String),
}
