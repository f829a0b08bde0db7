//! Error types for the flowplan domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all flowplan operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("Assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Centroid store error: {0}")]
    Centroid(#[from] CentroidError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the embedding service.
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by embedding service, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Embedding service returned {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },
}

/// Failures of the vector similarity store.
#[derive(Debug, Clone, Error)]
pub enum VectorStoreError {
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Vector dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Query failed: {0}")]
    QueryFailed(String),
}

/// Failures that stop a routing call.
///
/// An empty topic list is not an error; see `RoutingResult::is_empty`.
#[derive(Debug, Clone, Error)]
pub enum RoutingError {
    #[error("Embedding service unavailable: {0}")]
    EmbeddingServiceUnavailable(#[source] EmbeddingError),

    #[error("Vector store unavailable: {0}")]
    VectorStoreUnavailable(#[source] VectorStoreError),
}

/// A prompt section subject to a block-count cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Static,
    AlwaysInject,
    Router,
    Support,
    Catalogue,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::AlwaysInject => "always_inject",
            Self::Router => "router",
            Self::Support => "support",
            Self::Catalogue => "catalogue",
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from prompt assembly. Caps are never enforced by truncation.
#[derive(Debug, Clone, Error)]
pub enum AssemblyError {
    #[error("Section '{section}' has {count} blocks after deduplication (limit {limit})")]
    SectionCapExceeded {
        section: Section,
        count: usize,
        limit: usize,
    },

    #[error("Prompt is ~{approx_tokens} tokens ({chars} chars), limit is {limit}")]
    PromptTooLarge {
        approx_tokens: usize,
        limit: usize,
        chars: usize,
    },

    #[error(transparent)]
    Routing(#[from] RoutingError),
}

/// Errors building or loading the chunk registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    #[error("Chunk validation failed:\n{}", .0.join("\n"))]
    Validation(Vec<String>),

    #[error("Duplicate chunk {key} in source '{source_name}'")]
    DuplicateKey { key: String, source_name: String },

    #[error("Failed to parse chunk source '{source_name}': {reason}")]
    Parse { source_name: String, reason: String },

    #[error("Failed to read chunk source {path}: {reason}")]
    Read { path: PathBuf, reason: String },
}

/// Errors loading the centroid artifact. Never fatal for routing.
#[derive(Debug, Error)]
pub enum CentroidError {
    #[error("Failed to read centroid artifact {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse centroid artifact {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Failed to write centroid artifact {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error(
        "Centroid artifact was built for {found_collection}/{found_model}, expected {expected_collection}/{expected_model}"
    )]
    KeyMismatch {
        expected_collection: String,
        expected_model: String,
        found_collection: String,
        found_model: String,
    },

    #[error("Centroid for topic '{topic}' has dimension {got}, expected {expected}")]
    DimensionMismatch {
        topic: String,
        expected: usize,
        got: usize,
    },
}
