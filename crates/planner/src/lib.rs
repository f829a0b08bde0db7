//! # flowplan planner
//!
//! Turns a natural-language automation request into the prompt that steers
//! a workflow-plan generator:
//!
//! 1. **Route**: precedence gate, nearest-neighbor retrieval and centroid
//!    re-scoring pick one or two topics
//! 2. **Expand**: topics widen into their families, conflicting topics are
//!    stripped, supporting chunks are selected
//! 3. **Assemble**: chunks are bucketed, deduplicated, capped and joined
//!    with the query, and an audit (optionally a manifest) records what
//!    went in
//!
//! Routing and assembly are deterministic for fixed collaborator responses.

pub mod audit;
pub mod context;
pub mod expand;
pub mod manifest;
pub mod pipeline;
pub mod routing;

pub use audit::{AuditEntry, AuditRecord};
pub use context::{AssembleOptions, AssembledPrompt, Buckets, PromptAssembler, approx_tokens};
pub use expand::{Expansion, SupportExpander};
pub use manifest::{BuildInfo, Manifest, ManifestError, ManifestWriter, RegistryCounts};
pub use pipeline::Pipeline;
pub use routing::{
    FallbackReason, GateMatch, PrecedenceGate, RankingSource, RoutingResult, RoutingTrace,
    TopicRouter,
};
