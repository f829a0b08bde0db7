//! # flowplan catalog
//!
//! Chunk sources and the merged, immutable [`ChunkRegistry`].
//!
//! Two catalogues ship with the crate: a curated primary catalogue and an
//! older secondary one. [`ChunkRegistry::builtin`] merges them; custom
//! catalogues load through [`ChunkSource::from_path`].

pub mod registry;
pub mod source;

pub use registry::{ChunkRegistry, MergeReport};
pub use source::{ChunkSource, ChunkSpec, validate_specs};
