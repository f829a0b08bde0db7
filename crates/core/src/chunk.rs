//! Chunks: the instructional text blocks a prompt is assembled from.
//!
//! A chunk carries two texts with strictly separated purposes:
//! - `signature` is the only text ever embedded for classification
//! - `body` is the only text ever inserted into an assembled prompt

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::topic::Topic;

/// Coarse chunk category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkCategory {
    /// Always-injected introduction material.
    Core,
    /// A rule block.
    Rule,
    /// A lookup catalogue (enum listings). Expensive; never pulled in as a
    /// side effect of topic widening.
    Catalog,
}

impl ChunkCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Rule => "rule",
            Self::Catalog => "catalog",
        }
    }
}

/// How a chunk takes part in routing and assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkRole {
    /// Used for classification and included when its topic wins.
    Router,
    /// Included only when its topic is selected.
    Support,
    /// Always injected, never classification input.
    Static,
}

impl ChunkRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Router => "router",
            Self::Support => "support",
            Self::Static => "static",
        }
    }
}

/// Which backing source supplied a chunk's body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// The curated catalogue.
    Primary,
    /// The older, laxer catalogue.
    Secondary,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

/// Identity key of a chunk. Unique inside a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey {
    pub category: ChunkCategory,
    pub topic: Topic,
    pub role: ChunkRole,
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.category.as_str(),
            self.topic,
            self.role.as_str()
        )
    }
}

/// Classification metadata stored next to each indexed signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub category: ChunkCategory,
    pub topic: Topic,
    pub role: ChunkRole,
    pub priority: u32,
}

impl ChunkMetadata {
    pub fn key(&self) -> ChunkKey {
        ChunkKey {
            category: self.category,
            topic: self.topic,
            role: self.role,
        }
    }
}

/// An immutable instructional text block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub category: ChunkCategory,
    pub topic: Topic,
    pub priority: u32,
    pub role: ChunkRole,
    /// Short text used only for embedding.
    pub signature: String,
    /// Full text inserted into the prompt.
    pub body: String,
    pub origin: Origin,
}

impl Chunk {
    pub fn key(&self) -> ChunkKey {
        ChunkKey {
            category: self.category,
            topic: self.topic,
            role: self.role,
        }
    }

    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            category: self.category,
            topic: self.topic,
            role: self.role,
            priority: self.priority,
        }
    }

    /// Stable identifier used as the vector-store id for this chunk.
    pub fn id(&self) -> String {
        self.key().to_string()
    }

    /// Body with all whitespace runs collapsed to single spaces.
    pub fn normalized_body(&self) -> String {
        normalize_text(&self.body)
    }

    /// Content fingerprint of the normalized body.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.body)
    }
}

/// Collapse whitespace runs to single spaces and trim both ends.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hex SHA-256 of the normalized text.
pub fn fingerprint(text: &str) -> String {
    let digest = Sha256::digest(normalize_text(text).as_bytes());
    format!("{digest:x}")
}
