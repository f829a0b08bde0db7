//! Chunk sources: TOML documents of `[[chunk]]` tables.
//!
//! ```toml
//! [[chunk]]
//! category = "rule"
//! topic = "loops"
//! priority = 88
//! role = "router"
//! signature = "ROUTER.RULE.loops ..."
//! body = """..."""
//! ```
//!
//! Every entry is validated before any [`Chunk`] is built, and all problems
//! are reported together.

use flowplan_core::{Chunk, ChunkCategory, ChunkRole, Origin, RegistryError, Topic};
use serde::Deserialize;
use std::path::Path;

/// One raw `[[chunk]]` table, before validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChunkSpec {
    pub category: String,
    pub topic: String,
    pub priority: i64,
    pub role: String,
    pub signature: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
struct SourceDocument {
    #[serde(default)]
    chunk: Vec<ChunkSpec>,
}

/// A validated list of chunks from one backing source.
#[derive(Debug, Clone)]
pub struct ChunkSource {
    name: String,
    origin: Origin,
    chunks: Vec<Chunk>,
}

impl ChunkSource {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(name: &str, origin: Origin, content: &str) -> Result<Self, RegistryError> {
        let doc: SourceDocument = toml::from_str(content).map_err(|e| RegistryError::Parse {
            source_name: name.to_string(),
            reason: e.to_string(),
        })?;
        Self::from_specs(name, origin, doc.chunk)
    }

    /// Read, parse and validate a TOML file. The file name becomes the source name.
    pub fn from_path(path: &Path, origin: Origin) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path).map_err(|e| RegistryError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_toml_str(&name, origin, &content)
    }

    /// Validate raw specs and convert them to chunks.
    pub fn from_specs(
        name: &str,
        origin: Origin,
        specs: Vec<ChunkSpec>,
    ) -> Result<Self, RegistryError> {
        let errors = validate_specs(&specs);
        if !errors.is_empty() {
            return Err(RegistryError::Validation(
                errors.into_iter().map(|e| format!("[{name}] {e}")).collect(),
            ));
        }

        let mut chunks = Vec::with_capacity(specs.len());
        for spec in specs {
            chunks.push(spec_to_chunk(spec, origin)?);
        }
        tracing::debug!(source = name, count = chunks.len(), "Loaded chunk source");

        Ok(Self {
            name: name.to_string(),
            origin,
            chunks,
        })
    }

    /// Wrap already-built chunks. Their `origin` is overwritten with the
    /// source's origin.
    pub fn from_chunks(name: &str, origin: Origin, chunks: Vec<Chunk>) -> Self {
        let chunks = chunks
            .into_iter()
            .map(|mut c| {
                c.origin = origin;
                c
            })
            .collect();
        Self {
            name: name.to_string(),
            origin,
            chunks,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Check every spec, returning one message per problem.
pub fn validate_specs(specs: &[ChunkSpec]) -> Vec<String> {
    let mut errors = Vec::new();

    for (i, spec) in specs.iter().enumerate() {
        if spec.signature.trim().is_empty() {
            errors.push(format!("Chunk[{i}] has empty signature"));
        }
        if spec.body.trim().is_empty() {
            errors.push(format!("Chunk[{i}] has empty body"));
        }
        if spec.priority < 0 || spec.priority > i64::from(u32::MAX) {
            errors.push(format!("Chunk[{i}] priority out of range: {}", spec.priority));
        }
        if parse_role(&spec.role).is_none() {
            errors.push(format!("Chunk[{i}] invalid role: {}", spec.role));
        }
        if parse_category(&spec.category).is_none() {
            errors.push(format!("Chunk[{i}] invalid category: {}", spec.category));
        }
        if spec.topic.parse::<Topic>().is_err() {
            errors.push(format!("Chunk[{i}] unknown topic: {}", spec.topic));
        }
    }

    errors
}

fn spec_to_chunk(spec: ChunkSpec, origin: Origin) -> Result<Chunk, RegistryError> {
    let invalid = |what: &str, value: &str| {
        RegistryError::Validation(vec![format!("invalid {what}: {value}")])
    };

    let category =
        parse_category(&spec.category).ok_or_else(|| invalid("category", &spec.category))?;
    let role = parse_role(&spec.role).ok_or_else(|| invalid("role", &spec.role))?;
    let priority = u32::try_from(spec.priority)
        .map_err(|_| invalid("priority", &spec.priority.to_string()))?;

    Ok(Chunk {
        category,
        topic: spec.topic.parse()?,
        priority,
        role,
        signature: spec.signature.trim().to_string(),
        body: spec.body.trim().to_string(),
        origin,
    })
}

fn parse_role(raw: &str) -> Option<ChunkRole> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "router" => Some(ChunkRole::Router),
        "support" => Some(ChunkRole::Support),
        "static" => Some(ChunkRole::Static),
        _ => None,
    }
}

fn parse_category(raw: &str) -> Option<ChunkCategory> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "core" => Some(ChunkCategory::Core),
        "rule" => Some(ChunkCategory::Rule),
        "catalog" => Some(ChunkCategory::Catalog),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
[[chunk]]
category = "rule"
topic = "loops"
priority = 88
role = "router"
signature = "ROUTER.RULE.loops"
body = """
  Loop rules
"""

[[chunk]]
category = "CATALOG"
topic = "triggers_catalog"
priority = 40
role = "support"
signature = "Trigger list"
body = "TRG_DB = Database Trigger"
"#;

    #[test]
    fn parses_and_trims() {
        let source = ChunkSource::from_toml_str("test", Origin::Primary, VALID).unwrap();
        assert_eq!(source.len(), 2);
        let loops = &source.chunks()[0];
        assert_eq!(loops.topic, Topic::Loops);
        assert_eq!(loops.role, ChunkRole::Router);
        assert_eq!(loops.body, "Loop rules");
        assert_eq!(loops.origin, Origin::Primary);
        assert_eq!(source.chunks()[1].category, ChunkCategory::Catalog);
    }

    #[test]
    fn every_problem_is_reported() {
        let bad = r#"
[[chunk]]
category = "rule"
topic = "loopz"
priority = -1
role = "helper"
signature = " "
body = ""
"#;
        let err = ChunkSource::from_toml_str("bad", Origin::Primary, bad).unwrap_err();
        let errors = match err {
            RegistryError::Validation(errors) => errors,
            other => panic!("expected validation error, got {other:?}"),
        };
        assert_eq!(errors.len(), 5);
        assert!(errors.iter().all(|e| e.starts_with("[bad] Chunk[0]")));
        assert!(errors.iter().any(|e| e.contains("loopz")));
        assert!(errors.iter().any(|e| e.contains("helper")));
    }

    #[test]
    fn unknown_field_is_a_parse_error() {
        let doc = r#"
[[chunk]]
doc_type = "RULE"
category = "rule"
topic = "loops"
priority = 1
role = "router"
signature = "s"
body = "b"
"#;
        let err = ChunkSource::from_toml_str("legacy", Origin::Secondary, doc).unwrap_err();
        assert!(matches!(err, RegistryError::Parse { .. }));
    }

    #[test]
    fn empty_document_is_an_empty_source() {
        let source = ChunkSource::from_toml_str("empty", Origin::Secondary, "").unwrap();
        assert!(source.is_empty());
    }

    #[test]
    fn from_path_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extra.toml");
        std::fs::write(&path, VALID).unwrap();
        let source = ChunkSource::from_path(&path, Origin::Secondary).unwrap();
        assert_eq!(source.name(), "extra.toml");
        assert!(source.chunks().iter().all(|c| c.origin == Origin::Secondary));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = ChunkSource::from_path(Path::new("/nonexistent/chunks.toml"), Origin::Primary)
            .unwrap_err();
        assert!(matches!(err, RegistryError::Read { .. }));
    }
}
