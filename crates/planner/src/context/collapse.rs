//! Block-level deduplication.
//!
//! Comparisons use whitespace-normalized bodies, so layout differences
//! between catalogues never keep two copies of the same rule alive.

use flowplan_core::{Chunk, normalize_text};
use std::collections::HashSet;

/// Descending priority, ties by identity key.
pub fn sort_by_priority(chunks: &mut [Chunk]) {
    chunks.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.key().cmp(&b.key())));
}

/// Keep the first chunk for each content fingerprint.
pub fn dedupe_by_fingerprint(chunks: Vec<Chunk>) -> Vec<Chunk> {
    let mut seen = HashSet::new();
    chunks
        .into_iter()
        .filter(|c| seen.insert(c.fingerprint()))
        .collect()
}

/// Sort, then dedupe, so the surviving copy is the highest-priority one.
pub fn normalize_bucket(mut chunks: Vec<Chunk>) -> Vec<Chunk> {
    sort_by_priority(&mut chunks);
    dedupe_by_fingerprint(chunks)
}

/// Drop every chunk whose body is a substring of a longer kept body.
///
/// Order of the survivors is preserved. Idempotent.
pub fn collapse_contained(chunks: Vec<Chunk>) -> Vec<Chunk> {
    let bodies: Vec<String> = chunks.iter().map(Chunk::normalized_body).collect();

    let mut by_length: Vec<usize> = (0..chunks.len()).collect();
    by_length.sort_by(|&a, &b| bodies[b].len().cmp(&bodies[a].len()).then(a.cmp(&b)));

    let mut kept: Vec<usize> = Vec::with_capacity(chunks.len());
    for i in by_length {
        if !kept.iter().any(|&k| bodies[k].contains(bodies[i].as_str())) {
            kept.push(i);
        }
    }

    let kept: HashSet<usize> = kept.into_iter().collect();
    chunks
        .into_iter()
        .enumerate()
        .filter(|(i, _)| kept.contains(i))
        .map(|(_, c)| c)
        .collect()
}

/// Drop chunks whose body appears inside any of `containers`.
pub fn drop_contained_in(chunks: Vec<Chunk>, containers: &[Chunk]) -> Vec<Chunk> {
    let outer: Vec<String> = containers.iter().map(Chunk::normalized_body).collect();
    chunks
        .into_iter()
        .filter(|c| {
            let body = c.normalized_body();
            !outer.iter().any(|o| o.contains(body.as_str()))
        })
        .collect()
}

/// Drop chunks whose fingerprint is in `taken`.
pub fn drop_fingerprints(chunks: Vec<Chunk>, taken: &HashSet<String>) -> Vec<Chunk> {
    chunks
        .into_iter()
        .filter(|c| !taken.contains(&c.fingerprint()))
        .collect()
}
