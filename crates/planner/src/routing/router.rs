//! Topic router.
//!
//! Maps a free-text query to at most two topics:
//!
//! 1. **Precedence gate**: lexical overrides, short-circuit everything
//! 2. **Retrieval**: embed once, nearest-neighbor search, router chunks only
//! 3. **Grouping**: nearest `top_router` candidates grouped by chunk key
//! 4. **Tie-break**: near-equal groups reordered by priority
//! 5. **Centroid re-scoring**: topics re-ranked against per-topic centroids,
//!    then legacy aliases folded onto their canonical topics
//! 6. **Stop-early margin**: stop-early topics must win clearly
//! 7. **Secondary admission**: ambiguity-gated, at most one
//! 8. **Output filtering**: blacklist, retrieval guard, cap
//!
//! Routing is deterministic for a fixed registry, centroid store and
//! embedding / vector-store responses. Nothing is cached between calls.

use flowplan_config::RouterSettings;
use flowplan_core::{Candidate, ChunkKey, ChunkRole, Embedder, RoutingError, Topic, VectorStore};
use flowplan_retrieval::CentroidStore;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::routing::gate::PrecedenceGate;

const RETRIEVAL_VERBS: &[&str] = &["get", "list", "show", "fetch", "retrieve", "find"];
const RETRIEVAL_PHRASES: &[&str] = &["get records", "list records", "retrieve records"];

// ── Types ─────────────────────────────────────────────────────────────────

/// Summary of one `(category, topic, role)` group among router candidates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicGroup {
    pub key: ChunkKey,
    pub topic: Topic,
    /// Minimum candidate distance in the group.
    pub best_distance: f32,
    pub size: usize,
    pub priority: u32,
}

/// Distance from the query embedding to one topic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TopicScore {
    pub topic: Topic,
    pub distance: f32,
}

/// Why centroid re-scoring was not used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// No centroid artifact was loaded.
    NoCentroidStore,
    /// None of the surviving topics has a centroid.
    NoCentroidForCandidates,
}

/// Which signal produced the ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum RankingSource {
    Gate,
    Centroid,
    NearestNeighbor { reason: FallbackReason },
}

/// Intermediate state kept for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoutingTrace {
    pub router_hits: usize,
    /// Groups after filtering and tie-break, best first.
    pub groups: Vec<TopicGroup>,
    /// Final ranking the winner was picked from, best first.
    pub ranking: Vec<TopicScore>,
    /// Set when a stop-early winner lost to the runner-up on margin.
    pub demoted: Option<Topic>,
    /// Topics removed by output filtering.
    pub filtered: Vec<Topic>,
}

/// Wall-clock timings in milliseconds. Diagnostic only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RoutingTiming {
    pub embed_ms: f64,
    pub search_ms: f64,
    pub total_ms: f64,
}

/// Result of a single routing call.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingResult {
    /// Ordered topics, winner first. Zero, one or two entries.
    pub topics: Vec<Topic>,
    pub ranking: RankingSource,
    /// Name of the gate rule that forced the result, if any.
    pub forced_by: Option<&'static str>,
    pub trace: RoutingTrace,
    pub timing: RoutingTiming,
}

impl RoutingResult {
    pub fn winner(&self) -> Option<Topic> {
        self.topics.first().copied()
    }

    pub fn secondary(&self) -> Option<Topic> {
        self.topics.get(1).copied()
    }

    /// No topic survived routing. Not an error; callers decide.
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

// ── Router ────────────────────────────────────────────────────────────────

/// Embedding-based topic classifier with deterministic overrides.
pub struct TopicRouter {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    centroids: Option<Arc<CentroidStore>>,
    gate: PrecedenceGate,
    settings: RouterSettings,
}

impl TopicRouter {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        centroids: Option<Arc<CentroidStore>>,
        settings: RouterSettings,
    ) -> Self {
        Self {
            embedder,
            store,
            centroids,
            gate: PrecedenceGate::default(),
            settings,
        }
    }

    /// Replace the precedence gate.
    pub fn with_gate(mut self, gate: PrecedenceGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    pub fn embedding_model(&self) -> &str {
        self.embedder.model_id()
    }

    pub fn collection(&self) -> &str {
        self.store.collection()
    }

    pub async fn route(&self, query: &str) -> Result<RoutingResult, RoutingError> {
        let started = Instant::now();

        if let Some(hit) = self.gate.evaluate(query) {
            info!(rule = hit.rule, topic = %hit.topic, "Precedence gate forced topic");
            return Ok(RoutingResult {
                topics: vec![hit.topic],
                ranking: RankingSource::Gate,
                forced_by: Some(hit.rule),
                trace: RoutingTrace::default(),
                timing: RoutingTiming {
                    total_ms: elapsed_ms(started),
                    ..Default::default()
                },
            });
        }

        let embed_started = Instant::now();
        let vector = self
            .embedder
            .embed_one(query)
            .await
            .map_err(RoutingError::EmbeddingServiceUnavailable)?;
        let embed_ms = elapsed_ms(embed_started);

        let search_started = Instant::now();
        let candidates = self
            .store
            .query(&vector, self.settings.top_k)
            .await
            .map_err(RoutingError::VectorStoreUnavailable)?;
        let search_ms = elapsed_ms(search_started);

        let mut routers: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| c.metadata.role == ChunkRole::Router)
            .collect();
        routers.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        routers.truncate(self.settings.top_router);

        let mut trace = RoutingTrace {
            router_hits: routers.len(),
            groups: self.rank_groups(&routers),
            ..Default::default()
        };

        for g in &trace.groups {
            debug!(
                topic = %g.topic,
                best_distance = g.best_distance,
                priority = g.priority,
                size = g.size,
                "Router group"
            );
        }

        let (ranking, source) = self.rank_topics(&trace.groups, &vector);
        trace.ranking = self.resolve_aliases(ranking);

        let selected = match source {
            RankingSource::NearestNeighbor { .. } => self.select_nearest_neighbor(&trace.ranking),
            _ => self.select_by_centroid(&trace.ranking, &mut trace.demoted),
        };

        let topics = self.filter_output(query, selected, &mut trace.filtered);

        let timing = RoutingTiming {
            embed_ms,
            search_ms,
            total_ms: elapsed_ms(started),
        };
        info!(
            topics = ?topics.iter().map(Topic::as_str).collect::<Vec<_>>(),
            ranking = ?source,
            router_hits = trace.router_hits,
            total_ms = timing.total_ms,
            "Routed query"
        );

        Ok(RoutingResult {
            topics,
            ranking: source,
            forced_by: None,
            trace,
            timing,
        })
    }

    /// Group router candidates by key, drop small groups, sort by distance
    /// and apply the priority tie-break.
    fn rank_groups(&self, routers: &[Candidate]) -> Vec<TopicGroup> {
        let mut order: Vec<ChunkKey> = Vec::new();
        let mut by_key: HashMap<ChunkKey, TopicGroup> = HashMap::new();

        for c in routers {
            let key = c.metadata.key();
            match by_key.get_mut(&key) {
                Some(group) => {
                    group.size += 1;
                    group.best_distance = group.best_distance.min(c.distance);
                    group.priority = group.priority.max(c.metadata.priority);
                }
                None => {
                    order.push(key);
                    by_key.insert(
                        key,
                        TopicGroup {
                            key,
                            topic: c.metadata.topic,
                            best_distance: c.distance,
                            size: 1,
                            priority: c.metadata.priority,
                        },
                    );
                }
            }
        }

        let mut groups: Vec<TopicGroup> = order
            .into_iter()
            .filter_map(|k| by_key.remove(&k))
            .filter(|g| g.size >= self.settings.min_group_size)
            .collect();

        groups.sort_by(|a, b| {
            a.best_distance
                .total_cmp(&b.best_distance)
                .then_with(|| a.key.cmp(&b.key))
        });

        // Single forward pass.
        for i in 0..groups.len().saturating_sub(1) {
            let gap = groups[i + 1].best_distance - groups[i].best_distance;
            if gap.abs() < self.settings.priority_epsilon
                && groups[i + 1].priority > groups[i].priority
            {
                groups.swap(i, i + 1);
            }
        }

        groups
    }

    /// Topic ranking from centroids when available, otherwise from groups.
    fn rank_topics(
        &self,
        groups: &[TopicGroup],
        vector: &[f32],
    ) -> (Vec<TopicScore>, RankingSource) {
        let mut by_group: Vec<TopicScore> = Vec::new();
        for g in groups {
            if !by_group.iter().any(|s| s.topic == g.topic) {
                by_group.push(TopicScore {
                    topic: g.topic,
                    distance: g.best_distance,
                });
            }
        }

        let Some(centroids) = self.centroids.as_deref() else {
            return (
                by_group,
                RankingSource::NearestNeighbor {
                    reason: FallbackReason::NoCentroidStore,
                },
            );
        };

        let mut scored: Vec<TopicScore> = by_group
            .iter()
            .filter_map(|s| match centroids.distance(s.topic, vector) {
                Some(distance) => Some(TopicScore {
                    topic: s.topic,
                    distance,
                }),
                None => {
                    debug!(topic = %s.topic, "No usable centroid for topic, dropped from ranking");
                    None
                }
            })
            .collect();

        if scored.is_empty() {
            return (
                by_group,
                RankingSource::NearestNeighbor {
                    reason: FallbackReason::NoCentroidForCandidates,
                },
            );
        }

        // Stable: equal distances keep group order.
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        for s in &scored {
            debug!(topic = %s.topic, distance = s.distance, "Centroid score");
        }
        (scored, RankingSource::Centroid)
    }

    /// Fold legacy aliases onto canonical topics. Each canonical topic keeps
    /// its best (first) score, so stop-early rules see the canonical topic.
    fn resolve_aliases(&self, ranking: Vec<TopicScore>) -> Vec<TopicScore> {
        let mut resolved: Vec<TopicScore> = Vec::with_capacity(ranking.len());
        for s in ranking {
            let topic = self.settings.aliases.get(&s.topic).copied().unwrap_or(s.topic);
            if !resolved.iter().any(|r| r.topic == topic) {
                resolved.push(TopicScore {
                    topic,
                    distance: s.distance,
                });
            }
        }
        resolved
    }

    /// Steps 6 and 7 over a centroid ranking.
    fn select_by_centroid(
        &self,
        ranking: &[TopicScore],
        demoted: &mut Option<Topic>,
    ) -> Vec<Topic> {
        let Some(first) = ranking.first() else {
            return Vec::new();
        };

        let mut order: Vec<TopicScore> = ranking.to_vec();
        if self.settings.is_stop_early(first.topic) {
            if let Some(runner_up) = ranking.get(1) {
                let margin = runner_up.distance - first.distance;
                if margin < self.settings.stop_early_min_margin {
                    debug!(
                        topic = %first.topic,
                        runner_up = %runner_up.topic,
                        margin,
                        "Stop-early topic lost on margin"
                    );
                    *demoted = Some(first.topic);
                    order.swap(0, 1);
                }
            }
        }

        let winner = order[0];
        if self.settings.is_stop_early(winner.topic) || self.settings.max_topics < 2 {
            return vec![winner.topic];
        }

        let mut topics = vec![winner.topic];
        if let Some(next) = order.get(1) {
            if !self.settings.is_stop_early(next.topic) && self.within_ambiguity(winner, *next) {
                topics.push(next.topic);
            }
        }
        topics
    }

    /// Fallback selection over group distances: no margin, no ambiguity
    /// window. A second topic needs to be close to the winner but not
    /// indistinguishable from it.
    fn select_nearest_neighbor(&self, ranking: &[TopicScore]) -> Vec<Topic> {
        let Some(&winner) = ranking.first() else {
            return Vec::new();
        };
        if self.settings.is_stop_early(winner.topic) || self.settings.max_topics < 2 {
            return vec![winner.topic];
        }

        let secondary = ranking[1..].iter().find(|s| {
            if self.settings.is_stop_early(s.topic) {
                return false;
            }
            let (abs_gap, rel_gap) = gaps(winner.distance, s.distance);
            abs_gap <= self.settings.max_abs_gap
                && rel_gap <= self.settings.max_rel_gap
                && abs_gap >= self.settings.min_gap_to_allow_multi
        });

        let mut topics = vec![winner.topic];
        if let Some(s) = secondary {
            topics.push(s.topic);
        }
        topics
    }

    fn within_ambiguity(&self, winner: TopicScore, next: TopicScore) -> bool {
        let (abs_gap, rel_gap) = gaps(winner.distance, next.distance);
        let s = &self.settings;
        abs_gap <= s.ambiguity_abs_gap
            && rel_gap <= s.ambiguity_rel_gap
            && abs_gap <= s.max_abs_gap
            && rel_gap <= s.max_rel_gap
    }

    /// Blacklist, retrieval guard and cap.
    fn filter_output(
        &self,
        query: &str,
        selected: Vec<Topic>,
        filtered: &mut Vec<Topic>,
    ) -> Vec<Topic> {
        let (mut topics, blacklisted): (Vec<Topic>, Vec<Topic>) = selected
            .into_iter()
            .partition(|t| !self.settings.blacklist.contains(t));
        filtered.extend(blacklisted);

        if is_retrieval_query(query) {
            let before = topics.len();
            topics.retain(|t| *t != Topic::ActionsBuiltinFiltering);
            if topics.len() != before {
                filtered.push(Topic::ActionsBuiltinFiltering);
                if topics.is_empty() {
                    topics.push(Topic::DataRetrievalFiltering);
                }
            }
        }

        topics.truncate(self.settings.max_topics);
        topics
    }
}

/// Absolute and relative gap of `next` over `best`.
fn gaps(best: f32, next: f32) -> (f32, f32) {
    let abs_gap = next - best;
    let rel_gap = next / best.max(1e-9);
    (abs_gap, rel_gap)
}

/// Queries that open with a retrieval verb, or ask for records outright.
pub fn is_retrieval_query(query: &str) -> bool {
    let q = query.trim().to_lowercase();
    let opens_with_verb = q
        .split_whitespace()
        .next()
        .is_some_and(|first| RETRIEVAL_VERBS.contains(&first));
    opens_with_verb || RETRIEVAL_PHRASES.iter().any(|p| q.contains(p))
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
