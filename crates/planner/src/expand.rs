//! Support expansion: routed topics → the chunks that back them.
//!
//! Pure function of the registry and the topic list. The working set is
//! widened through an explicit family table, narrowed by ordered mutual
//! exclusions, then the always-include topics are added back.

use flowplan_catalog::ChunkRegistry;
use flowplan_config::ExpanderSettings;
use flowplan_core::{Chunk, ChunkCategory, ChunkRole, Topic};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Topics whose lexical children (`conditions.bin`, ...) join them.
const CHILD_FAMILIES: &[Topic] = &[Topic::Conditions];

/// Extra topics pulled in by a topic.
const COMPANIONS: &[(Topic, &[Topic])] = &[(Topic::Loops, &[Topic::FlowFormatting])];

/// `(trigger, stripped)` pairs, evaluated in order against the working set.
const EXCLUSIONS: &[(Topic, &[Topic])] = &[
    (
        Topic::StaticVsDynamic,
        &[
            Topic::ActionsBuiltinFiltering,
            Topic::DataRetrievalFiltering,
            Topic::UserMgmt,
        ],
    ),
    (
        Topic::ActionsBuiltinFiltering,
        &[Topic::StaticVsDynamic, Topic::UserMgmt],
    ),
    (
        Topic::UserMgmt,
        &[
            Topic::StaticVsDynamic,
            Topic::ActionsBuiltinFiltering,
            Topic::DataRetrievalFiltering,
        ],
    ),
];

/// Result of expanding a topic list.
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    /// Final working set.
    pub topics: BTreeSet<Topic>,
    /// Selected chunks, one per key, in key order.
    pub chunks: Vec<Chunk>,
}

impl Expansion {
    pub fn contains_topic(&self, topic: Topic) -> bool {
        self.topics.contains(&topic)
    }
}

pub struct SupportExpander {
    registry: Arc<ChunkRegistry>,
    settings: ExpanderSettings,
}

impl SupportExpander {
    pub fn new(registry: Arc<ChunkRegistry>, settings: ExpanderSettings) -> Self {
        Self { registry, settings }
    }

    pub fn expand(&self, topics: &[Topic]) -> Expansion {
        let mut working: BTreeSet<Topic> = topics.iter().copied().collect();

        let known = self.registry.topics();
        for parent in CHILD_FAMILIES {
            if working.contains(parent) {
                working.extend(known.iter().copied().filter(|t| t.is_child_of(*parent)));
            }
        }
        for (topic, companions) in COMPANIONS {
            if working.contains(topic) {
                working.extend(companions.iter().copied());
            }
        }

        for (trigger, stripped) in EXCLUSIONS {
            if !working.contains(trigger) {
                continue;
            }
            working.retain(|t| !stripped.iter().any(|s| t.is_in_family_of(*s)));
        }

        working.extend(self.settings.always_include.iter().copied());

        let chunks: Vec<Chunk> = self
            .registry
            .iter()
            .filter(|c| c.role != ChunkRole::Static && working.contains(&c.topic))
            .filter(|c| c.category != ChunkCategory::Catalog || topics.contains(&c.topic))
            .cloned()
            .collect();

        tracing::debug!(
            requested = topics.len(),
            working = working.len(),
            chunks = chunks.len(),
            "Expanded topics"
        );

        Expansion {
            topics: working,
            chunks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowplan_core::Origin;

    fn chunk(category: ChunkCategory, topic: Topic, role: ChunkRole) -> Chunk {
        Chunk {
            category,
            topic,
            priority: 50,
            role,
            signature: format!("sig {topic}"),
            body: format!("body {topic} {}", role.as_str()),
            origin: Origin::Primary,
        }
    }

    fn rule(topic: Topic, role: ChunkRole) -> Chunk {
        chunk(ChunkCategory::Rule, topic, role)
    }

    fn expander() -> SupportExpander {
        let registry = ChunkRegistry::from_chunks(vec![
            chunk(ChunkCategory::Core, Topic::CoreIntro, ChunkRole::Static),
            rule(Topic::Conditions, ChunkRole::Router),
            rule(Topic::Conditions, ChunkRole::Support),
            rule(Topic::ConditionsBin, ChunkRole::Router),
            rule(Topic::ConditionsGuardrails, ChunkRole::Support),
            rule(Topic::Loops, ChunkRole::Router),
            rule(Topic::FlowFormatting, ChunkRole::Support),
            rule(Topic::StaticVsDynamic, ChunkRole::Router),
            rule(Topic::ActionsBuiltinFiltering, ChunkRole::Router),
            rule(Topic::ActionsCreate, ChunkRole::Router),
            rule(Topic::UserMgmt, ChunkRole::Router),
            rule(Topic::UserMgmtStop, ChunkRole::Support),
            rule(Topic::DataRetrievalFiltering, ChunkRole::Router),
            rule(Topic::PlannerPolicy, ChunkRole::Support),
            chunk(ChunkCategory::Catalog, Topic::TriggersCatalog, ChunkRole::Support),
        ])
        .unwrap();
        SupportExpander::new(Arc::new(registry), ExpanderSettings::default())
    }

    fn topics_of(e: &Expansion) -> Vec<Topic> {
        let mut v: Vec<Topic> = e.chunks.iter().map(|c| c.topic).collect();
        v.dedup();
        v
    }

    #[test]
    fn conditions_pull_in_lexical_children() {
        let e = expander().expand(&[Topic::Conditions]);
        assert!(e.contains_topic(Topic::ConditionsBin));
        assert!(e.contains_topic(Topic::ConditionsGuardrails));
        assert!(!e.contains_topic(Topic::Loops));
    }

    #[test]
    fn loops_pull_in_flow_formatting() {
        let e = expander().expand(&[Topic::Loops]);
        assert!(topics_of(&e).contains(&Topic::FlowFormatting));
    }

    #[test]
    fn always_include_is_added() {
        let e = expander().expand(&[]);
        assert_eq!(topics_of(&e), vec![Topic::PlannerPolicy]);
    }

    #[test]
    fn static_strips_crud_and_user_management() {
        let e = expander().expand(&[
            Topic::StaticVsDynamic,
            Topic::ActionsBuiltinFiltering,
            Topic::UserMgmt,
        ]);
        assert!(e.contains_topic(Topic::StaticVsDynamic));
        assert!(!e.contains_topic(Topic::ActionsBuiltinFiltering));
        assert!(!e.contains_topic(Topic::UserMgmt));
        assert!(e.chunks.iter().all(|c| !c.topic.is_in_family_of(Topic::UserMgmt)));
    }

    #[test]
    fn stripping_removes_lexical_children() {
        let e = expander().expand(&[
            Topic::ActionsBuiltinFiltering,
            Topic::UserMgmt,
            Topic::UserMgmtStop,
        ]);
        assert!(e.contains_topic(Topic::ActionsBuiltinFiltering));
        assert!(!e.contains_topic(Topic::UserMgmtStop));
    }

    #[test]
    fn user_management_strips_crud_family() {
        let e = expander().expand(&[Topic::UserMgmt, Topic::DataRetrievalFiltering]);
        assert_eq!(
            e.topics,
            BTreeSet::from([Topic::UserMgmt, Topic::PlannerPolicy])
        );
    }

    #[test]
    fn catalog_chunks_need_an_explicit_topic() {
        let mut settings = ExpanderSettings::default();
        settings.always_include.push(Topic::TriggersCatalog);
        let base = expander();
        let e = SupportExpander::new(base.registry.clone(), settings).expand(&[Topic::Loops]);
        assert!(e.contains_topic(Topic::TriggersCatalog));
        assert!(e.chunks.iter().all(|c| c.category != ChunkCategory::Catalog));

        let e = base.expand(&[Topic::TriggersCatalog]);
        assert!(e.chunks.iter().any(|c| c.category == ChunkCategory::Catalog));
    }

    #[test]
    fn static_chunks_are_never_selected() {
        let e = expander().expand(&[Topic::CoreIntro]);
        assert!(e.chunks.iter().all(|c| c.role != ChunkRole::Static));
    }

    #[test]
    fn expansion_is_deterministic() {
        let x = expander();
        let topics = [Topic::Conditions, Topic::Loops];
        assert_eq!(x.expand(&topics), x.expand(&topics));
    }
}
