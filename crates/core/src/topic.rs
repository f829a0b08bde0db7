//! The closed topic taxonomy.
//!
//! Every chunk, routing decision and configuration table refers to a
//! [`Topic`]. Topics serialize to their historical string identifiers
//! (flat like `"conditions"` or dotted like `"conditions.bin"`), and parsing
//! an unknown identifier fails, so a misspelled topic in a catalogue or a
//! config file is rejected at load time rather than silently never matching.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::RegistryError;

macro_rules! topics {
    ($($(#[$doc:meta])* $variant:ident => $id:literal),+ $(,)?) => {
        /// A topic identifier from the fixed taxonomy.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Topic {
            $($(#[$doc])* $variant,)+
        }

        impl Topic {
            /// Every topic, in declaration order.
            pub const ALL: &'static [Topic] = &[$(Topic::$variant,)+];

            /// The string identifier used in catalogues, configs and manifests.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Topic::$variant => $id,)+
                }
            }
        }

        impl FromStr for Topic {
            type Err = RegistryError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($id => Ok(Topic::$variant),)+
                    other => Err(RegistryError::UnknownTopic(other.to_string())),
                }
            }
        }
    };
}

topics! {
    /// Static introduction injected into every prompt.
    CoreIntro => "core_intro",
    /// Actions on a user account.
    UserMgmt => "user_mgmt",
    /// Static reference dimensions (roles, departments).
    StaticVsDynamic => "static_vs_dynamic",
    /// Internal disambiguation between `user_mgmt` and `static_vs_dynamic`.
    RouterDisambiguation => "router_disambiguation",
    /// Record CRUD with built-in filtering.
    ActionsBuiltinFiltering => "actions_builtin_filtering",
    NotificationsIntent => "notifications_intent",
    DataOpsRules => "data_ops_rules",
    DataRetrievalFiltering => "data_retrieval_filtering",
    /// Branching logic.
    Conditions => "conditions",
    ConditionsBin => "conditions.bin",
    ConditionsSeq => "conditions.seq",
    ConditionsDom => "conditions.dom",
    ConditionsDistinctionTable => "conditions.distinction_table",
    ConditionsGuardrails => "conditions.guardrails",
    /// Repetition constructs.
    Loops => "loops",
    FlowFormatting => "flow_formatting",
    TriggersCatalog => "triggers_catalog",
    TriggersRules => "triggers_rules",
    PlannerPolicy => "planner_policy",
    OutputContract => "output_contract",

    // Legacy identifiers, still present in the secondary catalogue.
    UserMgmtStop => "user_mgmt.stop",
    StaticVsDynamicStop => "static_vs_dynamic.stop",
    DataExtraction => "data_extraction",
    DataExtractionJmes => "data_extraction.jmes",
    DataExtractionFltr => "data_extraction.fltr",
    DataExtractionRcrdInfo => "data_extraction.rcrd_info",
    ActionsCreate => "actions_builtin_filtering.create",
    ActionsUpdate => "actions_builtin_filtering.update",
    ActionsDelete => "actions_builtin_filtering.delete",
    ActionsDuplicate => "actions_builtin_filtering.duplicate",
    ActionsRestore => "actions_builtin_filtering.restore",
    DataOps => "data_ops",
    DataOpsGuardrails => "data_ops.guardrails",
    Notifications => "notifications",
    NotificationsMap => "notifications.map",
}

impl Topic {
    /// Whether `self` is a lexical child of `parent`: its identifier starts
    /// with the parent's identifier followed by `.` or `_`.
    ///
    /// `conditions.bin` is a child of `conditions`; `conditions` is not a
    /// child of itself.
    pub fn is_child_of(&self, parent: Topic) -> bool {
        let id = self.as_str();
        let p = parent.as_str();
        id.len() > p.len()
            && id.starts_with(p)
            && matches!(id.as_bytes()[p.len()], b'.' | b'_')
    }

    /// `self == other` or `self` is a lexical child of `other`.
    pub fn is_in_family_of(&self, other: Topic) -> bool {
        *self == other || self.is_child_of(other)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Topic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Topic {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
