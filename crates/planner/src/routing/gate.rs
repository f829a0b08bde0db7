//! Deterministic precedence overrides.
//!
//! Some queries carry lexical signals strong enough that the embedding
//! signal must not be consulted at all. The gate is an ordered list of
//! `(rule, forced topic)` pairs evaluated against the query's lowercase
//! token list; the first rule that matches decides the routing result.

use flowplan_core::Topic;
use serde::Serialize;

const ACCOUNT_VERBS: &[&str] = &["assign", "grant", "revoke", "activate", "deactivate", "extend"];
const ACCOUNT_TARGETS: &[&str] = &["user", "users", "permission", "permissions", "access"];
const USER_CRUD_VERBS: &[&str] = &[
    "create", "add", "update", "modify", "change", "delete", "remove",
];
const USER_NOUNS: &[&str] = &["user", "users"];

const STATIC_KEYWORDS: &[&str] = &["role", "roles", "department", "departments"];

const RECORD_CRUD_VERBS: &[&str] = &[
    "create",
    "add",
    "insert",
    "update",
    "modify",
    "delete",
    "remove",
    "duplicate",
    "restore",
    "purge",
];
const RECORD_NOUNS: &[&str] = &["record", "records", "entry", "entries", "row", "rows"];

/// Lowercase alphanumeric tokens of `query`, in order.
pub fn tokenize(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn contains_any(tokens: &[String], words: &[&str]) -> bool {
    tokens.iter().any(|t| words.contains(&t.as_str()))
}

fn first_position(tokens: &[String], words: &[&str]) -> Option<usize> {
    tokens.iter().position(|t| words.contains(&t.as_str()))
}

/// An account-only verb aimed at a user target, or a generic CRUD verb
/// whose object is a user mentioned before any static keyword.
fn user_account_action(tokens: &[String]) -> bool {
    if contains_any(tokens, ACCOUNT_VERBS) && contains_any(tokens, ACCOUNT_TARGETS) {
        return true;
    }
    if !contains_any(tokens, USER_CRUD_VERBS) {
        return false;
    }
    match (
        first_position(tokens, USER_NOUNS),
        first_position(tokens, STATIC_KEYWORDS),
    ) {
        (Some(user), Some(static_kw)) => user < static_kw,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

fn static_reference_dimension(tokens: &[String]) -> bool {
    contains_any(tokens, STATIC_KEYWORDS)
}

fn record_crud(tokens: &[String]) -> bool {
    contains_any(tokens, RECORD_CRUD_VERBS) && contains_any(tokens, RECORD_NOUNS)
}

/// One precedence rule.
#[derive(Clone)]
pub struct GateRule {
    pub name: &'static str,
    pub topic: Topic,
    matcher: fn(&[String]) -> bool,
}

impl GateRule {
    pub fn new(name: &'static str, topic: Topic, matcher: fn(&[String]) -> bool) -> Self {
        Self { name, topic, matcher }
    }

    pub fn matches(&self, tokens: &[String]) -> bool {
        (self.matcher)(tokens)
    }
}

impl std::fmt::Debug for GateRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateRule")
            .field("name", &self.name)
            .field("topic", &self.topic)
            .finish()
    }
}

/// The rule that fired and the topic it forces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GateMatch {
    pub rule: &'static str,
    pub topic: Topic,
}

/// Ordered precedence rules; first match wins.
#[derive(Debug, Clone)]
pub struct PrecedenceGate {
    rules: Vec<GateRule>,
}

impl Default for PrecedenceGate {
    fn default() -> Self {
        Self::new(vec![
            GateRule::new("user_account_action", Topic::UserMgmt, user_account_action),
            GateRule::new(
                "static_reference_dimension",
                Topic::StaticVsDynamic,
                static_reference_dimension,
            ),
            GateRule::new("record_crud", Topic::ActionsBuiltinFiltering, record_crud),
        ])
    }
}

impl PrecedenceGate {
    pub fn new(rules: Vec<GateRule>) -> Self {
        Self { rules }
    }

    /// A gate with no rules; every query falls through to retrieval.
    pub fn disabled() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn rules(&self) -> &[GateRule] {
        &self.rules
    }

    pub fn evaluate(&self, query: &str) -> Option<GateMatch> {
        let tokens = tokenize(query);
        self.rules
            .iter()
            .find(|rule| rule.matches(&tokens))
            .map(|rule| GateMatch {
                rule: rule.name,
                topic: rule.topic,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forced(query: &str) -> Option<Topic> {
        PrecedenceGate::default().evaluate(query).map(|m| m.topic)
    }

    #[test]
    fn tokenize_lowercases_and_splits_on_punctuation() {
        assert_eq!(
            tokenize("Assign ROLE to user-Alice, please!"),
            vec!["assign", "role", "to", "user", "alice", "please"]
        );
        assert!(tokenize("  ...  ").is_empty());
    }

    #[test]
    fn account_verb_with_user_target_is_user_management() {
        assert_eq!(forced("assign role to user Alice"), Some(Topic::UserMgmt));
        assert_eq!(forced("revoke access for the intern"), Some(Topic::UserMgmt));
        assert_eq!(forced("Grant permissions to Bob"), Some(Topic::UserMgmt));
    }

    #[test]
    fn crud_verb_on_user_before_static_keyword_is_user_management() {
        assert_eq!(forced("create a user with role manager"), Some(Topic::UserMgmt));
        assert_eq!(forced("delete users who left"), Some(Topic::UserMgmt));
    }

    #[test]
    fn static_keyword_before_user_is_static() {
        assert_eq!(forced("update role from admin to user"), Some(Topic::StaticVsDynamic));
        assert_eq!(forced("get all departments"), Some(Topic::StaticVsDynamic));
    }

    #[test]
    fn record_crud_requires_verb_and_noun() {
        assert_eq!(
            forced("delete records where status is expired"),
            Some(Topic::ActionsBuiltinFiltering)
        );
        assert_eq!(forced("insert a row into Orders"), Some(Topic::ActionsBuiltinFiltering));
        assert_eq!(forced("list records in Orders"), None);
        assert_eq!(forced("delete the invoice"), None);
    }

    #[test]
    fn unrelated_queries_fall_through() {
        assert_eq!(forced("send an email to the finance team"), None);
        assert_eq!(forced("repeat 3 times: notify the manager"), None);
        assert_eq!(forced(""), None);
    }

    #[test]
    fn rules_are_evaluated_in_order() {
        let gate = PrecedenceGate::default();
        let names: Vec<_> = gate.rules().iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec!["user_account_action", "static_reference_dimension", "record_crud"]
        );
        // Matches both the static and the record rule; the static rule is earlier.
        let hit = gate.evaluate("delete a record with department system head").unwrap();
        assert_eq!(hit.rule, "static_reference_dimension");
    }

    #[test]
    fn disabled_gate_never_fires() {
        assert!(PrecedenceGate::disabled().evaluate("assign role to user Alice").is_none());
    }
}
