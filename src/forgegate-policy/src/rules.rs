//! Policy rules and the IAM-style evaluator.
//!
//! Rules are evaluated in declaration order with deny-wins precedence: a
//! single matching deny rule short-circuits evaluation regardless of any
//! allow rules, and a request with no matching allow rule is denied by
//! default. Ordering is therefore only observable through which deny rule a
//! denial reason names.

use serde::{Deserialize, Serialize};

use crate::actions::ActionVocabulary;
use crate::pattern::repo_pattern_matches;

/// Rule effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    /// Permit matching requests (unless a deny rule also matches).
    Allow,
    /// Reject matching requests.
    Deny,
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Effect::Allow => write!(f, "allow"),
            Effect::Deny => write!(f, "deny"),
        }
    }
}

/// One allow/deny rule from the ruleset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Allow or deny.
    pub effect: Effect,

    /// Action patterns: `*`, a bundle name, `category:*`, or a literal
    /// primitive. An empty list matches nothing.
    pub actions: Vec<String>,

    /// Repository patterns (see [`repo_pattern_matches`]). An empty list
    /// matches nothing.
    pub repos: Vec<String>,
}

impl PolicyRule {
    /// Short human-readable description used in denial reasons. Never
    /// contains credential material.
    fn describe(&self) -> String {
        format!(
            "{} actions=[{}] repos=[{}]",
            self.effect,
            self.actions.join(", "),
            self.repos.join(", ")
        )
    }
}

/// Evaluator output: the decision plus a reason suitable for the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// Whether the request is allowed.
    pub allowed: bool,

    /// Why. References rule patterns and effects only.
    pub reason: String,
}

/// Expand an action pattern into the primitives it covers.
///
/// `*` expands to the whole universe, a bundle name to its expansion,
/// `category:*` to the category's primitives, and a literal primitive to
/// itself. Anything else expands to nothing, so the rule cannot match.
pub fn expand_action_pattern<'v>(vocab: &'v ActionVocabulary, pattern: &str) -> Vec<&'v str> {
    if pattern == "*" {
        return vocab.universe().to_vec();
    }

    let bundle = vocab.expand_bundle(pattern);
    if !bundle.is_empty() {
        return bundle.to_vec();
    }

    if let Some(category) = pattern.strip_suffix(":*") {
        return vocab.expand_category(category).to_vec();
    }

    if let Some(primitive) = vocab.universe().iter().find(|action| **action == pattern) {
        return vec![*primitive];
    }

    Vec::new()
}

/// Evaluate `(action, repo)` against the ruleset.
///
/// Returns `(false, reason)` as soon as a deny rule matches; otherwise
/// allows iff at least one allow rule matched. Pure: identical inputs give
/// identical outputs.
pub fn evaluate(
    vocab: &ActionVocabulary,
    action: &str,
    repo: &str,
    rules: &[PolicyRule],
) -> Evaluation {
    let mut has_allow = false;

    for rule in rules {
        let action_match = rule
            .actions
            .iter()
            .any(|pattern| expand_action_pattern(vocab, pattern).contains(&action));
        if !action_match {
            continue;
        }

        let repo_match = rule
            .repos
            .iter()
            .any(|pattern| repo_pattern_matches(pattern, repo));
        if !repo_match {
            continue;
        }

        match rule.effect {
            Effect::Deny => {
                return Evaluation {
                    allowed: false,
                    reason: format!("Denied by rule: {}", rule.describe()),
                };
            }
            Effect::Allow => has_allow = true,
        }
    }

    if has_allow {
        Evaluation {
            allowed: true,
            reason: "Allowed".to_string(),
        }
    } else {
        Evaluation {
            allowed: false,
            reason: format!("No matching allow rule for {action} on {repo}"),
        }
    }
}
