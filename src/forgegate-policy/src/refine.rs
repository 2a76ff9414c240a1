//! Parameter refiner: resolves `_PARAM_BRANCH` placeholder actions into
//! primitives by inspecting JSON body fields.
//!
//! GitHub overloads single REST endpoints with several semantic operations
//! chosen by body flags (a PATCH on a pull request may close it, reopen it,
//! or flip its draft state). The refiner recovers the operation so the
//! policy can, say, permit closing a PR while forbidding reopening one.
//!
//! The refiner never fails: a missing or unparseable body is treated as an
//! empty object, an unknown placeholder has its marker stripped, and a
//! non-placeholder action passes through unchanged.

use serde_json::Value;

use crate::actions::PARAM_BRANCH_SUFFIX;

/// A single test against one JSON body field.
#[derive(Debug, Clone, Copy)]
enum Condition {
    /// Field is boolean `true`.
    IsTrue(&'static str),
    /// Field is boolean `false`.
    IsFalse(&'static str),
    /// Field is a string equal to the given value.
    Equals(&'static str, &'static str),
    /// Field, uppercased, is a string equal to the given value.
    EqualsUppercased(&'static str, &'static str),
}

impl Condition {
    fn holds(&self, body: &Value) -> bool {
        match *self {
            Condition::IsTrue(field) => body.get(field).and_then(Value::as_bool) == Some(true),
            Condition::IsFalse(field) => body.get(field).and_then(Value::as_bool) == Some(false),
            Condition::Equals(field, expected) => {
                body.get(field).and_then(Value::as_str) == Some(expected)
            }
            Condition::EqualsUppercased(field, expected) => body
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|value| value.to_uppercase() == expected),
        }
    }
}

/// Refinement for one placeholder: cases tried top to bottom, then the
/// fallback.
struct Refinement {
    placeholder: &'static str,
    cases: &'static [(Condition, &'static str)],
    fallback: &'static str,
}

/// The refinement table. Each entry's cases and fallback resolve to
/// primitives in the action universe.
const REFINEMENTS: &[Refinement] = &[
    Refinement {
        placeholder: "pr:create_PARAM_BRANCH",
        cases: &[(Condition::IsTrue("draft"), "pr:create_draft")],
        fallback: "pr:create",
    },
    Refinement {
        placeholder: "pr:update_PARAM_BRANCH",
        cases: &[
            (Condition::Equals("state", "closed"), "pr:close"),
            (Condition::Equals("state", "open"), "pr:reopen"),
            (Condition::IsTrue("draft"), "pr:convert_to_draft"),
            (Condition::IsFalse("draft"), "pr:mark_ready"),
        ],
        fallback: "pr:update",
    },
    Refinement {
        placeholder: "pr:merge_PARAM_BRANCH",
        cases: &[
            (Condition::Equals("merge_method", "squash"), "pr:merge_squash"),
            (Condition::Equals("merge_method", "rebase"), "pr:merge_rebase"),
        ],
        fallback: "pr:merge_commit",
    },
    Refinement {
        placeholder: "pr:review_PARAM_BRANCH",
        cases: &[
            (Condition::EqualsUppercased("event", "APPROVE"), "pr:review_approve"),
            (
                Condition::EqualsUppercased("event", "REQUEST_CHANGES"),
                "pr:review_request_changes",
            ),
            (Condition::EqualsUppercased("event", "COMMENT"), "pr:review_comment"),
        ],
        fallback: "pr:review_pending",
    },
    Refinement {
        placeholder: "pr:review_submit_PARAM_BRANCH",
        cases: &[
            (
                Condition::EqualsUppercased("event", "APPROVE"),
                "pr:review_submit_approve",
            ),
            (
                Condition::EqualsUppercased("event", "REQUEST_CHANGES"),
                "pr:review_submit_request_changes",
            ),
        ],
        fallback: "pr:review_submit_comment",
    },
];

/// Resolve a possibly-placeholder action against the raw request body.
///
/// The body is a hint, not a requirement: anything that does not decode to a
/// JSON object is treated as `{}`, which selects each table entry's
/// fallback. Placeholders missing from the table have the marker stripped;
/// actions without the marker are returned unchanged.
pub fn refine<'a>(action: &'a str, body: &[u8]) -> &'a str {
    if !action.ends_with(PARAM_BRANCH_SUFFIX) {
        return action;
    }

    let body: Value = serde_json::from_slice(body).unwrap_or(Value::Object(Default::default()));

    for refinement in REFINEMENTS {
        if refinement.placeholder != action {
            continue;
        }
        for &(condition, primitive) in refinement.cases {
            if condition.holds(&body) {
                return primitive;
            }
        }
        return refinement.fallback;
    }

    // Unlisted placeholder: strip the marker and return the stem verbatim.
    action
        .strip_suffix(PARAM_BRANCH_SUFFIX)
        .unwrap_or(action)
}
