//! Action vocabulary: the closed universe of primitive actions, the
//! category map, and the bundle expansions.
//!
//! Primitive actions follow the `category:operation` convention. Bundles are
//! named after GitHub's own permission-scope labels so operators can paste
//! familiar names into rules; primitives give finer control (e.g. deny
//! `pr:merge_rebase` while allowing `pr:merge_commit`).

/// Marker suffix for actions that cannot be determined from method+path
/// alone and must be resolved against the request body.
pub const PARAM_BRANCH_SUFFIX: &str = "_PARAM_BRANCH";

/// Every primitive action known to the proxy, in declaration order.
///
/// Wildcard (`*`) and `category:*` rule patterns expand against this set.
/// The helper-command actions (discussions, sub-issues, partial-body edits)
/// are part of the compile-time union rather than a runtime registry.
const ALL_ACTIONS: &[&str] = &[
    // Repository metadata
    "metadata:read",
    // GitHub Actions
    "actions:read",
    "actions:write",
    // Commit statuses and check runs
    "statuses:read",
    "statuses:write",
    // Repository contents
    "code:read",
    "code:write",
    // Issues
    "issues:read",
    "issues:write",
    "issues:edit",
    "issues:comment",
    "issues:comment_edit",
    // git smart HTTP transport
    "git:read",
    "git:write",
    // Pull requests
    "pr:read",
    "pr:create",
    "pr:create_draft",
    "pr:update",
    "pr:close",
    "pr:reopen",
    "pr:convert_to_draft",
    "pr:mark_ready",
    "pr:comment",
    "pr:update_branch",
    "pr:merge_commit",
    "pr:merge_squash",
    "pr:merge_rebase",
    "pr:review_approve",
    "pr:review_request_changes",
    "pr:review_comment",
    "pr:review_pending",
    "pr:review_submit_approve",
    "pr:review_submit_request_changes",
    "pr:review_submit_comment",
    // Discussions (GraphQL helper)
    "discussions:read",
    "discussions:write",
    // Sub-issues (GraphQL helper)
    "subissues:list",
    "subissues:parent",
    "subissues:add",
    "subissues:remove",
    "subissues:reprioritize",
];

/// Pull-request primitives shared by the read bundles.
const PULL_REQUESTS_READ: &[&str] = &["metadata:read", "pr:read"];

/// Everything `pull-requests:write` adds on top of the read bundle.
const PULL_REQUESTS_WRITE_EXTRA: &[&str] = &[
    "pr:create",
    "pr:create_draft",
    "pr:update",
    "pr:close",
    "pr:reopen",
    "pr:convert_to_draft",
    "pr:mark_ready",
    "pr:comment",
    "pr:update_branch",
    "pr:review_approve",
    "pr:review_request_changes",
    "pr:review_comment",
    "pr:review_pending",
    "pr:review_submit_approve",
    "pr:review_submit_request_changes",
    "pr:review_submit_comment",
    "pr:merge_commit",
    "pr:merge_squash",
    "pr:merge_rebase",
];

/// Contribution without the ability to approve, close or merge.
const PULLS_CONTRIBUTE_EXTRA: &[&str] = &[
    "pr:create",
    "pr:create_draft",
    "pr:update",
    "pr:comment",
    "pr:update_branch",
    "pr:review_comment",
    "pr:review_pending",
    "pr:review_submit_comment",
];

/// The three merge strategies.
const PR_MERGE: &[&str] = &["pr:merge_commit", "pr:merge_squash", "pr:merge_rebase"];

/// The action vocabulary: universe, category map and bundle expansions.
///
/// Built once at startup and injected into the classifier and evaluator;
/// never mutated afterwards.
#[derive(Debug)]
pub struct ActionVocabulary {
    /// Ordered universe of primitives.
    universe: Vec<&'static str>,

    /// `category -> primitives`, grouped from the universe in declaration
    /// order.
    categories: Vec<(&'static str, Vec<&'static str>)>,

    /// `bundle name -> ordered primitive expansion`. One level deep.
    bundles: Vec<(&'static str, Vec<&'static str>)>,
}

impl ActionVocabulary {
    /// Build the vocabulary from the compile-time tables.
    pub fn new() -> Self {
        let universe: Vec<&'static str> = ALL_ACTIONS.to_vec();

        let mut categories: Vec<(&'static str, Vec<&'static str>)> = Vec::new();
        for &action in &universe {
            let category = action
                .split_once(':')
                .map(|(category, _)| category)
                .unwrap_or(action);
            match categories.iter_mut().find(|(name, _)| *name == category) {
                Some((_, members)) => members.push(action),
                None => categories.push((category, vec![action])),
            }
        }

        let pull_requests_read: Vec<&'static str> = PULL_REQUESTS_READ.to_vec();
        let mut pull_requests_write = pull_requests_read.clone();
        pull_requests_write.extend_from_slice(PULL_REQUESTS_WRITE_EXTRA);
        let mut pulls_contribute = pull_requests_read.clone();
        pulls_contribute.extend_from_slice(PULLS_CONTRIBUTE_EXTRA);

        let bundles = vec![
            ("pull-requests:read", pull_requests_read),
            ("pull-requests:write", pull_requests_write),
            ("pulls:contribute", pulls_contribute),
            ("pr:merge", PR_MERGE.to_vec()),
        ];

        Self {
            universe,
            categories,
            bundles,
        }
    }

    /// The ordered set of all primitive actions.
    pub fn universe(&self) -> &[&'static str] {
        &self.universe
    }

    /// Expand a bundle name into its primitives. Empty if unknown.
    pub fn expand_bundle(&self, name: &str) -> &[&'static str] {
        self.bundles
            .iter()
            .find(|(bundle, _)| *bundle == name)
            .map(|(_, members)| members.as_slice())
            .unwrap_or(&[])
    }

    /// Expand a category into its primitives. Empty if unknown.
    pub fn expand_category(&self, category: &str) -> &[&'static str] {
        self.categories
            .iter()
            .find(|(name, _)| *name == category)
            .map(|(_, members)| members.as_slice())
            .unwrap_or(&[])
    }

    /// Whether `name` is a primitive action in the universe.
    pub fn is_primitive(&self, name: &str) -> bool {
        self.universe.iter().any(|action| *action == name)
    }

    /// Known bundle names, in declaration order.
    pub fn bundle_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.bundles.iter().map(|(name, _)| *name)
    }
}

impl Default for ActionVocabulary {
    fn default() -> Self {
        Self::new()
    }
}
