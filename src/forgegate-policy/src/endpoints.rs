//! Endpoint classifier: ordered `(method, path pattern, action)` tables for
//! the REST API and for git smart HTTP.
//!
//! The table is scanned linearly and the first entry whose method and
//! anchored pattern both match wins. Declaration order is part of the
//! contract: overlapping patterns rely on it, and there is no
//! "most specific match" tiebreak. Patterns are compiled once at startup and
//! bucketed by HTTP method to shrink the per-request scan.

use std::collections::HashMap;

use regex::Regex;

use crate::PolicyError;

/// Builds an anchored REST pattern under `/repos/{owner}/{repo}`.
macro_rules! api_path {
    ($tail:literal) => {
        concat!("^/repos/(?P<owner>[^/]+)/(?P<repo>[^/]+)", $tail, "$")
    };
}

/// Builds an anchored git smart HTTP pattern under `/git/{owner}/{repo}.git`.
macro_rules! git_path {
    ($tail:literal) => {
        concat!(r"^/git/(?P<owner>[^/]+)/(?P<repo>[^/]+)\.git", $tail, "$")
    };
}

/// The REST endpoint table, in match order.
///
/// Suffix routes (`/commits/{ref}/status`) are declared before their generic
/// siblings (`/commits/{ref}`); numeric captures (`\d+`) keep literal path
/// segments like `pulls/comments` from colliding with `pulls/{number}`.
const ENDPOINT_ACTIONS: &[(&str, &str, &str)] = &[
    // Repository metadata
    ("GET", api_path!(""), "metadata:read"),
    ("GET", api_path!("/branches"), "metadata:read"),
    ("GET", api_path!("/branches/(?P<branch>[^/]+)"), "metadata:read"),
    ("GET", api_path!("/tags"), "metadata:read"),
    ("GET", api_path!("/topics"), "metadata:read"),
    ("GET", api_path!("/languages"), "metadata:read"),
    ("GET", api_path!("/contributors"), "metadata:read"),
    ("GET", api_path!("/labels"), "metadata:read"),
    ("GET", api_path!("/milestones"), "metadata:read"),
    ("GET", api_path!("/releases"), "metadata:read"),
    ("GET", api_path!("/releases/latest"), "metadata:read"),
    ("GET", api_path!("/releases/tags/(?P<tag>[^/]+)"), "metadata:read"),
    // GitHub Actions
    ("GET", api_path!("/actions/runs"), "actions:read"),
    ("GET", api_path!(r"/actions/runs/(?P<run_id>\d+)"), "actions:read"),
    ("GET", api_path!(r"/actions/runs/(?P<run_id>\d+)/jobs"), "actions:read"),
    ("GET", api_path!(r"/actions/runs/(?P<run_id>\d+)/logs"), "actions:read"),
    ("POST", api_path!(r"/actions/runs/(?P<run_id>\d+)/rerun"), "actions:write"),
    ("POST", api_path!(r"/actions/runs/(?P<run_id>\d+)/rerun-failed-jobs"), "actions:write"),
    ("POST", api_path!(r"/actions/runs/(?P<run_id>\d+)/cancel"), "actions:write"),
    ("GET", api_path!(r"/actions/jobs/(?P<job_id>\d+)"), "actions:read"),
    ("GET", api_path!(r"/actions/jobs/(?P<job_id>\d+)/logs"), "actions:read"),
    ("GET", api_path!("/actions/workflows"), "actions:read"),
    ("GET", api_path!("/actions/workflows/(?P<workflow_id>[^/]+)"), "actions:read"),
    ("GET", api_path!("/actions/workflows/(?P<workflow_id>[^/]+)/runs"), "actions:read"),
    ("POST", api_path!("/actions/workflows/(?P<workflow_id>[^/]+)/dispatches"), "actions:write"),
    ("GET", api_path!("/actions/artifacts"), "actions:read"),
    ("GET", api_path!(r"/actions/artifacts/(?P<artifact_id>\d+)"), "actions:read"),
    ("GET", api_path!(r"/actions/artifacts/(?P<artifact_id>\d+)/(?P<archive_format>[^/]+)"), "actions:read"),
    // Commit statuses and checks
    ("GET", api_path!("/commits/(?P<ref>[^/]+)/status"), "statuses:read"),
    ("GET", api_path!("/commits/(?P<ref>[^/]+)/statuses"), "statuses:read"),
    ("GET", api_path!("/commits/(?P<ref>[^/]+)/check-runs"), "statuses:read"),
    ("GET", api_path!("/commits/(?P<ref>[^/]+)/check-suites"), "statuses:read"),
    ("POST", api_path!("/statuses/(?P<sha>[^/]+)"), "statuses:write"),
    ("GET", api_path!(r"/check-runs/(?P<check_run_id>\d+)"), "statuses:read"),
    // Repository contents and commit data
    ("GET", api_path!("/readme"), "code:read"),
    ("GET", api_path!("/contents(?P<path>/.*)?"), "code:read"),
    ("PUT", api_path!("/contents/(?P<path>.+)"), "code:write"),
    ("DELETE", api_path!("/contents/(?P<path>.+)"), "code:write"),
    ("GET", api_path!("/commits"), "code:read"),
    ("GET", api_path!("/commits/(?P<ref>[^/]+)"), "code:read"),
    ("GET", api_path!("/compare/(?P<basehead>.+)"), "code:read"),
    // git database (REST, not smart HTTP)
    ("GET", api_path!("/git/ref/(?P<ref>.+)"), "code:read"),
    ("GET", api_path!("/git/matching-refs/(?P<ref>.+)"), "code:read"),
    ("POST", api_path!("/git/refs"), "code:write"),
    ("PATCH", api_path!("/git/refs/(?P<ref>.+)"), "code:write"),
    ("DELETE", api_path!("/git/refs/(?P<ref>.+)"), "code:write"),
    ("GET", api_path!("/git/blobs/(?P<file_sha>[^/]+)"), "code:read"),
    ("GET", api_path!("/git/trees/(?P<tree_sha>[^/]+)"), "code:read"),
    ("GET", api_path!("/git/commits/(?P<commit_sha>[^/]+)"), "code:read"),
    // Issues
    ("GET", api_path!("/issues"), "issues:read"),
    ("POST", api_path!("/issues"), "issues:write"),
    ("GET", api_path!(r"/issues/comments/(?P<comment_id>\d+)"), "issues:read"),
    ("PATCH", api_path!(r"/issues/comments/(?P<comment_id>\d+)"), "issues:comment_edit"),
    ("GET", api_path!(r"/issues/(?P<issue_number>\d+)"), "issues:read"),
    ("PATCH", api_path!(r"/issues/(?P<issue_number>\d+)"), "issues:edit"),
    ("GET", api_path!(r"/issues/(?P<issue_number>\d+)/comments"), "issues:read"),
    ("POST", api_path!(r"/issues/(?P<issue_number>\d+)/comments"), "issues:comment"),
    ("GET", api_path!(r"/issues/(?P<issue_number>\d+)/labels"), "issues:read"),
    ("POST", api_path!(r"/issues/(?P<issue_number>\d+)/labels"), "issues:edit"),
    ("GET", api_path!(r"/issues/(?P<issue_number>\d+)/timeline"), "issues:read"),
    // Pull requests
    ("GET", api_path!("/pulls"), "pr:read"),
    ("POST", api_path!("/pulls"), "pr:create_PARAM_BRANCH"),
    ("GET", api_path!(r"/pulls/comments/(?P<comment_id>\d+)"), "pr:read"),
    ("PATCH", api_path!(r"/pulls/comments/(?P<comment_id>\d+)"), "pr:comment"),
    ("GET", api_path!(r"/pulls/(?P<pull_number>\d+)"), "pr:read"),
    ("PATCH", api_path!(r"/pulls/(?P<pull_number>\d+)"), "pr:update_PARAM_BRANCH"),
    ("GET", api_path!(r"/pulls/(?P<pull_number>\d+)/files"), "pr:read"),
    ("GET", api_path!(r"/pulls/(?P<pull_number>\d+)/commits"), "pr:read"),
    ("GET", api_path!(r"/pulls/(?P<pull_number>\d+)/merge"), "pr:read"),
    ("PUT", api_path!(r"/pulls/(?P<pull_number>\d+)/merge"), "pr:merge_PARAM_BRANCH"),
    ("PUT", api_path!(r"/pulls/(?P<pull_number>\d+)/update-branch"), "pr:update_branch"),
    ("GET", api_path!(r"/pulls/(?P<pull_number>\d+)/comments"), "pr:read"),
    ("POST", api_path!(r"/pulls/(?P<pull_number>\d+)/comments"), "pr:comment"),
    ("GET", api_path!(r"/pulls/(?P<pull_number>\d+)/reviews"), "pr:read"),
    ("POST", api_path!(r"/pulls/(?P<pull_number>\d+)/reviews"), "pr:review_PARAM_BRANCH"),
    ("GET", api_path!(r"/pulls/(?P<pull_number>\d+)/reviews/(?P<review_id>\d+)"), "pr:read"),
    (
        "POST",
        api_path!(r"/pulls/(?P<pull_number>\d+)/reviews/(?P<review_id>\d+)/events"),
        "pr:review_submit_PARAM_BRANCH",
    ),
];

/// git smart HTTP endpoints. `info/refs` is the one endpoint where the query
/// string participates in classification.
const GIT_ENDPOINT_ACTIONS: &[(&str, &str, GitService)] = &[
    ("GET", git_path!("/info/refs"), GitService::InfoRefs),
    ("POST", git_path!("/git-upload-pack"), GitService::UploadPack),
    ("POST", git_path!("/git-receive-pack"), GitService::ReceivePack),
];

/// The git service addressed by a smart HTTP endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GitService {
    /// Ref advertisement; read unless the client asks for receive-pack.
    InfoRefs,
    /// Fetch/clone.
    UploadPack,
    /// Push.
    ReceivePack,
}

/// Result of a successful classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// The matched action, possibly a refinement placeholder.
    pub action: &'static str,

    /// Named captures from the path pattern (`owner`, `repo`, per-endpoint
    /// parameters such as `pull_number`).
    pub params: HashMap<String, String>,
}

impl Classification {
    /// The `owner/repo` pair, when both captures are present.
    pub fn repo(&self) -> Option<String> {
        match (self.params.get("owner"), self.params.get("repo")) {
            (Some(owner), Some(repo)) => Some(format!("{owner}/{repo}")),
            _ => None,
        }
    }
}

/// A compiled endpoint rule.
#[derive(Debug)]
struct CompiledRule {
    pattern: Regex,
    action: &'static str,
}

/// A compiled git smart HTTP rule.
#[derive(Debug)]
struct CompiledGitRule {
    method: &'static str,
    pattern: Regex,
    service: GitService,
}

/// Per-method buckets of the REST table, declaration order preserved.
#[derive(Debug, Default)]
struct MethodBuckets {
    get: Vec<CompiledRule>,
    post: Vec<CompiledRule>,
    put: Vec<CompiledRule>,
    patch: Vec<CompiledRule>,
    delete: Vec<CompiledRule>,
}

impl MethodBuckets {
    fn bucket_mut(&mut self, method: &str) -> Option<&mut Vec<CompiledRule>> {
        match method {
            "GET" => Some(&mut self.get),
            "POST" => Some(&mut self.post),
            "PUT" => Some(&mut self.put),
            "PATCH" => Some(&mut self.patch),
            "DELETE" => Some(&mut self.delete),
            _ => None,
        }
    }

    /// Verbs outside the table's set are never matched.
    fn bucket(&self, method: &str) -> Option<&[CompiledRule]> {
        match method {
            "GET" => Some(&self.get),
            "POST" => Some(&self.post),
            "PUT" => Some(&self.put),
            "PATCH" => Some(&self.patch),
            "DELETE" => Some(&self.delete),
            _ => None,
        }
    }
}

/// The compiled endpoint tables.
#[derive(Debug)]
pub struct EndpointTable {
    api: MethodBuckets,
    git: Vec<CompiledGitRule>,
}

impl EndpointTable {
    /// Compile both tables. Called once at startup.
    pub fn new() -> Result<Self, PolicyError> {
        let mut api = MethodBuckets::default();
        for &(method, pattern, action) in ENDPOINT_ACTIONS {
            let compiled = Regex::new(pattern)
                .map_err(|source| PolicyError::InvalidEndpointPattern { pattern, source })?;
            let bucket = api
                .bucket_mut(method)
                .unwrap_or_else(|| unreachable!("table method {method} outside verb set"));
            bucket.push(CompiledRule {
                pattern: compiled,
                action,
            });
        }

        let mut git = Vec::new();
        for &(method, pattern, service) in GIT_ENDPOINT_ACTIONS {
            let compiled = Regex::new(pattern)
                .map_err(|source| PolicyError::InvalidEndpointPattern { pattern, source })?;
            git.push(CompiledGitRule {
                method,
                pattern: compiled,
                service,
            });
        }

        Ok(Self { api, git })
    }

    /// Classify a REST API request. `path` must not contain the query string.
    ///
    /// Returns `None` when no rule matches; the orchestrator treats that as a
    /// forbidden endpoint.
    pub fn classify(&self, method: &str, path: &str) -> Option<Classification> {
        let bucket = self.api.bucket(method)?;
        for rule in bucket {
            if let Some(caps) = rule.pattern.captures(path) {
                return Some(Classification {
                    action: rule.action,
                    params: capture_params(&rule.pattern, &caps),
                });
            }
        }
        None
    }

    /// Classify a git smart HTTP request.
    ///
    /// Identical to [`classify`](Self::classify) except that for `info/refs`
    /// the action is chosen by the `service` query parameter:
    /// `git-receive-pack` means a push is coming, anything else is a read.
    pub fn classify_git(&self, method: &str, path: &str, query: &str) -> Option<Classification> {
        for rule in &self.git {
            if rule.method != method {
                continue;
            }
            let Some(caps) = rule.pattern.captures(path) else {
                continue;
            };
            let action = match rule.service {
                GitService::UploadPack => "git:read",
                GitService::ReceivePack => "git:write",
                GitService::InfoRefs => {
                    if query.split('&').any(|pair| pair == "service=git-receive-pack") {
                        "git:write"
                    } else {
                        "git:read"
                    }
                }
            };
            return Some(Classification {
                action,
                params: capture_params(&rule.pattern, &caps),
            });
        }
        None
    }
}

/// Collect the named captures of a match into a parameter map.
fn capture_params(pattern: &Regex, caps: &regex::Captures<'_>) -> HashMap<String, String> {
    pattern
        .capture_names()
        .flatten()
        .filter_map(|name| {
            caps.name(name)
                .map(|m| (name.to_string(), m.as_str().to_string()))
        })
        .collect()
}
