//! Gate orchestrator: drives classify -> refine -> evaluate -> select for
//! each request and produces the verdict the forwarder acts on.
//!
//! The gate holds only immutable tables built at startup; every authorize
//! call is synchronous, re-entrant and fail-closed.

use thiserror::Error;
use tracing::{debug, warn};

use crate::actions::ActionVocabulary;
use crate::config::ProxyConfig;
use crate::credentials::{Credential, CredentialCatalog};
use crate::endpoints::EndpointTable;
use crate::refine::refine;
use crate::rules::{PolicyRule, evaluate, expand_action_pattern};
use crate::Result;

/// The per-request output of the gate: everything the forwarder needs.
#[derive(Debug, Clone)]
pub struct Verdict {
    /// The refined primitive action.
    pub action: String,

    /// Target repository as `owner/repo`.
    pub repo: String,

    /// Credential to attach upstream.
    pub credential: Credential,

    /// Why the request was allowed.
    pub reason: String,
}

/// Why the gate refused a request. The ingress maps these to HTTP statuses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateRejection {
    /// No endpoint rule matched; unknown endpoints fail closed.
    #[error("Endpoint not allowed")]
    ForbiddenEndpoint,

    /// The path matched but did not yield an `owner/repo` pair.
    #[error("Could not determine repository from request path")]
    MalformedPath,

    /// The ruleset denied the action.
    #[error("{reason}")]
    PolicyDenied {
        /// The refined action that was denied.
        action: String,
        /// Target repository.
        repo: String,
        /// Denial reason from the evaluator.
        reason: String,
    },

    /// No credential covers the repository.
    #[error("No PAT configured for repository: {repo}")]
    NoCredential {
        /// Target repository.
        repo: String,
    },
}

/// The gate: immutable tables plus the orchestration pipeline.
#[derive(Debug)]
pub struct Gate {
    vocab: ActionVocabulary,
    endpoints: EndpointTable,
    rules: Vec<PolicyRule>,
    catalog: CredentialCatalog,
}

impl Gate {
    /// Build the gate from a validated config. Compiles the endpoint
    /// tables and warns about rule patterns that cannot match anything.
    pub fn from_config(config: &ProxyConfig) -> Result<Self> {
        let vocab = ActionVocabulary::new();
        let endpoints = EndpointTable::new()?;

        for rule in &config.rules {
            for pattern in &rule.actions {
                if expand_action_pattern(&vocab, pattern).is_empty() {
                    warn!(pattern = %pattern, "rule action pattern matches no known action");
                }
            }
        }

        Ok(Self {
            vocab,
            endpoints,
            rules: config.rules.clone(),
            catalog: config.catalog(),
        })
    }

    /// Authorize a REST API request.
    ///
    /// `path` must exclude the query string; `body` is the already-buffered
    /// request body (empty slice when absent).
    pub fn authorize_api(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
    ) -> std::result::Result<Verdict, GateRejection> {
        let classification = self
            .endpoints
            .classify(method, path)
            .ok_or(GateRejection::ForbiddenEndpoint)?;
        let repo = classification.repo().ok_or(GateRejection::MalformedPath)?;

        let action = refine(classification.action, body);
        self.finish(action, repo)
    }

    /// Authorize a git smart HTTP request. No body refinement; the query
    /// participates only for `info/refs`.
    pub fn authorize_git(
        &self,
        method: &str,
        path: &str,
        query: &str,
    ) -> std::result::Result<Verdict, GateRejection> {
        let classification = self
            .endpoints
            .classify_git(method, path, query)
            .ok_or(GateRejection::ForbiddenEndpoint)?;
        let repo = classification.repo().ok_or(GateRejection::MalformedPath)?;

        self.finish(classification.action, repo)
    }

    /// Authorize an explicit `(action, repo)` pair. Side channels (the CLI
    /// helper endpoint) use this instead of endpoint classification.
    pub fn authorize_action(
        &self,
        action: &str,
        repo: &str,
    ) -> std::result::Result<Verdict, GateRejection> {
        self.finish(action, repo.to_string())
    }

    /// Shared tail of the pipeline: evaluate the ruleset, then select a
    /// credential.
    fn finish(
        &self,
        action: &str,
        repo: String,
    ) -> std::result::Result<Verdict, GateRejection> {
        let evaluation = evaluate(&self.vocab, action, &repo, &self.rules);
        if !evaluation.allowed {
            debug!(action, repo = %repo, reason = %evaluation.reason, "request denied");
            return Err(GateRejection::PolicyDenied {
                action: action.to_string(),
                repo,
                reason: evaluation.reason,
            });
        }

        let credential = self
            .catalog
            .select(&repo)
            .ok_or_else(|| GateRejection::NoCredential { repo: repo.clone() })?;

        debug!(action, repo = %repo, credential = %credential, "request allowed");
        Ok(Verdict {
            action: action.to_string(),
            repo,
            credential: credential.clone(),
            reason: evaluation.reason,
        })
    }

    /// The action vocabulary.
    pub fn vocab(&self) -> &ActionVocabulary {
        &self.vocab
    }

    /// The credential catalog.
    pub fn catalog(&self) -> &CredentialCatalog {
        &self.catalog
    }

    /// The ruleset, declaration order.
    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }
}
