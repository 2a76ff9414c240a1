//! Forgegate Policy - request classification and policy evaluation core.
//!
//! This crate decides, for every request an untrusted agent sends at the
//! proxy, whether the request may be forwarded to GitHub and with which
//! credential:
//! - Endpoint classification: `(method, path)` -> action
//! - Body refinement: placeholder actions resolved against JSON body fields
//! - IAM-style rule evaluation: deny-wins, implicit default deny
//! - Credential selection: first scoped PAT matching the repository, with a
//!   classic-PAT fallback
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Gate                               │
//! │  ┌────────────────┐  ┌─────────────┐  ┌───────────────────┐  │
//! │  │ EndpointTable  │→ │  refine()   │→ │     evaluate()    │  │
//! │  │ (method+path)  │  │ (JSON body) │  │ (allow/deny rules)│  │
//! │  └────────────────┘  └─────────────┘  └─────────┬─────────┘  │
//! │                                                 ▼            │
//! │                                      ┌───────────────────┐   │
//! │                                      │ CredentialCatalog │   │
//! │                                      └───────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! All tables are built once at startup and are immutable afterwards; every
//! entry point is synchronous, re-entrant and free of I/O.

#[cfg(test)]
mod tests;

pub mod actions;
pub mod config;
pub mod credentials;
pub mod endpoints;
pub mod gate;
pub mod pattern;
pub mod refine;
pub mod rules;

pub use actions::{ActionVocabulary, PARAM_BRANCH_SUFFIX};
pub use config::{ConfigError, ProxyConfig};
pub use credentials::{Credential, CredentialCatalog, CredentialEntry};
pub use endpoints::{Classification, EndpointTable};
pub use gate::{Gate, GateRejection, Verdict};
pub use pattern::repo_pattern_matches;
pub use refine::refine;
pub use rules::{Effect, Evaluation, PolicyRule, evaluate, expand_action_pattern};

use thiserror::Error;

/// Errors raised while building the policy tables at startup.
///
/// Request-time entry points never return errors; denials are expressed as
/// sentinel values (`None` / [`GateRejection`]).
#[derive(Debug, Error)]
pub enum PolicyError {
    /// An endpoint table pattern failed to compile.
    #[error("Invalid endpoint pattern {pattern:?}: {source}")]
    InvalidEndpointPattern {
        pattern: &'static str,
        #[source]
        source: regex::Error,
    },

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, PolicyError>;
