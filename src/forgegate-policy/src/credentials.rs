//! Credential catalog and per-repository credential selection.
//!
//! The catalog holds the scoped fine-grained PATs in declaration order plus
//! an optional classic PAT serving as the catch-all fallback. Selection uses
//! the same repository matching as the policy evaluator.

use serde::{Deserialize, Serialize};

use crate::pattern::repo_pattern_matches;

/// A personal access token. Display and Debug are masked; the raw value is
/// only reachable through [`Credential::token`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the forwarder's Authorization header.
    pub fn token(&self) -> &str {
        &self.0
    }

    /// Masked rendering for logs and status output (`ghp_...wxyz`).
    pub fn masked(&self) -> String {
        if self.0.len() > 12 {
            format!("{}...{}", &self.0[..4], &self.0[self.0.len() - 4..])
        } else {
            "****".to_string()
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential({})", self.masked())
    }
}

impl std::fmt::Display for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.masked())
    }
}

/// A scoped catalog entry: one token plus the repository patterns it covers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialEntry {
    /// The token.
    pub token: Credential,

    /// Repository patterns this token is scoped to.
    #[serde(default)]
    pub repos: Vec<String>,
}

/// The immutable credential catalog.
#[derive(Debug, Clone, Default)]
pub struct CredentialCatalog {
    /// Scoped entries, declaration order.
    scoped: Vec<CredentialEntry>,

    /// Catch-all classic PAT.
    fallback: Option<Credential>,
}

impl CredentialCatalog {
    /// Build a catalog from scoped entries and an optional fallback.
    pub fn new(scoped: Vec<CredentialEntry>, fallback: Option<Credential>) -> Self {
        Self { scoped, fallback }
    }

    /// Pick the credential for a repository.
    ///
    /// The first scoped entry with a matching repo pattern wins; otherwise
    /// the fallback, if configured. `None` means the request cannot be
    /// forwarded (surfaced as 403 upstream of here).
    pub fn select(&self, repo: &str) -> Option<&Credential> {
        for entry in &self.scoped {
            if entry
                .repos
                .iter()
                .any(|pattern| repo_pattern_matches(pattern, repo))
            {
                return Some(&entry.token);
            }
        }
        self.fallback.as_ref()
    }

    /// The scoped entries, declaration order.
    pub fn scoped(&self) -> &[CredentialEntry] {
        &self.scoped
    }

    /// The classic catch-all, if configured.
    pub fn fallback(&self) -> Option<&Credential> {
        self.fallback.as_ref()
    }

    /// Whether the catalog holds any credential at all.
    pub fn is_empty(&self) -> bool {
        self.scoped.is_empty() && self.fallback.is_none()
    }
}
