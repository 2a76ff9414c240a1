//! Proxy configuration: file loading and structural validation.
//!
//! Config violations are startup-fatal; nothing in this module runs at
//! request time. The file is JSON with comments tolerated, and because it
//! holds tokens it must not be group- or world-readable.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::credentials::{Credential, CredentialCatalog, CredentialEntry};
use crate::rules::PolicyRule;

/// Errors from loading or validating the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file is readable by group or others.
    #[error("Config file {path} is readable by group/others (mode {mode:o}); run: chmod 600 {path}")]
    Permissions { path: String, mode: u32 },

    /// The file is not valid JSON (after comment stripping).
    #[error("Config file {path} is not valid JSON: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Structurally valid JSON that violates a config invariant.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Legacy fine-grained PAT entry (`{"pat": ..., "repos": [...]}`).
#[derive(Debug, Clone, Deserialize)]
pub struct FineGrainedPat {
    /// The token.
    pub pat: Credential,

    /// Repository patterns this token is scoped to.
    #[serde(default)]
    pub repos: Vec<String>,
}

/// The proxy configuration file.
///
/// Two credential shapes are accepted: the modern `pats` list and the legacy
/// `classic_pat` + `fine_grained_pats` pair. The classic PAT, when present,
/// is the catch-all fallback for repositories no scoped entry covers.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Legacy catch-all classic PAT.
    #[serde(default)]
    pub classic_pat: Option<Credential>,

    /// Legacy scoped entries.
    #[serde(default)]
    pub fine_grained_pats: Vec<FineGrainedPat>,

    /// Modern scoped entries (`{"token": ..., "repos": [...]}`).
    #[serde(default)]
    pub pats: Vec<CredentialEntry>,

    /// The ordered ruleset. Required and non-empty.
    pub rules: Vec<PolicyRule>,
}

impl ProxyConfig {
    /// Load and validate the config file. Any failure here is fatal to
    /// startup.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;

        check_permissions(path, &display)?;

        let stripped = strip_json_comments(&content);
        let config: Self =
            serde_json::from_str(&stripped).map_err(|source| ConfigError::Parse {
                path: display,
                source,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Parse a config from a JSON string (comments tolerated). Used by
    /// tests; the file loader goes through [`load`](Self::load).
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(&strip_json_comments(content)).map_err(
            |source| ConfigError::Parse {
                path: "<inline>".to_string(),
                source,
            },
        )?;
        config.validate()?;
        Ok(config)
    }

    /// Structural invariants beyond what serde enforces.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.rules.is_empty() {
            return Err(ConfigError::Invalid(
                "rules must be a non-empty list".to_string(),
            ));
        }
        if self.classic_pat.is_none() && self.pats.is_empty() && self.fine_grained_pats.is_empty()
        {
            return Err(ConfigError::Invalid(
                "no credentials configured: set classic_pat, fine_grained_pats or pats"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Normalize both config shapes into one credential catalog: modern
    /// entries first, then legacy fine-grained entries, classic PAT as the
    /// fallback.
    pub fn catalog(&self) -> CredentialCatalog {
        let mut scoped: Vec<CredentialEntry> = self.pats.clone();
        scoped.extend(self.fine_grained_pats.iter().map(|entry| CredentialEntry {
            token: entry.pat.clone(),
            repos: entry.repos.clone(),
        }));
        CredentialCatalog::new(scoped, self.classic_pat.clone())
    }
}

/// Reject config files readable by anyone but the owner.
#[cfg(unix)]
fn check_permissions(path: &Path, display: &str) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path).map_err(|source| ConfigError::Io {
        path: display.to_string(),
        source,
    })?;
    let mode = metadata.permissions().mode() & 0o777;
    if mode & 0o077 != 0 {
        return Err(ConfigError::Permissions {
            path: display.to_string(),
            mode,
        });
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_permissions(_path: &Path, _display: &str) -> Result<(), ConfigError> {
    Ok(())
}

/// Strip `//` line comments and `/* */` block comments, outside string
/// literals, so hand-edited configs with annotations still parse.
fn strip_json_comments(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    // Escape sequence: keep the next char verbatim.
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' => match chars.peek() {
                Some('/') => {
                    while let Some(&next) = chars.peek() {
                        if next == '\n' {
                            break;
                        }
                        chars.next();
                    }
                }
                Some('*') => {
                    chars.next();
                    let mut prev = '\0';
                    for next in chars.by_ref() {
                        if prev == '*' && next == '/' {
                            break;
                        }
                        prev = next;
                    }
                }
                _ => out.push(c),
            },
            _ => out.push(c),
        }
    }

    out
}
