//! Forgegate Commands - helper commands behind the proxy's `/cli` side
//! channel.
//!
//! Three command families get custom implementations because the `gh` CLI
//! either lacks them or cannot express them safely:
//! - `discussion`: GitHub Discussions via GraphQL
//! - `sub-issue`: Sub-Issues via GraphQL (feature-flagged API)
//! - `issue edit --old/--new`: exact-match partial body replacement via REST
//!
//! Everything else is executed through the `gh` CLI with the selected
//! credential injected as `GH_TOKEN`.
//!
//! Each custom family maps its subcommands to explicit policy actions; the
//! server authorizes those through the gate before execution. The action
//! names live in the policy crate's compile-time universe rather than a
//! runtime registry.

pub mod discussion;
pub mod gh;
pub mod graphql;
pub mod issue;
pub mod sub_issue;

use serde::Serialize;
use thiserror::Error;

use forgegate_policy::Credential;

pub use graphql::GraphqlClient;

/// Errors from helper command execution.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The caller's arguments are wrong (missing subcommand, bad number,
    /// ambiguous replacement). Maps to 400.
    #[error("{0}")]
    Usage(String),

    /// GraphQL returned an error payload.
    #[error("GraphQL error: {0}")]
    Graphql(String),

    /// The upstream REST call failed with a status.
    #[error("Upstream error: HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Transport-level HTTP failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Spawning or waiting on the `gh` subprocess failed.
    #[error("Failed to run gh: {0}")]
    Subprocess(#[from] std::io::Error),

    /// The `gh` subprocess exceeded its deadline.
    #[error("gh command timed out")]
    Timeout,
}

/// Result of a helper command, mirrored back to the caller as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutput {
    /// Process-style exit code (0 on success).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

/// Whether a command name has a custom implementation here.
pub fn is_custom_command(cmd: &str) -> bool {
    matches!(cmd, "discussion" | "sub-issue" | "issue")
}

/// Map a full `/cli` argument vector to the policy action it needs.
///
/// `None` means the invocation has no custom mapping and falls through to
/// `gh` (credential-scoped, not policy-checked).
pub fn cli_action(args: &[String]) -> Option<&'static str> {
    let (cmd, rest) = args.split_first()?;
    let subcmd = rest.first().map(String::as_str);
    match cmd.as_str() {
        "discussion" => discussion::action(subcmd?),
        "sub-issue" => sub_issue::action(subcmd?),
        "issue" => issue::action(subcmd?, &rest[1..]),
        _ => None,
    }
}

/// Execute a custom command.
///
/// `issue` invocations without a custom mapping return `Ok(None)` so the
/// caller can fall through to `gh`.
pub async fn execute(
    args: &[String],
    owner: &str,
    repo: &str,
    credential: &Credential,
    http: &reqwest::Client,
) -> Result<Option<CommandOutput>, CommandError> {
    let (cmd, rest) = args
        .split_first()
        .ok_or_else(|| CommandError::Usage("command required".to_string()))?;

    let gql = GraphqlClient::new(http, credential);
    match cmd.as_str() {
        "discussion" => discussion::execute(rest, owner, repo, &gql).await.map(Some),
        "sub-issue" => sub_issue::execute(rest, owner, repo, &gql).await.map(Some),
        "issue" => issue::execute(rest, owner, repo, credential, http).await,
        other => Err(CommandError::Usage(format!("Unknown command: {other}"))),
    }
}

/// Pull a `--flag value` pair out of an argument list.
pub(crate) fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|index| args.get(index + 1))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_cli_action_mapping() {
        assert_eq!(cli_action(&args(&["discussion", "list"])), Some("discussions:read"));
        assert_eq!(cli_action(&args(&["discussion", "create"])), Some("discussions:write"));
        assert_eq!(cli_action(&args(&["sub-issue", "reorder"])), Some("subissues:reprioritize"));
        assert_eq!(
            cli_action(&args(&["issue", "edit", "3", "--old", "a", "--new", "b"])),
            Some("issues:edit")
        );
        // `issue view` has no custom mapping; it falls through to gh.
        assert_eq!(cli_action(&args(&["issue", "view", "3"])), None);
        assert_eq!(cli_action(&args(&["pr", "list"])), None);
        assert_eq!(cli_action(&args(&["discussion"])), None);
        assert_eq!(cli_action(&[]), None);
    }

    #[test]
    fn test_flag_value() {
        let list = args(&["--old", "x", "--new", "y"]);
        assert_eq!(flag_value(&list, "--old"), Some("x"));
        assert_eq!(flag_value(&list, "--new"), Some("y"));
        assert_eq!(flag_value(&list, "--missing"), None);
        assert_eq!(flag_value(&args(&["--old"]), "--old"), None);
    }
}
