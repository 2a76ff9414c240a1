//! Issue helper: exact-match partial body replacement for issues and issue
//! comments via REST.
//!
//! `gh issue edit --body` replaces the whole body, which is hazardous for an
//! agent holding a stale copy. `--old`/`--new` instead replaces one exact
//! occurrence and refuses ambiguous or missing matches. Every other `issue`
//! invocation falls through to `gh`.

use serde_json::{Value, json};

use forgegate_policy::Credential;

use crate::graphql::USER_AGENT;
use crate::{CommandError, CommandOutput, flag_value};

/// REST API root.
const API_URL: &str = "https://api.github.com";

/// API version header sent on every REST call.
const API_VERSION: (&str, &str) = ("X-GitHub-Api-Version", "2022-11-28");

/// Subcommand to policy action mapping. Only the partial-edit forms have a
/// custom mapping.
pub fn action(subcmd: &str, rest: &[String]) -> Option<&'static str> {
    match subcmd {
        "edit" if has_old_and_new(rest) => Some("issues:edit"),
        "comment" if rest.first().map(String::as_str) == Some("edit")
            && has_old_and_new(&rest[1..]) =>
        {
            Some("issues:comment_edit")
        }
        _ => None,
    }
}

fn has_old_and_new(args: &[String]) -> bool {
    flag_value(args, "--old").is_some() && flag_value(args, "--new").is_some()
}

/// Execute an `issue` subcommand. `Ok(None)` means no custom handling;
/// the caller falls through to `gh`.
pub async fn execute(
    args: &[String],
    owner: &str,
    repo: &str,
    credential: &Credential,
    http: &reqwest::Client,
) -> Result<Option<CommandOutput>, CommandError> {
    let Some((subcmd, rest)) = args.split_first() else {
        return Ok(None);
    };

    match subcmd.as_str() {
        "edit" if has_old_and_new(rest) => {
            let number: u64 = rest
                .first()
                .ok_or_else(|| CommandError::Usage("issue number required".to_string()))?
                .parse()
                .map_err(|_| CommandError::Usage("invalid issue number".to_string()))?;
            let old = flag_value(rest, "--old").unwrap_or_default();
            let new = flag_value(rest, "--new").unwrap_or_default();

            let url = format!("{API_URL}/repos/{owner}/{repo}/issues/{number}");
            let output = patch_body(&url, old, new, credential, http).await?;
            Ok(Some(output))
        }
        "comment" if rest.first().map(String::as_str) == Some("edit")
            && has_old_and_new(&rest[1..]) =>
        {
            let edit_args = &rest[1..];
            let comment_id: u64 = edit_args
                .first()
                .ok_or_else(|| CommandError::Usage("comment id required".to_string()))?
                .parse()
                .map_err(|_| CommandError::Usage("invalid comment id".to_string()))?;
            let old = flag_value(edit_args, "--old").unwrap_or_default();
            let new = flag_value(edit_args, "--new").unwrap_or_default();

            let url = format!("{API_URL}/repos/{owner}/{repo}/issues/comments/{comment_id}");
            let output = patch_body(&url, old, new, credential, http).await?;
            Ok(Some(output))
        }
        _ => Ok(None),
    }
}

/// Fetch the resource, replace exactly one occurrence in its body, and
/// PATCH the result back.
async fn patch_body(
    url: &str,
    old: &str,
    new: &str,
    credential: &Credential,
    http: &reqwest::Client,
) -> Result<CommandOutput, CommandError> {
    let current = api_request(http.get(url), credential).await?;
    let body = current["body"].as_str().unwrap_or_default();

    let updated = replace_exactly_once(body, old, new)?;

    api_request(http.patch(url).json(&json!({ "body": updated })), credential).await?;
    Ok(CommandOutput::success("Body updated"))
}

/// Send one authenticated REST request and decode the response, mapping
/// non-2xx statuses to errors.
async fn api_request(
    request: reqwest::RequestBuilder,
    credential: &Credential,
) -> Result<Value, CommandError> {
    let response = request
        .bearer_auth(credential.token())
        .header("Accept", "application/vnd.github+json")
        .header("User-Agent", USER_AGENT)
        .header(API_VERSION.0, API_VERSION.1)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(CommandError::Upstream {
            status: status.as_u16(),
            message: message.chars().take(200).collect(),
        });
    }
    Ok(response.json().await?)
}

/// Replace `old` with `new`, requiring exactly one occurrence.
fn replace_exactly_once(body: &str, old: &str, new: &str) -> Result<String, CommandError> {
    if old.is_empty() {
        return Err(CommandError::Usage("--old must not be empty".to_string()));
    }
    match body.matches(old).count() {
        0 => Err(CommandError::Usage(
            "old text not found in body".to_string(),
        )),
        1 => Ok(body.replacen(old, new, 1)),
        n => Err(CommandError::Usage(format!(
            "old text is ambiguous: {n} occurrences in body"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_action_requires_old_and_new() {
        assert_eq!(
            action("edit", &args(&["3", "--old", "a", "--new", "b"])),
            Some("issues:edit")
        );
        assert_eq!(action("edit", &args(&["3", "--old", "a"])), None);
        assert_eq!(
            action("comment", &args(&["edit", "9", "--old", "a", "--new", "b"])),
            Some("issues:comment_edit")
        );
        assert_eq!(action("comment", &args(&["9", "--old", "a", "--new", "b"])), None);
        assert_eq!(action("view", &args(&["3"])), None);
    }

    #[test]
    fn test_replace_exactly_once() {
        assert_eq!(
            replace_exactly_once("a b c", "b", "x").unwrap(),
            "a x c"
        );
        assert!(matches!(
            replace_exactly_once("a b c", "z", "x"),
            Err(CommandError::Usage(_))
        ));
        assert!(matches!(
            replace_exactly_once("b b", "b", "x"),
            Err(CommandError::Usage(_))
        ));
        assert!(matches!(
            replace_exactly_once("a", "", "x"),
            Err(CommandError::Usage(_))
        ));
    }
}
