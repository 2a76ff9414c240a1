//! Sub-issues helper: list, parent, add, remove and reorder via GraphQL.
//!
//! Sub-issues are only reachable through the GraphQL API behind the
//! `sub_issues` feature header; every call here sends it.

use serde_json::{Value, json};

use crate::{CommandError, CommandOutput, GraphqlClient, flag_value};

/// The feature header required by the sub-issues API.
const FEATURE_HEADER: (&str, &str) = ("GraphQL-Features", "sub_issues");

/// Subcommand to policy action mapping.
pub fn action(subcmd: &str) -> Option<&'static str> {
    match subcmd {
        "list" => Some("subissues:list"),
        "parent" => Some("subissues:parent"),
        "add" => Some("subissues:add"),
        "remove" => Some("subissues:remove"),
        "reorder" => Some("subissues:reprioritize"),
        _ => None,
    }
}

/// Execute a `sub-issue` subcommand.
pub async fn execute(
    args: &[String],
    owner: &str,
    repo: &str,
    gql: &GraphqlClient<'_>,
) -> Result<CommandOutput, CommandError> {
    let (subcmd, rest) = args
        .split_first()
        .ok_or_else(|| CommandError::Usage("sub-issue subcommand required".to_string()))?;

    match subcmd.as_str() {
        "list" => {
            let number = parse_number(rest.first())?;
            list(owner, repo, number, gql).await
        }
        "parent" => {
            let number = parse_number(rest.first())?;
            parent(owner, repo, number, gql).await
        }
        "add" | "remove" => {
            let parent_number = parse_number(rest.first())?;
            let child_number = parse_number(rest.get(1))?;
            link(owner, repo, parent_number, child_number, subcmd == "add", gql).await
        }
        "reorder" => {
            let parent_number = parse_number(rest.first())?;
            let child_number = parse_number(rest.get(1))?;
            let before = flag_value(&rest[2..], "--before")
                .map(|value| value.parse::<u64>())
                .transpose()
                .map_err(|_| CommandError::Usage("invalid --before number".to_string()))?;
            let after = flag_value(&rest[2..], "--after")
                .map(|value| value.parse::<u64>())
                .transpose()
                .map_err(|_| CommandError::Usage("invalid --after number".to_string()))?;
            if before.is_none() && after.is_none() {
                return Err(CommandError::Usage("--before or --after required".to_string()));
            }
            reorder(owner, repo, parent_number, child_number, before, after, gql).await
        }
        other => Err(CommandError::Usage(format!(
            "Unknown sub-issue subcommand: {other}"
        ))),
    }
}

fn parse_number(arg: Option<&String>) -> Result<u64, CommandError> {
    arg.ok_or_else(|| CommandError::Usage("issue number required".to_string()))?
        .parse()
        .map_err(|_| CommandError::Usage("invalid issue number".to_string()))
}

fn issue_line(node: &Value) -> String {
    format!(
        "{}\t{}\t{}",
        node["number"].as_u64().unwrap_or(0),
        node["state"].as_str().unwrap_or(""),
        node["title"].as_str().unwrap_or(""),
    )
}

async fn list(
    owner: &str,
    repo: &str,
    number: u64,
    gql: &GraphqlClient<'_>,
) -> Result<CommandOutput, CommandError> {
    let query = r"
    query($owner: String!, $repo: String!, $number: Int!) {
        repository(owner: $owner, name: $repo) {
            issue(number: $number) {
                subIssues(first: 50) {
                    nodes { number state title }
                }
            }
        }
    }";
    let result = gql
        .execute(
            query,
            json!({ "owner": owner, "repo": repo, "number": number }),
            &[FEATURE_HEADER],
        )
        .await?;

    let lines: Vec<String> = result["data"]["repository"]["issue"]["subIssues"]["nodes"]
        .as_array()
        .map(|nodes| nodes.iter().map(issue_line).collect())
        .unwrap_or_default();
    Ok(CommandOutput::success(lines.join("\n")))
}

async fn parent(
    owner: &str,
    repo: &str,
    number: u64,
    gql: &GraphqlClient<'_>,
) -> Result<CommandOutput, CommandError> {
    let query = r"
    query($owner: String!, $repo: String!, $number: Int!) {
        repository(owner: $owner, name: $repo) {
            issue(number: $number) {
                parent { number state title }
            }
        }
    }";
    let result = gql
        .execute(
            query,
            json!({ "owner": owner, "repo": repo, "number": number }),
            &[FEATURE_HEADER],
        )
        .await?;

    let parent = &result["data"]["repository"]["issue"]["parent"];
    let stdout = if parent.is_null() {
        "No parent issue".to_string()
    } else {
        issue_line(parent)
    };
    Ok(CommandOutput::success(stdout))
}

async fn link(
    owner: &str,
    repo: &str,
    parent_number: u64,
    child_number: u64,
    add: bool,
    gql: &GraphqlClient<'_>,
) -> Result<CommandOutput, CommandError> {
    let parent_id = gql.issue_node_id(owner, repo, parent_number).await?;
    let child_id = gql.issue_node_id(owner, repo, child_number).await?;

    let mutation = if add {
        r"
        mutation($issueId: ID!, $subIssueId: ID!) {
            addSubIssue(input: {issueId: $issueId, subIssueId: $subIssueId}) {
                issue { number }
            }
        }"
    } else {
        r"
        mutation($issueId: ID!, $subIssueId: ID!) {
            removeSubIssue(input: {issueId: $issueId, subIssueId: $subIssueId}) {
                issue { number }
            }
        }"
    };
    gql.execute(
        mutation,
        json!({ "issueId": parent_id, "subIssueId": child_id }),
        &[FEATURE_HEADER],
    )
    .await?;

    let stdout = if add {
        format!("Added #{child_number} as sub-issue of #{parent_number}")
    } else {
        format!("Removed #{child_number} from #{parent_number}")
    };
    Ok(CommandOutput::success(stdout))
}

async fn reorder(
    owner: &str,
    repo: &str,
    parent_number: u64,
    child_number: u64,
    before: Option<u64>,
    after: Option<u64>,
    gql: &GraphqlClient<'_>,
) -> Result<CommandOutput, CommandError> {
    let parent_id = gql.issue_node_id(owner, repo, parent_number).await?;
    let child_id = gql.issue_node_id(owner, repo, child_number).await?;

    let mut input = json!({ "issueId": parent_id, "subIssueId": child_id });
    if let Some(before_number) = before {
        input["beforeId"] = json!(gql.issue_node_id(owner, repo, before_number).await?);
    } else if let Some(after_number) = after {
        input["afterId"] = json!(gql.issue_node_id(owner, repo, after_number).await?);
    }

    let mutation = r"
    mutation($input: ReprioritizeSubIssueInput!) {
        reprioritizeSubIssue(input: $input) {
            issue { number }
        }
    }";
    gql.execute(mutation, json!({ "input": input }), &[FEATURE_HEADER])
        .await?;
    Ok(CommandOutput::success("Reordered"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_mapping() {
        assert_eq!(action("list"), Some("subissues:list"));
        assert_eq!(action("parent"), Some("subissues:parent"));
        assert_eq!(action("add"), Some("subissues:add"));
        assert_eq!(action("remove"), Some("subissues:remove"));
        assert_eq!(action("reorder"), Some("subissues:reprioritize"));
        assert_eq!(action("bogus"), None);
    }
}
