//! Discussions helper: list, view, create, edit and comment via GraphQL.
//!
//! The `gh` CLI has no `discussion` command, so this family is implemented
//! against the GraphQL API directly.

use serde_json::json;

use crate::{CommandError, CommandOutput, GraphqlClient, flag_value};

/// Subcommand to policy action mapping.
pub fn action(subcmd: &str) -> Option<&'static str> {
    match subcmd {
        "list" | "view" => Some("discussions:read"),
        "create" | "edit" | "comment" => Some("discussions:write"),
        _ => None,
    }
}

/// Execute a `discussion` subcommand.
pub async fn execute(
    args: &[String],
    owner: &str,
    repo: &str,
    gql: &GraphqlClient<'_>,
) -> Result<CommandOutput, CommandError> {
    let (subcmd, rest) = args
        .split_first()
        .ok_or_else(|| CommandError::Usage("discussion subcommand required".to_string()))?;

    match subcmd.as_str() {
        "list" => list(owner, repo, gql).await,
        "view" => {
            let number = parse_number(rest.first(), "discussion number")?;
            view(owner, repo, number, gql).await
        }
        "create" => {
            let title = flag_value(rest, "--title")
                .ok_or_else(|| CommandError::Usage("--title is required".to_string()))?;
            let body = flag_value(rest, "--body").unwrap_or("");
            let category = flag_value(rest, "--category")
                .ok_or_else(|| CommandError::Usage("--category is required".to_string()))?;
            create(owner, repo, title, body, category, gql).await
        }
        "edit" => {
            let number = parse_number(rest.first(), "discussion number")?;
            let title = flag_value(&rest[1..], "--title");
            let body = flag_value(&rest[1..], "--body");
            if title.is_none() && body.is_none() {
                return Err(CommandError::Usage(
                    "--title or --body is required".to_string(),
                ));
            }
            edit(owner, repo, number, title, body, gql).await
        }
        "comment" => {
            let number = parse_number(rest.first(), "discussion number")?;
            let body = flag_value(&rest[1..], "--body")
                .ok_or_else(|| CommandError::Usage("--body is required".to_string()))?;
            comment(owner, repo, number, body, gql).await
        }
        other => Err(CommandError::Usage(format!(
            "Unknown discussion subcommand: {other}"
        ))),
    }
}

fn parse_number(arg: Option<&String>, what: &str) -> Result<u64, CommandError> {
    arg.ok_or_else(|| CommandError::Usage(format!("{what} required")))?
        .parse()
        .map_err(|_| CommandError::Usage(format!("invalid {what}")))
}

async fn list(
    owner: &str,
    repo: &str,
    gql: &GraphqlClient<'_>,
) -> Result<CommandOutput, CommandError> {
    let query = r"
    query($owner: String!, $repo: String!) {
        repository(owner: $owner, name: $repo) {
            discussions(first: 30, orderBy: {field: UPDATED_AT, direction: DESC}) {
                nodes {
                    number
                    title
                    category { name }
                    author { login }
                }
            }
        }
    }";
    let result = gql
        .execute(query, json!({ "owner": owner, "repo": repo }), &[])
        .await?;

    let mut lines = Vec::new();
    if let Some(nodes) = result["data"]["repository"]["discussions"]["nodes"].as_array() {
        for node in nodes {
            lines.push(format!(
                "{}\t{}\t{}\t{}",
                node["number"].as_u64().unwrap_or(0),
                node["category"]["name"].as_str().unwrap_or(""),
                node["author"]["login"].as_str().unwrap_or(""),
                node["title"].as_str().unwrap_or(""),
            ));
        }
    }
    Ok(CommandOutput::success(lines.join("\n")))
}

async fn view(
    owner: &str,
    repo: &str,
    number: u64,
    gql: &GraphqlClient<'_>,
) -> Result<CommandOutput, CommandError> {
    let query = r"
    query($owner: String!, $repo: String!, $number: Int!) {
        repository(owner: $owner, name: $repo) {
            discussion(number: $number) {
                title
                body
                url
                author { login }
                category { name }
            }
        }
    }";
    let result = gql
        .execute(
            query,
            json!({ "owner": owner, "repo": repo, "number": number }),
            &[],
        )
        .await?;

    let discussion = &result["data"]["repository"]["discussion"];
    if discussion.is_null() {
        return Err(CommandError::Usage(format!(
            "discussion #{number} not found in {owner}/{repo}"
        )));
    }
    let stdout = format!(
        "{}\n{} in {} by {}\n\n{}",
        discussion["title"].as_str().unwrap_or(""),
        discussion["url"].as_str().unwrap_or(""),
        discussion["category"]["name"].as_str().unwrap_or(""),
        discussion["author"]["login"].as_str().unwrap_or(""),
        discussion["body"].as_str().unwrap_or(""),
    );
    Ok(CommandOutput::success(stdout))
}

async fn create(
    owner: &str,
    repo: &str,
    title: &str,
    body: &str,
    category: &str,
    gql: &GraphqlClient<'_>,
) -> Result<CommandOutput, CommandError> {
    let repository_id = gql.repository_id(owner, repo).await?;
    let category_id = category_id(owner, repo, category, gql).await?;

    let mutation = r"
    mutation($repositoryId: ID!, $categoryId: ID!, $title: String!, $body: String!) {
        createDiscussion(input: {
            repositoryId: $repositoryId,
            categoryId: $categoryId,
            title: $title,
            body: $body
        }) {
            discussion { number url }
        }
    }";
    let result = gql
        .execute(
            mutation,
            json!({
                "repositoryId": repository_id,
                "categoryId": category_id,
                "title": title,
                "body": body,
            }),
            &[],
        )
        .await?;

    let discussion = &result["data"]["createDiscussion"]["discussion"];
    Ok(CommandOutput::success(format!(
        "Created discussion #{}: {}",
        discussion["number"].as_u64().unwrap_or(0),
        discussion["url"].as_str().unwrap_or(""),
    )))
}

async fn edit(
    owner: &str,
    repo: &str,
    number: u64,
    title: Option<&str>,
    body: Option<&str>,
    gql: &GraphqlClient<'_>,
) -> Result<CommandOutput, CommandError> {
    let discussion_id = discussion_id(owner, repo, number, gql).await?;

    let mut input = json!({ "discussionId": discussion_id });
    if let Some(title) = title {
        input["title"] = json!(title);
    }
    if let Some(body) = body {
        input["body"] = json!(body);
    }

    let mutation = r"
    mutation($input: UpdateDiscussionInput!) {
        updateDiscussion(input: $input) {
            discussion { number }
        }
    }";
    gql.execute(mutation, json!({ "input": input }), &[]).await?;
    Ok(CommandOutput::success(format!("Updated discussion #{number}")))
}

async fn comment(
    owner: &str,
    repo: &str,
    number: u64,
    body: &str,
    gql: &GraphqlClient<'_>,
) -> Result<CommandOutput, CommandError> {
    let discussion_id = discussion_id(owner, repo, number, gql).await?;

    let mutation = r"
    mutation($discussionId: ID!, $body: String!) {
        addDiscussionComment(input: {discussionId: $discussionId, body: $body}) {
            comment { url }
        }
    }";
    let result = gql
        .execute(
            mutation,
            json!({ "discussionId": discussion_id, "body": body }),
            &[],
        )
        .await?;

    Ok(CommandOutput::success(format!(
        "Commented: {}",
        result["data"]["addDiscussionComment"]["comment"]["url"]
            .as_str()
            .unwrap_or(""),
    )))
}

/// Discussion node id by number.
async fn discussion_id(
    owner: &str,
    repo: &str,
    number: u64,
    gql: &GraphqlClient<'_>,
) -> Result<String, CommandError> {
    let query = r"
    query($owner: String!, $repo: String!, $number: Int!) {
        repository(owner: $owner, name: $repo) {
            discussion(number: $number) { id }
        }
    }";
    let result = gql
        .execute(
            query,
            json!({ "owner": owner, "repo": repo, "number": number }),
            &[],
        )
        .await?;
    result["data"]["repository"]["discussion"]["id"]
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| {
            CommandError::Usage(format!("discussion #{number} not found in {owner}/{repo}"))
        })
}

/// Category node id by (case-insensitive) name.
async fn category_id(
    owner: &str,
    repo: &str,
    category: &str,
    gql: &GraphqlClient<'_>,
) -> Result<String, CommandError> {
    let query = r"
    query($owner: String!, $repo: String!) {
        repository(owner: $owner, name: $repo) {
            discussionCategories(first: 25) {
                nodes { id name }
            }
        }
    }";
    let result = gql
        .execute(query, json!({ "owner": owner, "repo": repo }), &[])
        .await?;

    let nodes = result["data"]["repository"]["discussionCategories"]["nodes"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    for node in &nodes {
        if node["name"]
            .as_str()
            .is_some_and(|name| name.eq_ignore_ascii_case(category))
        {
            if let Some(id) = node["id"].as_str() {
                return Ok(id.to_string());
            }
        }
    }

    let known: Vec<&str> = nodes
        .iter()
        .filter_map(|node| node["name"].as_str())
        .collect();
    Err(CommandError::Usage(format!(
        "unknown discussion category {category:?} (known: {})",
        known.join(", ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_mapping() {
        assert_eq!(action("list"), Some("discussions:read"));
        assert_eq!(action("view"), Some("discussions:read"));
        assert_eq!(action("create"), Some("discussions:write"));
        assert_eq!(action("edit"), Some("discussions:write"));
        assert_eq!(action("comment"), Some("discussions:write"));
        assert_eq!(action("delete"), None);
    }
}
