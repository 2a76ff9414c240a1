//! GitHub GraphQL executor shared by the helper commands.

use serde_json::{Value, json};

use forgegate_policy::Credential;

use crate::CommandError;

/// GraphQL endpoint.
const GRAPHQL_URL: &str = "https://api.github.com/graphql";

/// User-Agent sent on every helper request.
pub(crate) const USER_AGENT: &str = "forgegate-proxy";

/// A thin GraphQL client bound to one credential for one command execution.
pub struct GraphqlClient<'a> {
    http: &'a reqwest::Client,
    credential: &'a Credential,
}

impl<'a> GraphqlClient<'a> {
    /// Bind the shared HTTP client to a credential.
    pub fn new(http: &'a reqwest::Client, credential: &'a Credential) -> Self {
        Self { http, credential }
    }

    /// Execute a query or mutation. An `errors` array in the response payload
    /// is surfaced as a failure even when HTTP status is 200.
    pub async fn execute(
        &self,
        query: &str,
        variables: Value,
        extra_headers: &[(&str, &str)],
    ) -> Result<Value, CommandError> {
        let mut body = json!({ "query": query });
        if !variables.is_null() {
            body["variables"] = variables;
        }

        let mut request = self
            .http
            .post(GRAPHQL_URL)
            .bearer_auth(self.credential.token())
            .header("User-Agent", USER_AGENT)
            .json(&body);
        for (name, value) in extra_headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await?;
        let status = response.status();
        let payload: Value = response.json().await?;

        if let Some(errors) = payload.get("errors") {
            return Err(CommandError::Graphql(errors.to_string()));
        }
        if !status.is_success() {
            return Err(CommandError::Upstream {
                status: status.as_u16(),
                message: payload.to_string(),
            });
        }

        Ok(payload)
    }

    /// Repository node id.
    pub async fn repository_id(&self, owner: &str, repo: &str) -> Result<String, CommandError> {
        let query = r"
        query($owner: String!, $repo: String!) {
            repository(owner: $owner, name: $repo) {
                id
            }
        }";
        let result = self
            .execute(query, json!({ "owner": owner, "repo": repo }), &[])
            .await?;
        result["data"]["repository"]["id"]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| CommandError::Graphql(format!("repository {owner}/{repo} not found")))
    }

    /// Issue node id, with the sub-issues feature header so the id works for
    /// sub-issue mutations too.
    pub async fn issue_node_id(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<String, CommandError> {
        let query = r"
        query($owner: String!, $repo: String!, $number: Int!) {
            repository(owner: $owner, name: $repo) {
                issue(number: $number) {
                    id
                }
            }
        }";
        let result = self
            .execute(
                query,
                json!({ "owner": owner, "repo": repo, "number": number }),
                &[("GraphQL-Features", "sub_issues")],
            )
            .await?;
        result["data"]["repository"]["issue"]["id"]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| {
                CommandError::Graphql(format!("issue #{number} not found in {owner}/{repo}"))
            })
    }
}
