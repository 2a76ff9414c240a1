//! Request handlers: the API fallback branch, the git branch and the `/cli`
//! side channel.

use std::sync::Arc;

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::Response;
use axum::response::IntoResponse;
use serde::Deserialize;
use tracing::info;

use forgegate_commands::{CommandOutput, cli_action, gh, is_custom_command};
use forgegate_policy::GateRejection;

use crate::error::{ProxyError, ProxyResult};
use crate::forward;
use crate::state::AppState;

/// Body limit for API requests. GitHub rejects bodies long before this.
const API_BODY_LIMIT: usize = 16 * 1024 * 1024;

/// Body limit for git requests; pushes carry whole packfiles.
const GIT_BODY_LIMIT: usize = 1024 * 1024 * 1024;

/// Fallback handler: everything that is not `/git/`, `/cli` or
/// `/auth/status` is treated as a REST API request and gated.
pub async fn api(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> ProxyResult<Response<Body>> {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();
    let query = parts.uri.query().map(ToString::to_string);
    let body = read_body(body, API_BODY_LIMIT).await?;

    let verdict = state.gate.authorize_api(parts.method.as_str(), &path, &body)?;
    info!(action = %verdict.action, repo = %verdict.repo, "API request allowed");

    forward::forward_api(
        &state,
        parts.method,
        &path,
        query.as_deref(),
        &parts.headers,
        body,
        &verdict,
    )
    .await
}

/// The `/git/{owner}/{repo}.git/...` branch: smart HTTP passthrough.
pub async fn git(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> ProxyResult<Response<Body>> {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();
    let query = parts.uri.query().map(ToString::to_string);

    let verdict =
        state
            .gate
            .authorize_git(parts.method.as_str(), &path, query.as_deref().unwrap_or(""))?;
    info!(action = %verdict.action, repo = %verdict.repo, "git request allowed");

    let body = read_body(body, GIT_BODY_LIMIT).await?;
    forward::forward_git(
        &state,
        parts.method,
        &path,
        query.as_deref(),
        &parts.headers,
        body,
        &verdict,
    )
    .await
}

/// `/cli` request body.
#[derive(Debug, Deserialize)]
struct CliRequest {
    /// The command argument vector, `gh`-style.
    #[serde(default)]
    args: Vec<String>,

    /// Target repository as `owner/repo`.
    #[serde(default)]
    repo: Option<String>,
}

/// The `/cli` side channel: custom helper commands are mapped to explicit
/// actions and policy-checked; everything else runs through `gh` with the
/// selected credential.
pub async fn cli(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ProxyResult<impl IntoResponse> {
    let request: CliRequest = serde_json::from_slice(&body)
        .map_err(|_| ProxyError::BadRequest("Invalid JSON in request body".to_string()))?;

    if request.args.is_empty() {
        return Err(ProxyError::BadRequest("args is required".to_string()));
    }
    let repo = request
        .repo
        .ok_or_else(|| ProxyError::BadRequest("repo is required".to_string()))?;
    let Some((owner, repo_name)) = repo.split_once('/') else {
        return Err(ProxyError::BadRequest(
            "repo must be in owner/repo form".to_string(),
        ));
    };

    let credential = match cli_action(&request.args) {
        // Custom command with a known action: full policy check.
        Some(action) => state.gate.authorize_action(action, &repo)?.credential,
        // No custom mapping: credential scoping only, like any gh invocation.
        None => state
            .gate
            .catalog()
            .select(&repo)
            .ok_or_else(|| GateRejection::NoCredential { repo: repo.clone() })?
            .clone(),
    };

    let output = run_cli_command(&state, &request.args, owner, repo_name, &repo, &credential).await?;
    Ok(Json(output))
}

/// Run a `/cli` command: custom helpers first, `gh` for the rest (including
/// helper invocations that declined to handle the arguments).
async fn run_cli_command(
    state: &AppState,
    args: &[String],
    owner: &str,
    repo_name: &str,
    repo: &str,
    credential: &forgegate_policy::Credential,
) -> ProxyResult<CommandOutput> {
    if is_custom_command(&args[0]) {
        if let Some(output) =
            forgegate_commands::execute(args, owner, repo_name, credential, &state.http).await?
        {
            return Ok(output);
        }
    }
    Ok(gh::execute(args, repo, credential).await?)
}

/// Buffer the request body up to `limit` bytes.
async fn read_body(body: Body, limit: usize) -> ProxyResult<Bytes> {
    axum::body::to_bytes(body, limit)
        .await
        .map_err(|error| ProxyError::BadRequest(format!("Failed to read request body: {error}")))
}
