//! Upstream forwarder: rewrites allowed requests onto GitHub and streams
//! the response back.
//!
//! The API branch targets `https://api.github.com` with Bearer auth; the git
//! branch strips the local `/git` prefix, targets `https://github.com`, and
//! authenticates with Basic auth as `x-access-token`. Request bodies are the
//! already-buffered bytes the gate inspected; response bodies are streamed.

use axum::body::{Body, Bytes};
use axum::http::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, USER_AGENT};
use axum::http::{HeaderMap, Method, Response};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::debug;

use forgegate_policy::Verdict;

use crate::error::{ProxyError, ProxyResult};
use crate::state::AppState;

/// REST API upstream.
const API_BASE: &str = "https://api.github.com";

/// git smart HTTP upstream.
const GIT_BASE: &str = "https://github.com";

/// User-Agent for forwarded API requests.
const PROXY_USER_AGENT: &str = "forgegate-proxy";

/// User-Agent for forwarded git requests.
const GIT_USER_AGENT: &str = "git/2.40.0";

/// Forward an allowed API request and stream the upstream response.
pub async fn forward_api(
    state: &AppState,
    method: Method,
    path: &str,
    query: Option<&str>,
    headers: &HeaderMap,
    body: Bytes,
    verdict: &Verdict,
) -> ProxyResult<Response<Body>> {
    let mut url = format!("{API_BASE}{path}");
    if let Some(query) = query {
        url.push('?');
        url.push_str(query);
    }
    debug!(%method, url, action = %verdict.action, "forwarding API request");

    let mut request = state
        .http
        .request(method, &url)
        .bearer_auth(verdict.credential.token())
        .header(USER_AGENT, PROXY_USER_AGENT);
    for name in [ACCEPT, CONTENT_TYPE] {
        if let Some(value) = headers.get(&name) {
            request = request.header(name, value.clone());
        }
    }
    if let Some(value) = headers.get("x-github-api-version") {
        request = request.header("x-github-api-version", value.clone());
    }
    if !body.is_empty() {
        request = request.body(body);
    }

    let upstream = request.send().await?;
    stream_response(upstream, &[CONTENT_TYPE])
}

/// Forward an allowed git smart HTTP request and stream the upstream
/// response.
pub async fn forward_git(
    state: &AppState,
    method: Method,
    path: &str,
    query: Option<&str>,
    headers: &HeaderMap,
    body: Bytes,
    verdict: &Verdict,
) -> ProxyResult<Response<Body>> {
    // `/git/{owner}/{repo}.git/...` -> `/{owner}/{repo}.git/...`
    let upstream_path = path.strip_prefix("/git").unwrap_or(path);
    let mut url = format!("{GIT_BASE}{upstream_path}");
    if let Some(query) = query {
        url.push('?');
        url.push_str(query);
    }
    debug!(%method, url, action = %verdict.action, "forwarding git request");

    let credentials = BASE64.encode(format!("x-access-token:{}", verdict.credential.token()));
    let mut request = state
        .http
        .request(method, &url)
        .header(AUTHORIZATION, format!("Basic {credentials}"))
        .header(USER_AGENT, GIT_USER_AGENT);
    for name in [ACCEPT, CONTENT_TYPE] {
        if let Some(value) = headers.get(&name) {
            request = request.header(name, value.clone());
        }
    }
    if !body.is_empty() {
        request = request.body(body);
    }

    let upstream = request.send().await?;
    stream_response(upstream, &[CONTENT_TYPE, CACHE_CONTROL])
}

/// Build an axum response that streams the upstream body, carrying over the
/// selected headers.
fn stream_response(
    upstream: reqwest::Response,
    headers: &[axum::http::HeaderName],
) -> ProxyResult<Response<Body>> {
    let mut builder = Response::builder().status(upstream.status());
    for name in headers {
        if let Some(value) = upstream.headers().get(name) {
            builder = builder.header(name.clone(), value.clone());
        }
    }
    builder
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|error| ProxyError::Internal(error.to_string()))
}
