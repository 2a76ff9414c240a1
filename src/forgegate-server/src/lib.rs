//! Forgegate Server - HTTP ingress and upstream forwarder.
//!
//! This crate provides:
//! - The reverse-proxy surface an untrusted agent talks to: a REST API
//!   branch (any path), a git smart HTTP branch (`/git/...`), the `/cli`
//!   helper side channel and the `/auth/status` report
//! - The upstream forwarder that attaches the selected credential and
//!   streams GitHub's response back
//!
//! Every request passes through the policy gate before anything is
//! forwarded; denials are answered locally and never reach GitHub.

pub mod auth_status;
pub mod error;
pub mod forward;
pub mod handlers;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{any, get, post};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use forgegate_policy::ProxyConfig;

pub use error::{ProxyError, ProxyResult};
pub use state::AppState;

/// Run the proxy until the shutdown future resolves.
pub async fn run_with_shutdown<F>(
    addr: SocketAddr,
    config: ProxyConfig,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let state = Arc::new(AppState::new(config)?);
    let app = create_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("Forgegate listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Run the proxy forever.
pub async fn run(addr: SocketAddr, config: ProxyConfig) -> anyhow::Result<()> {
    run_with_shutdown(addr, config, std::future::pending()).await
}

/// Create the application router.
///
/// The side-channel routes are registered explicitly; everything else falls
/// back to the API branch, which fails closed on unknown endpoints.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/auth/status", get(auth_status::auth_status))
        .route("/cli", post(handlers::cli))
        .route("/git/{*rest}", any(handlers::git))
        .fallback(handlers::api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use forgegate_policy::{Credential, CredentialEntry, Effect, PolicyRule};

    fn test_state(rules: Vec<PolicyRule>) -> Arc<AppState> {
        let config = ProxyConfig {
            classic_pat: Some(Credential::new("ghp_test_classic_0000")),
            fine_grained_pats: vec![],
            pats: vec![CredentialEntry {
                token: Credential::new("github_pat_scoped_0001"),
                repos: vec!["acme/*".to_string()],
            }],
            rules,
        };
        Arc::new(AppState::new(config).expect("state builds"))
    }

    fn allow_all() -> Vec<PolicyRule> {
        vec![PolicyRule {
            effect: Effect::Allow,
            actions: vec!["*".to_string()],
            repos: vec!["*".to_string()],
        }]
    }

    fn deny_merges() -> Vec<PolicyRule> {
        vec![
            PolicyRule {
                effect: Effect::Allow,
                actions: vec!["*".to_string()],
                repos: vec!["*".to_string()],
            },
            PolicyRule {
                effect: Effect::Deny,
                actions: vec!["pr:merge".to_string()],
                repos: vec!["*".to_string()],
            },
        ]
    }

    #[tokio::test]
    async fn test_unknown_endpoint_is_forbidden() {
        let app = create_router(test_state(allow_all()));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/repos/a/b/secrets")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_denied_merge_never_reaches_upstream() {
        let app = create_router(test_state(deny_merges()));
        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/repos/acme/foo/pulls/1/merge")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"merge_method":"squash"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        let payload: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload["error"]["code"], "policy_denied");
        // The denial reason names the rule, never a token.
        let message = payload["error"]["message"].as_str().unwrap();
        assert!(message.contains("pr:merge"));
        assert!(!message.contains("ghp_"));
        assert!(!message.contains("github_pat_"));
    }

    #[tokio::test]
    async fn test_git_push_denied_under_read_only_rules() {
        let rules = vec![PolicyRule {
            effect: Effect::Allow,
            actions: vec!["git:read".to_string()],
            repos: vec!["*".to_string()],
        }];
        let app = create_router(test_state(rules));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/git/acme/foo.git/info/refs?service=git-receive-pack")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_cli_requires_args_and_repo() {
        let app = create_router(test_state(allow_all()));
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/cli")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"repo": "a/b"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/cli")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"args": ["issue", "list"]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cli_custom_command_is_policy_checked() {
        // Only discussions:read is allowed, so a discussion create must be
        // refused before any upstream call.
        let rules = vec![PolicyRule {
            effect: Effect::Allow,
            actions: vec!["discussions:read".to_string()],
            repos: vec!["*".to_string()],
        }];
        let app = create_router(test_state(rules));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/cli")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"args": ["discussion", "create", "--title", "t", "--category", "general"], "repo": "acme/foo"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_auth_status_rejects_post() {
        let app = create_router(test_state(allow_all()));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
