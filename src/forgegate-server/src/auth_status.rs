//! `/auth/status`: validates every configured PAT against the upstream
//! `/user` endpoint and reports masked results.
//!
//! The response mirrors the config shape: modern configs get a `pats` list,
//! legacy configs get `classic_pat` + `fine_grained_pats`. Tokens are always
//! masked.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use forgegate_policy::Credential;

use crate::error::ProxyResult;
use crate::state::AppState;

/// Validation result for a single PAT.
#[derive(Debug, Serialize)]
pub struct PatStatus {
    /// Whether the token authenticated successfully.
    pub valid: bool,

    /// Masked token for display.
    pub masked_token: String,

    /// Token kind: `classic` or `fine_grained`.
    #[serde(rename = "type")]
    pub pat_type: &'static str,

    /// Authenticated user login, when valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// OAuth scopes (classic tokens only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,

    /// Configured repository patterns (scoped tokens only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repos: Option<Vec<String>>,

    /// Error description, when invalid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response for modern configs.
#[derive(Debug, Serialize)]
pub struct ModernStatus {
    /// One entry per configured PAT.
    pub pats: Vec<PatStatus>,
}

/// Response for legacy configs.
#[derive(Debug, Serialize)]
pub struct LegacyStatus {
    /// The classic catch-all.
    pub classic_pat: Option<PatStatus>,

    /// The scoped fine-grained entries.
    pub fine_grained_pats: Vec<PatStatus>,
}

/// Either response shape.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AuthStatusResponse {
    Modern(ModernStatus),
    Legacy(LegacyStatus),
}

/// GET `/auth/status`.
pub async fn auth_status(
    State(state): State<Arc<AppState>>,
) -> ProxyResult<Json<AuthStatusResponse>> {
    let config = &state.config;

    if !config.pats.is_empty() {
        let mut pats = Vec::with_capacity(config.pats.len());
        for entry in &config.pats {
            let pat_type = detect_pat_type(&entry.token);
            pats.push(
                check_pat(&state.http, &entry.token, pat_type, Some(entry.repos.clone())).await,
            );
        }
        return Ok(Json(AuthStatusResponse::Modern(ModernStatus { pats })));
    }

    let classic_pat = match &config.classic_pat {
        Some(token) => Some(check_pat(&state.http, token, "classic", None).await),
        None => None,
    };
    let mut fine_grained_pats = Vec::with_capacity(config.fine_grained_pats.len());
    for entry in &config.fine_grained_pats {
        fine_grained_pats.push(
            check_pat(
                &state.http,
                &entry.pat,
                "fine_grained",
                Some(entry.repos.clone()),
            )
            .await,
        );
    }

    Ok(Json(AuthStatusResponse::Legacy(LegacyStatus {
        classic_pat,
        fine_grained_pats,
    })))
}

/// Guess the token kind from its prefix.
fn detect_pat_type(credential: &Credential) -> &'static str {
    if credential.token().starts_with("github_pat_") {
        "fine_grained"
    } else {
        "classic"
    }
}

/// Validate one PAT by calling the upstream `/user` endpoint.
async fn check_pat(
    http: &reqwest::Client,
    credential: &Credential,
    pat_type: &'static str,
    repos: Option<Vec<String>>,
) -> PatStatus {
    let masked_token = credential.masked();

    let response = http
        .get("https://api.github.com/user")
        .bearer_auth(credential.token())
        .header("Accept", "application/vnd.github+json")
        .header("User-Agent", "forgegate-proxy")
        .header("X-GitHub-Api-Version", "2022-11-28")
        .send()
        .await;

    match response {
        Ok(response) if response.status().is_success() => {
            let scopes = if pat_type == "classic" {
                response
                    .headers()
                    .get("x-oauth-scopes")
                    .and_then(|value| value.to_str().ok())
                    .map(|value| {
                        value
                            .split(',')
                            .map(str::trim)
                            .filter(|scope| !scope.is_empty())
                            .map(ToString::to_string)
                            .collect()
                    })
            } else {
                None
            };
            let user = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|body| body["login"].as_str().map(ToString::to_string));

            PatStatus {
                valid: true,
                masked_token,
                pat_type,
                user,
                scopes,
                repos: if pat_type == "classic" { None } else { repos },
                error: None,
            }
        }
        Ok(response) => PatStatus {
            valid: false,
            masked_token,
            pat_type,
            user: None,
            scopes: None,
            repos,
            error: Some(format!("HTTP {}", response.status())),
        },
        Err(error) => PatStatus {
            valid: false,
            masked_token,
            pat_type,
            user: None,
            scopes: None,
            repos,
            error: Some(error.to_string()),
        },
    }
}
