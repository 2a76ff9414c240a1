//! Error types for the proxy server.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use forgegate_commands::CommandError;
use forgegate_policy::GateRejection;

/// Proxy error type. Every rejection the gate or a collaborator produces is
/// converted into one of these and then into an HTTP response.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The gate refused the request.
    #[error(transparent)]
    Rejected(#[from] GateRejection),

    /// The request itself is malformed (bad JSON, missing fields).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The request body exceeds the branch's limit.
    #[error("Request body too large")]
    PayloadTooLarge,

    /// A helper command failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The upstream connection failed.
    #[error("Failed to connect to GitHub: {0}")]
    Upstream(#[from] reqwest::Error),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Rejected(rejection) => match rejection {
                GateRejection::MalformedPath => StatusCode::BAD_REQUEST,
                GateRejection::ForbiddenEndpoint
                | GateRejection::PolicyDenied { .. }
                | GateRejection::NoCredential { .. } => StatusCode::FORBIDDEN,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Command(command) => match command {
                CommandError::Usage(_) | CommandError::Graphql(_) => StatusCode::BAD_REQUEST,
                CommandError::Timeout => StatusCode::GATEWAY_TIMEOUT,
                CommandError::Upstream { .. } | CommandError::Http(_) => StatusCode::BAD_GATEWAY,
                CommandError::Subprocess(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error code string for clients.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Rejected(rejection) => match rejection {
                GateRejection::ForbiddenEndpoint => "endpoint_not_allowed",
                GateRejection::MalformedPath => "malformed_path",
                GateRejection::PolicyDenied { .. } => "policy_denied",
                GateRejection::NoCredential { .. } => "no_credential",
            },
            Self::BadRequest(_) => "bad_request",
            Self::PayloadTooLarge => "payload_too_large",
            Self::Command(_) => "command_failed",
            Self::Upstream(_) => "upstream_unreachable",
            Self::Internal(_) => "internal_error",
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error detail.
    pub error: ErrorDetail,
}

/// Error detail.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Stable error code.
    pub code: String,
    /// Human-readable message. Never contains credential material.
    pub message: String,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for the proxy server.
pub type ProxyResult<T> = Result<T, ProxyError>;
