//! Shared server state: the gate's immutable tables plus the upstream HTTP
//! client.

use std::time::Duration;

use forgegate_policy::{Gate, ProxyConfig};

use crate::error::ProxyError;

/// Upstream request timeout.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);

/// Application state. Built once at startup; read-only afterwards, so it can
/// be shared across request tasks without locks.
#[derive(Debug)]
pub struct AppState {
    /// The policy gate.
    pub gate: Gate,

    /// The validated proxy config (the auth-status endpoint reports on its
    /// credential entries).
    pub config: ProxyConfig,

    /// Upstream HTTP client, connection-pooled across requests.
    pub http: reqwest::Client,
}

impl AppState {
    /// Build the state from a validated config.
    pub fn new(config: ProxyConfig) -> Result<Self, ProxyError> {
        let gate = Gate::from_config(&config)
            .map_err(|error| ProxyError::Internal(error.to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()
            .map_err(ProxyError::Upstream)?;

        Ok(Self { gate, config, http })
    }
}
