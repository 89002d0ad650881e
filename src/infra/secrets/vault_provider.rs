//! HashiCorp Vault dynamic credential provider.
//!
//! Reads `GET {address}/v1/{engine}/{creds_type}/{role}` and maps the
//! `data.username` / `data.password` pair to a [`Credential`]. Status codes
//! are mapped as follows:
//!
//! | status            | error                |
//! |-------------------|----------------------|
//! | 200               | ok (or malformed)    |
//! | 400, 404          | `InvalidPath`        |
//! | 401, 403          | `Forbidden`          |
//! | 408, 429, 5xx     | `BackendUnreachable` |
//! | anything else     | `MalformedResponse`  |

use super::types::{Credential, CredentialSource, FetchError};
use crate::config::VaultConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// Issues database credentials from a Vault secrets engine.
pub struct VaultCredentialSource {
    client: reqwest::Client,
    url: String,
    token: String,
    namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LeaseResponse {
    #[serde(default)]
    lease_id: Option<String>,
    #[serde(default)]
    lease_duration: i64,
    data: Option<LeaseData>,
}

#[derive(Debug, Deserialize)]
struct LeaseData {
    username: Option<String>,
    password: Option<String>,
}

impl VaultCredentialSource {
    pub fn new(config: &VaultConfig) -> Result<Self> {
        let token = config
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .context("Vault token is not configured (set VAULT_TOKEN)")?;

        let timeout = Duration::from_millis(config.timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .context("Failed to build Vault HTTP client")?;

        Ok(Self {
            client,
            url: credential_url(config),
            token,
            namespace: config.namespace.clone().filter(|ns| !ns.is_empty()),
        })
    }
}

/// Build `{address}/v1/{engine}/{creds_type}/{role}` without doubled slashes.
pub fn credential_url(config: &VaultConfig) -> String {
    format!(
        "{}/v1/{}/{}/{}",
        config.address.trim_end_matches('/'),
        config.secret_engine.trim_matches('/'),
        config.creds_type.trim_matches('/'),
        config.role.trim_matches('/'),
    )
}

#[async_trait]
impl CredentialSource for VaultCredentialSource {
    fn name(&self) -> &str {
        "vault"
    }

    async fn fetch(&self) -> Result<Credential, FetchError> {
        debug!(url = %self.url, "Requesting credentials from Vault");

        let mut request = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(TOKEN_HEADER, &self.token);
        if let Some(ref namespace) = self.namespace {
            request = request.header(NAMESPACE_HEADER, namespace);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::BackendUnreachable(format!("request to {} timed out", self.url))
            } else {
                FetchError::BackendUnreachable(format!("request to {} failed: {e}", self.url))
            }
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body.trim()));
        }

        let lease: LeaseResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::BackendUnreachable("timed out reading Vault response".into())
            } else {
                FetchError::MalformedResponse(format!("response body is not a lease: {e}"))
            }
        })?;

        let data = lease
            .data
            .ok_or_else(|| FetchError::MalformedResponse("response has no `data` object".into()))?;
        let username = data
            .username
            .filter(|u| !u.is_empty())
            .ok_or_else(|| FetchError::MalformedResponse("`data.username` is missing".into()))?;
        let password = data
            .password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| FetchError::MalformedResponse("`data.password` is missing".into()))?;

        let lease_duration = lease.lease_duration;
        let out_of_range = || {
            FetchError::MalformedResponse(format!("`lease_duration` {lease_duration} is out of range"))
        };
        let ttl = chrono::Duration::try_seconds(lease_duration).ok_or_else(out_of_range)?;
        Credential::new(username, password)
            .with_lease(lease.lease_id, ttl)
            .ok_or_else(out_of_range)
    }
}

fn status_error(status: StatusCode, body: &str) -> FetchError {
    let detail = if body.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {body}")
    };

    match status.as_u16() {
        400 | 404 => FetchError::InvalidPath(format!(
            "the secret engine path or role name is invalid ({detail})"
        )),
        401 | 403 => FetchError::Forbidden(format!(
            "the token is invalid or lacks the required policy ({detail})"
        )),
        408 | 429 => FetchError::BackendUnreachable(detail),
        s if (500..600).contains(&s) => FetchError::BackendUnreachable(detail),
        _ => FetchError::MalformedResponse(format!("unexpected status ({detail})")),
    }
}
