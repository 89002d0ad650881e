//! Core types for credential retrieval.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use thiserror::Error;

use crate::sessions::{ErrorKind, FailureClassification};

// ============================================================================
// Credential
// ============================================================================

/// An identity/secret pair issued by a credential backend.
///
/// Immutable once issued. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    identity: String,
    secret: String,
    fetched_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    lease_id: Option<String>,
}

impl Credential {
    /// Create a credential fetched now, with no known expiry.
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
            fetched_at: Utc::now(),
            expires_at: None,
            lease_id: None,
        }
    }

    /// Attach a lease that expires `lease_duration` after the fetch time.
    ///
    /// A zero or negative duration means the backend reported no expiry.
    /// Returns `None` when the expiry falls outside the representable range.
    pub fn with_lease(mut self, lease_id: Option<String>, lease_duration: Duration) -> Option<Self> {
        self.lease_id = lease_id.filter(|id| !id.is_empty());
        self.expires_at = if lease_duration > Duration::zero() {
            Some(self.fetched_at.checked_add_signed(lease_duration)?)
        } else {
            None
        };
        Some(self)
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The raw secret. Never log this.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn lease_id(&self) -> Option<&str> {
        self.lease_id.as_deref()
    }

    /// Whether the lease has passed its expiry at `now`.
    ///
    /// Informational only: rotation is driven by rejection, not by expiry.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| now >= expires)
    }

    /// The secret in display-safe form.
    pub fn redacted_secret(&self) -> String {
        redact_secret(&self.secret)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("identity", &self.identity)
            .field("secret", &"[REDACTED]")
            .field("fetched_at", &self.fetched_at)
            .field("expires_at", &self.expires_at)
            .field("lease_id", &self.lease_id)
            .finish()
    }
}

// ============================================================================
// Fetch errors
// ============================================================================

/// Failure to obtain a credential from the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The configured engine/role path does not resolve.
    #[error("credential path is invalid: {0}")]
    InvalidPath(String),
    /// The backend token is invalid or lacks permission.
    #[error("access to the credential backend was denied: {0}")]
    Forbidden(String),
    /// Network failure, timeout, or server-side error.
    #[error("credential backend is unreachable: {0}")]
    BackendUnreachable(String),
    /// The backend answered but not with a usable credential.
    #[error("credential backend returned a malformed response: {0}")]
    MalformedResponse(String),
}

impl FetchError {
    /// Only an unreachable backend is worth retrying.
    pub fn classification(&self) -> FailureClassification {
        match self {
            FetchError::BackendUnreachable(_) => FailureClassification::Transient,
            _ => FailureClassification::Fatal,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::InvalidPath(_) => ErrorKind::InvalidConfiguration,
            FetchError::Forbidden(_) => ErrorKind::Forbidden,
            FetchError::BackendUnreachable(_) => ErrorKind::BackendUnreachable,
            FetchError::MalformedResponse(_) => ErrorKind::MalformedBackendResponse,
        }
    }

    /// Cause text without the classification prefix.
    pub fn detail(&self) -> &str {
        match self {
            FetchError::InvalidPath(m)
            | FetchError::Forbidden(m)
            | FetchError::BackendUnreachable(m)
            | FetchError::MalformedResponse(m) => m,
        }
    }
}

// ============================================================================
// Source trait
// ============================================================================

/// A backend that issues credentials on demand.
///
/// Implementations must bound every network call with a timeout.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Display name for logging.
    fn name(&self) -> &str;

    /// Fetch a fresh credential.
    async fn fetch(&self) -> Result<Credential, FetchError>;
}

/// Redact a secret value for display (show first 2 and last 2 chars).
pub fn redact_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 6 {
        return "***".to_string();
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}…{tail}")
}
