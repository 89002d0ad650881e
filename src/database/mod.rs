//! The protected resource: sessions, the factory that opens them, and the
//! classification of their failures.

pub mod classify;
pub mod postgres;

pub use classify::{classify_message, classify_sqlstate};
pub use postgres::{PgSession, PgUser, PostgresConnectionFactory};

use crate::infra::secrets::Credential;
use crate::sessions::{ErrorKind, FailureClassification};
use async_trait::async_trait;
use thiserror::Error;

// ============================================================================
// Resource errors
// ============================================================================

/// A classified failure from opening or using a session.
///
/// The rotation core only ever sees these three variants, never raw driver
/// errors or message text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// The resource refused the identity/secret pair.
    #[error("authentication rejected: {0}")]
    AuthRejected(String),
    /// The resource could not be reached or stopped answering.
    #[error("resource unreachable: {0}")]
    Unreachable(String),
    /// Anything else: bad query, missing privilege, protocol error.
    #[error("{0}")]
    Other(String),
}

impl ResourceError {
    pub fn classification(&self) -> FailureClassification {
        match self {
            ResourceError::AuthRejected(_) => FailureClassification::AuthStale,
            ResourceError::Unreachable(_) => FailureClassification::Transient,
            ResourceError::Other(_) => FailureClassification::Fatal,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ResourceError::AuthRejected(_) => ErrorKind::AuthRejected,
            ResourceError::Unreachable(_) => ErrorKind::ResourceUnreachable,
            ResourceError::Other(_) => ErrorKind::Other,
        }
    }

    /// Cause text without the classification prefix.
    pub fn detail(&self) -> &str {
        match self {
            ResourceError::AuthRejected(m) | ResourceError::Unreachable(m) | ResourceError::Other(m) => m,
        }
    }
}

// ============================================================================
// Session / factory traits
// ============================================================================

/// An open connection to the protected resource.
#[async_trait]
pub trait Session: Send + Sync + 'static {
    /// Whether the session can still carry work.
    ///
    /// A session that reports `false` is closed and replaced with the held
    /// credential before the next operation.
    fn is_healthy(&self) -> bool {
        true
    }

    /// Close the session. Must not fail; errors are logged by the implementation.
    async fn close(&self);
}

/// Opens sessions against the protected resource.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    type Session: Session;

    /// Open a session authenticated with `credential`.
    async fn open(&self, credential: &Credential) -> Result<Self::Session, ResourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_error_classification() {
        let auth = ResourceError::AuthRejected("password authentication failed".into());
        assert_eq!(auth.classification(), FailureClassification::AuthStale);
        assert_eq!(auth.kind(), ErrorKind::AuthRejected);
        assert_eq!(auth.detail(), "password authentication failed");

        let down = ResourceError::Unreachable("connection refused".into());
        assert_eq!(down.classification(), FailureClassification::Transient);
        assert_eq!(down.kind(), ErrorKind::ResourceUnreachable);

        let other = ResourceError::Other("permission denied for table pg_authid".into());
        assert_eq!(other.classification(), FailureClassification::Fatal);
        assert_eq!(other.to_string(), "permission denied for table pg_authid");
    }
}
