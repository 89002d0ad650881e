use crate::database::ResourceError;
use crate::infra::secrets::FetchError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// How a failure should be acted upon. Computed per error, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClassification {
    /// The credential was refused; rotate.
    AuthStale,
    /// Worth retrying later; do not rotate.
    Transient,
    /// Stop.
    Fatal,
}

/// The originating class of a failure surfaced by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidConfiguration,
    Forbidden,
    BackendUnreachable,
    MalformedBackendResponse,
    AuthRejected,
    ResourceUnreachable,
    Other,
    RotationExhausted,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidConfiguration => "invalid_configuration",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::BackendUnreachable => "backend_unreachable",
            ErrorKind::MalformedBackendResponse => "malformed_backend_response",
            ErrorKind::AuthRejected => "auth_rejected",
            ErrorKind::ResourceUnreachable => "resource_unreachable",
            ErrorKind::Other => "other",
            ErrorKind::RotationExhausted => "rotation_exhausted",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a failed [`execute`](super::RotationAwareSession::execute).
///
/// Every variant carries the originating classification and the cause text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecuteError {
    /// The backend or resource could not be reached. The caller decides
    /// whether and when to try again.
    #[error("retriable {kind} failure: {message}")]
    RetriableResource { kind: ErrorKind, message: String },

    /// Not recoverable by retrying or rotating.
    #[error("fatal {kind} failure: {message}")]
    FatalOperation { kind: ErrorKind, message: String },

    /// The resource rejected the freshly rotated credential too.
    #[error("authentication rotation failed: {message}")]
    AuthenticationRotationFailed { message: String },
}

impl ExecuteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecuteError::RetriableResource { kind, .. } | ExecuteError::FatalOperation { kind, .. } => *kind,
            ExecuteError::AuthenticationRotationFailed { .. } => ErrorKind::RotationExhausted,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ExecuteError::RetriableResource { message, .. }
            | ExecuteError::FatalOperation { message, .. }
            | ExecuteError::AuthenticationRotationFailed { message } => message,
        }
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, ExecuteError::RetriableResource { .. })
    }

    pub(crate) fn exhausted(first: &str, second: &str) -> Self {
        ExecuteError::AuthenticationRotationFailed {
            message: format!("rejected before rotation ({first}) and after rotation ({second})"),
        }
    }
}

impl From<FetchError> for ExecuteError {
    fn from(err: FetchError) -> Self {
        let kind = err.kind();
        let message = err.detail().to_string();
        match err.classification() {
            FailureClassification::Transient => ExecuteError::RetriableResource { kind, message },
            _ => ExecuteError::FatalOperation { kind, message },
        }
    }
}

/// Only for unreachable/other failures; authentication rejections are
/// handled by rotation before they can surface.
impl From<ResourceError> for ExecuteError {
    fn from(err: ResourceError) -> Self {
        let kind = err.kind();
        let message = err.detail().to_string();
        match err.classification() {
            FailureClassification::Transient => ExecuteError::RetriableResource { kind, message },
            _ => ExecuteError::FatalOperation { kind, message },
        }
    }
}
