//! PostgreSQL failure classification.
//!
//! Structured SQLSTATE codes are consulted first. Message text is only
//! matched when no code is available, and only against the explicit tables
//! below. Anything unmatched is [`ResourceError::Other`]; it is never guessed
//! to be an authentication failure.
//!
//! | signal                                              | class          |
//! |-----------------------------------------------------|----------------|
//! | `28P01` invalid_password                            | `AuthRejected` |
//! | `28000` invalid_authorization_specification         | `AuthRejected` |
//! | class `08` connection exception                     | `Unreachable`  |
//! | `57P01`, `57P02`, `57P03` shutdown / starting up    | `Unreachable`  |
//! | `53300` too_many_connections                        | `Unreachable`  |
//! | any other code                                      | `Other`        |
//! | [`AUTH_REJECTED_MARKERS`] or `role "…" does not exist` | `AuthRejected` |
//! | [`UNREACHABLE_MARKERS`]                              | `Unreachable`  |
//! | driver I/O, TLS, pool timeout, worker crash         | `Unreachable`  |
//!
//! `28000` also covers `no pg_hba.conf entry for host …`, which refuses the
//! client address rather than the identity/secret pair. It is still
//! `AuthRejected`: such a failure costs one extra fetch and then surfaces as
//! `RotationExhausted`, never a rotation loop.

use super::ResourceError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Message fragments (lowercase) that mean the credential was refused.
pub const AUTH_REJECTED_MARKERS: &[&str] = &["password authentication failed"];

/// Message fragments (lowercase) that mean the server could not be reached.
pub const UNREACHABLE_MARKERS: &[&str] = &[
    "connection refused",
    "connection reset",
    "timed out",
    "could not connect to server",
    "the database system is shutting down",
    "broken pipe",
];

static ROLE_MISSING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"role "[^"]*" does not exist"#).expect("role pattern is a valid regex")
});

/// Classify a SQLSTATE code.
pub fn classify_sqlstate(code: &str, message: impl Into<String>) -> ResourceError {
    let message = message.into();
    match code {
        "28P01" | "28000" => ResourceError::AuthRejected(message),
        "57P01" | "57P02" | "57P03" | "53300" => ResourceError::Unreachable(message),
        c if c.starts_with("08") => ResourceError::Unreachable(message),
        _ => ResourceError::Other(message),
    }
}

/// Classify free text when no structured code is available.
pub fn classify_message(message: impl Into<String>) -> ResourceError {
    let message = message.into();
    let lower = message.to_lowercase();

    if AUTH_REJECTED_MARKERS.iter().any(|m| lower.contains(m)) || ROLE_MISSING.is_match(&lower) {
        return ResourceError::AuthRejected(message);
    }
    if UNREACHABLE_MARKERS.iter().any(|m| lower.contains(m)) {
        return ResourceError::Unreachable(message);
    }
    ResourceError::Other(message)
}

/// Classify an error from the sqlx driver.
pub fn classify_sqlx_error(err: &sqlx::Error) -> ResourceError {
    match err {
        sqlx::Error::Database(db) => match db.code() {
            Some(code) => {
                classify_sqlstate(&code, format!("{} (SQLSTATE {code})", db.message()))
            }
            None => classify_message(db.message()),
        },
        sqlx::Error::Io(e) => ResourceError::Unreachable(format!("I/O error: {e}")),
        sqlx::Error::Tls(e) => ResourceError::Unreachable(format!("TLS error: {e}")),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
            ResourceError::Unreachable(err.to_string())
        }
        sqlx::Error::Protocol(msg) => classify_message(msg.clone()),
        other => ResourceError::Other(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_codes_are_rejections() {
        assert!(matches!(
            classify_sqlstate("28P01", "password authentication failed for user \"v-app-a\""),
            ResourceError::AuthRejected(_)
        ));
        assert!(matches!(
            classify_sqlstate("28000", "role \"v-app-a\" does not exist"),
            ResourceError::AuthRejected(_)
        ));
    }

    #[test]
    fn host_based_refusal_is_a_rejection() {
        let err = classify_sqlstate(
            "28000",
            "no pg_hba.conf entry for host \"10.0.0.7\", user \"v-app-a\", database \"postgres\"",
        );
        assert!(matches!(err, ResourceError::AuthRejected(_)));
    }

    #[test]
    fn connection_codes_are_unreachable() {
        for code in ["08001", "08006", "57P01", "57P03", "53300"] {
            assert!(
                matches!(classify_sqlstate(code, "x"), ResourceError::Unreachable(_)),
                "{code}"
            );
        }
    }

    #[test]
    fn permission_denied_is_other() {
        let err = classify_sqlstate("42501", "permission denied for table pg_authid");
        assert_eq!(
            err,
            ResourceError::Other("permission denied for table pg_authid".into())
        );
    }

    #[test]
    fn code_wins_over_text() {
        // Text mentions authentication but the code says syntax error.
        let err = classify_sqlstate("42601", "syntax error near \"password authentication failed\"");
        assert!(matches!(err, ResourceError::Other(_)));
    }

    #[test]
    fn text_markers() {
        assert!(matches!(
            classify_message("FATAL: password authentication failed for user \"app\""),
            ResourceError::AuthRejected(_)
        ));
        assert!(matches!(
            classify_message("FATAL: role \"v-token-postgres-1a2b\" does not exist"),
            ResourceError::AuthRejected(_)
        ));
        assert!(matches!(
            classify_message("could not connect to server: Connection refused"),
            ResourceError::Unreachable(_)
        ));
    }

    #[test]
    fn unmatched_text_is_other() {
        assert!(matches!(
            classify_message("authentication method 10 not supported"),
            ResourceError::Other(_)
        ));
        assert!(matches!(
            classify_message("relation \"users\" does not exist"),
            ResourceError::Other(_)
        ));
    }

    #[test]
    fn driver_errors() {
        let io = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert!(matches!(classify_sqlx_error(&io), ResourceError::Unreachable(_)));
        assert!(matches!(
            classify_sqlx_error(&sqlx::Error::PoolTimedOut),
            ResourceError::Unreachable(_)
        ));
        assert!(matches!(
            classify_sqlx_error(&sqlx::Error::RowNotFound),
            ResourceError::Other(_)
        ));
        assert!(matches!(
            classify_sqlx_error(&sqlx::Error::Protocol("password authentication failed".into())),
            ResourceError::AuthRejected(_)
        ));
    }
}
