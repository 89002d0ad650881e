//! Environment variable credential provider.
//!
//! Reads the identity and secret from two environment variables on every
//! fetch, so an external process that rewrites them (and restarts nothing)
//! is picked up on the next rotation.

use super::types::{Credential, CredentialSource, FetchError};
use async_trait::async_trait;

/// Issues credentials from the process environment.
pub struct EnvCredentialSource {
    identity_var: String,
    secret_var: String,
}

impl EnvCredentialSource {
    pub fn new(identity_var: impl Into<String>, secret_var: impl Into<String>) -> Self {
        Self {
            identity_var: identity_var.into(),
            secret_var: secret_var.into(),
        }
    }

    fn read(&self, key: &str) -> Result<String, FetchError> {
        match std::env::var(key) {
            Ok(value) if !value.is_empty() => Ok(value),
            Ok(_) => Err(FetchError::MalformedResponse(format!(
                "Environment variable '{key}' is set but empty"
            ))),
            Err(_) => Err(FetchError::InvalidPath(format!(
                "Environment variable '{key}' is not set"
            ))),
        }
    }
}

#[async_trait]
impl CredentialSource for EnvCredentialSource {
    fn name(&self) -> &str {
        "env"
    }

    async fn fetch(&self) -> Result<Credential, FetchError> {
        let identity = self.read(&self.identity_var)?;
        let secret = self.read(&self.secret_var)?;
        Ok(Credential::new(identity, secret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_reads_both_vars() {
        std::env::set_var("ROTACONN_TEST_ENV_USER_1", "app_a");
        std::env::set_var("ROTACONN_TEST_ENV_PASS_1", "p1");
        let source = EnvCredentialSource::new("ROTACONN_TEST_ENV_USER_1", "ROTACONN_TEST_ENV_PASS_1");
        let credential = source.fetch().await.unwrap();
        assert_eq!(credential.identity(), "app_a");
        assert_eq!(credential.secret(), "p1");
    }

    #[tokio::test]
    async fn missing_var_is_invalid_path() {
        let source = EnvCredentialSource::new(
            "ROTACONN_DEFINITELY_DOES_NOT_EXIST_XYZ",
            "ROTACONN_DEFINITELY_DOES_NOT_EXIST_XYZ",
        );
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidPath(_)));
        assert!(err.to_string().contains("not set"));
    }

    #[tokio::test]
    async fn empty_var_is_malformed() {
        std::env::set_var("ROTACONN_TEST_ENV_USER_2", "app_a");
        std::env::set_var("ROTACONN_TEST_ENV_PASS_2", "");
        let source = EnvCredentialSource::new("ROTACONN_TEST_ENV_USER_2", "ROTACONN_TEST_ENV_PASS_2");
        assert!(matches!(
            source.fetch().await,
            Err(FetchError::MalformedResponse(_))
        ));
    }
}
