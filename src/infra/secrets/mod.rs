//! Credential retrieval.
//!
//! A [`CredentialSource`] issues identity/secret pairs on demand. The Vault
//! provider reads dynamic database credentials; the env provider reads a
//! fixed pair from the process environment.

pub mod env_provider;
pub mod types;
pub mod vault_provider;

pub use env_provider::EnvCredentialSource;
pub use types::{redact_secret, Credential, CredentialSource, FetchError};
pub use vault_provider::VaultCredentialSource;

use crate::config::{CredentialBackend, CredentialsConfig};
use anyhow::Result;
use std::sync::Arc;

/// Build the credential source selected in configuration.
pub fn build_source(config: &CredentialsConfig) -> Result<Arc<dyn CredentialSource>> {
    let source: Arc<dyn CredentialSource> = match config.backend {
        CredentialBackend::Vault => Arc::new(VaultCredentialSource::new(&config.vault)?),
        CredentialBackend::Env => Arc::new(EnvCredentialSource::new(
            config.env.identity_var.clone(),
            config.env.secret_var.clone(),
        )),
    };
    Ok(source)
}
