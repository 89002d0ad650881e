use super::defaults::*;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Credentials Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    #[default]
    Vault,
    Env,
}

impl std::str::FromStr for CredentialBackend {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vault" => Ok(Self::Vault),
            "env" => Ok(Self::Env),
            _ => Err(format!("invalid credential backend: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsConfig {
    #[serde(default)]
    pub backend: CredentialBackend,
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub env: EnvCredentialsConfig,
}

/// Where and how to request dynamic credentials from Vault.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfig {
    #[serde(default = "default_vault_addr")]
    pub address: String,
    /// Never written back out; supply via `VAULT_TOKEN`.
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default = "default_secret_engine")]
    pub secret_engine: String,
    #[serde(default = "default_creds_type")]
    pub creds_type: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default = "default_vault_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: default_vault_addr(),
            token: None,
            namespace: None,
            secret_engine: default_secret_engine(),
            creds_type: default_creds_type(),
            role: default_role(),
            timeout_ms: default_vault_timeout_ms(),
        }
    }
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("address", &self.address)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("namespace", &self.namespace)
            .field("secret_engine", &self.secret_engine)
            .field("creds_type", &self.creds_type)
            .field("role", &self.role)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvCredentialsConfig {
    #[serde(default = "default_identity_var")]
    pub identity_var: String,
    #[serde(default = "default_secret_var")]
    pub secret_var: String,
}

impl Default for EnvCredentialsConfig {
    fn default() -> Self {
        Self {
            identity_var: default_identity_var(),
            secret_var: default_secret_var(),
        }
    }
}

// ============================================================================
// Database Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default = "default_db_name")]
    pub name: String,
    #[serde(default = "default_db_ssl_mode")]
    pub ssl_mode: String,
    #[serde(default = "default_db_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_db_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_db_host(),
            port: DEFAULT_DB_PORT,
            name: default_db_name(),
            ssl_mode: default_db_ssl_mode(),
            connect_timeout_ms: DEFAULT_DB_CONNECT_TIMEOUT_MS,
            statement_timeout_ms: DEFAULT_DB_STATEMENT_TIMEOUT_MS,
        }
    }
}

// ============================================================================
// Probe Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeConfig {
    #[serde(default = "default_probe_interval_ms")]
    pub interval_ms: u64,
    /// Stop after this many probes; run until interrupted when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u64>,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_PROBE_INTERVAL_MS,
            max_iterations: None,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    #[serde(default = "default_retry_initial_ms")]
    pub initial_ms: u64,
    #[serde(default = "default_retry_max_ms")]
    pub max_ms: u64,
    #[serde(default = "default_retry_factor")]
    pub factor: f64,
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_ms: DEFAULT_RETRY_INITIAL_MS,
            max_ms: DEFAULT_RETRY_MAX_MS,
            factor: DEFAULT_RETRY_FACTOR,
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
        }
    }
}

// ============================================================================
// Logging Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LoggingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoggingLevel::Error => "error",
            LoggingLevel::Warn => "warn",
            LoggingLevel::Info => "info",
            LoggingLevel::Debug => "debug",
            LoggingLevel::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoggingFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LoggingLevel,
    #[serde(default)]
    pub format: LoggingFormat,
}

// ============================================================================
// Default value helper functions
// ============================================================================

fn default_vault_addr() -> String {
    DEFAULT_VAULT_ADDR.to_string()
}

fn default_secret_engine() -> String {
    DEFAULT_SECRET_ENGINE.to_string()
}

fn default_creds_type() -> String {
    DEFAULT_CREDS_TYPE.to_string()
}

fn default_role() -> String {
    DEFAULT_ROLE.to_string()
}

fn default_vault_timeout_ms() -> u64 {
    DEFAULT_VAULT_TIMEOUT_MS
}

fn default_identity_var() -> String {
    DEFAULT_IDENTITY_VAR.to_string()
}

fn default_secret_var() -> String {
    DEFAULT_SECRET_VAR.to_string()
}

fn default_db_host() -> String {
    DEFAULT_DB_HOST.to_string()
}

fn default_db_port() -> u16 {
    DEFAULT_DB_PORT
}

fn default_db_name() -> String {
    DEFAULT_DB_NAME.to_string()
}

fn default_db_ssl_mode() -> String {
    DEFAULT_DB_SSL_MODE.to_string()
}

fn default_db_connect_timeout_ms() -> u64 {
    DEFAULT_DB_CONNECT_TIMEOUT_MS
}

fn default_db_statement_timeout_ms() -> u64 {
    DEFAULT_DB_STATEMENT_TIMEOUT_MS
}

fn default_probe_interval_ms() -> u64 {
    DEFAULT_PROBE_INTERVAL_MS
}

fn default_retry_initial_ms() -> u64 {
    DEFAULT_RETRY_INITIAL_MS
}

fn default_retry_max_ms() -> u64 {
    DEFAULT_RETRY_MAX_MS
}

fn default_retry_factor() -> f64 {
    DEFAULT_RETRY_FACTOR
}

fn default_retry_max_attempts() -> u32 {
    DEFAULT_RETRY_MAX_ATTEMPTS
}
