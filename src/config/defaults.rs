//! Default configuration constants used across the system.

/// Default Vault address.
pub const DEFAULT_VAULT_ADDR: &str = "http://127.0.0.1:8200";

/// Default Vault secrets engine mount.
pub const DEFAULT_SECRET_ENGINE: &str = "database";

/// Default Vault credential type path segment.
pub const DEFAULT_CREDS_TYPE: &str = "creds";

/// Default Vault role name.
pub const DEFAULT_ROLE: &str = "postgresql-role";

/// Default Vault request timeout.
pub const DEFAULT_VAULT_TIMEOUT_MS: u64 = 10_000;

/// Default database host.
pub const DEFAULT_DB_HOST: &str = "localhost";

/// Default database port.
pub const DEFAULT_DB_PORT: u16 = 5432;

/// Default database name.
pub const DEFAULT_DB_NAME: &str = "postgres";

/// Default PostgreSQL sslmode.
pub const DEFAULT_DB_SSL_MODE: &str = "prefer";

/// Default database connect timeout.
pub const DEFAULT_DB_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Default per-statement timeout.
pub const DEFAULT_DB_STATEMENT_TIMEOUT_MS: u64 = 30_000;

/// Default env vars for the `env` credential backend.
pub const DEFAULT_IDENTITY_VAR: &str = "ROTACONN_DB_USER";
pub const DEFAULT_SECRET_VAR: &str = "ROTACONN_DB_PASSWORD";

/// Default delay between probes.
pub const DEFAULT_PROBE_INTERVAL_MS: u64 = 2000;

/// Default retry backoff initial delay.
pub const DEFAULT_RETRY_INITIAL_MS: u64 = 1000;

/// Default retry backoff max delay.
pub const DEFAULT_RETRY_MAX_MS: u64 = 30_000;

/// Default retry backoff factor.
pub const DEFAULT_RETRY_FACTOR: f64 = 2.0;

/// Default number of consecutive retriable failures before giving up.
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 5;

/// Default config file name.
pub const DEFAULT_CONFIG_FILE: &str = "rotaconn.json";
