use super::types::CredentialBackend;
use super::Config;
use anyhow::Result;
use url::Url;

/// Accepted PostgreSQL `sslmode` values.
const SSL_MODES: &[&str] = &["disable", "allow", "prefer", "require", "verify-ca", "verify-full"];

/// Upper bound for any network timeout.
const MAX_TIMEOUT_MS: u64 = 5 * 60_000;

/// Validation errors for configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

fn push(errors: &mut Vec<ConfigValidationError>, path: &str, message: impl Into<String>) {
    errors.push(ConfigValidationError {
        path: path.to_string(),
        message: message.into(),
    });
}

fn check_timeout(errors: &mut Vec<ConfigValidationError>, path: &str, value: u64) {
    if value == 0 || value > MAX_TIMEOUT_MS {
        push(
            errors,
            path,
            format!("Timeout must be between 1 and {MAX_TIMEOUT_MS} ms"),
        );
    }
}

/// Validate a configuration object.
pub fn validate_config(config: &Config) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();

    match config.credentials.backend {
        CredentialBackend::Vault => {
            let vault = &config.credentials.vault;
            match Url::parse(&vault.address) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                Ok(url) => push(
                    &mut errors,
                    "credentials.vault.address",
                    format!("Unsupported scheme '{}'", url.scheme()),
                ),
                Err(e) => push(
                    &mut errors,
                    "credentials.vault.address",
                    format!("Invalid URL: {e}"),
                ),
            }

            if vault.token.as_deref().map_or(true, str::is_empty) {
                push(
                    &mut errors,
                    "credentials.vault.token",
                    "Vault token is required (set VAULT_TOKEN)",
                );
            }

            for (path, value) in [
                ("credentials.vault.secretEngine", &vault.secret_engine),
                ("credentials.vault.credsType", &vault.creds_type),
                ("credentials.vault.role", &vault.role),
            ] {
                if value.trim_matches('/').is_empty() {
                    push(&mut errors, path, "Path segment must not be empty");
                }
            }

            check_timeout(&mut errors, "credentials.vault.timeoutMs", vault.timeout_ms);
        }
        CredentialBackend::Env => {
            let env = &config.credentials.env;
            if env.identity_var.is_empty() {
                push(&mut errors, "credentials.env.identityVar", "Variable name is required");
            }
            if env.secret_var.is_empty() {
                push(&mut errors, "credentials.env.secretVar", "Variable name is required");
            }
        }
    }

    let db = &config.database;
    if db.host.is_empty() {
        push(&mut errors, "database.host", "Host is required");
    }
    if db.port == 0 {
        push(&mut errors, "database.port", "Port must be greater than 0");
    }
    if db.name.is_empty() {
        push(&mut errors, "database.name", "Database name is required");
    }
    if !SSL_MODES.contains(&db.ssl_mode.as_str()) {
        push(
            &mut errors,
            "database.sslMode",
            format!("Must be one of {}", SSL_MODES.join(", ")),
        );
    }
    check_timeout(&mut errors, "database.connectTimeoutMs", db.connect_timeout_ms);
    check_timeout(&mut errors, "database.statementTimeoutMs", db.statement_timeout_ms);

    let probe = &config.probe;
    if probe.interval_ms == 0 {
        push(&mut errors, "probe.intervalMs", "Interval must be greater than 0");
    }
    if probe.max_iterations == Some(0) {
        push(&mut errors, "probe.maxIterations", "Must be at least 1 when set");
    }
    if probe.retry.factor.is_nan() || probe.retry.factor < 1.0 {
        push(&mut errors, "probe.retry.factor", "Factor must be at least 1.0");
    }
    if probe.retry.max_ms < probe.retry.initial_ms {
        push(
            &mut errors,
            "probe.retry.maxMs",
            "Max delay must not be below the initial delay",
        );
    }

    errors
}

/// Validate configuration and return Result.
pub fn validate_config_object(config: &Config) -> Result<()> {
    let errors = validate_config(config);
    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow::bail!("Configuration validation failed:\n{}", messages.join("\n"));
    }
}
