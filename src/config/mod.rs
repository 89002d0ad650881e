mod defaults;
mod types;
mod validation;

pub use defaults::*;
pub use types::*;
pub use validation::*;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level rotaconn configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file, environment, and defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        Self::load_with_source(path).map(|(config, _)| config)
    }

    /// Like [`Config::load`], also returning the file that was read, if any.
    ///
    /// Nothing is logged here; logging is configured from the result.
    pub fn load_with_source(path: Option<&str>) -> Result<(Self, Option<PathBuf>)> {
        let config_path = path.map(PathBuf::from).or_else(find_config_file);

        let (mut config, source) = match config_path {
            Some(p) if p.exists() => (load_config_file(&p)?, Some(p)),
            Some(p) if path.is_some() => {
                anyhow::bail!("Config file '{}' does not exist", p.display());
            }
            _ => (Config::default(), None),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok((config, source))
    }

    /// Write default configuration to a file.
    pub fn write_default(path: &str) -> Result<()> {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write config to '{path}'"))?;
        Ok(())
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// `lookup` is `std::env::var` in production.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let vault = &mut self.credentials.vault;

        if let Some(addr) = lookup("VAULT_ADDR") {
            vault.address = addr;
        }
        if let Some(token) = lookup("VAULT_TOKEN") {
            vault.token = Some(token);
        }
        if let Some(namespace) = lookup("VAULT_NAMESPACE") {
            vault.namespace = Some(namespace);
        }
        if let Some(engine) = lookup("VAULT_SECRET_ENGINE") {
            vault.secret_engine = engine;
        }
        if let Some(creds_type) = lookup("VAULT_CREDS_TYPE") {
            vault.creds_type = creds_type;
        }
        if let Some(role) = lookup("VAULT_CREDS_NAME") {
            vault.role = role;
        }

        if let Some(backend) = lookup("ROTACONN_CREDENTIAL_BACKEND") {
            if let Ok(backend) = backend.parse() {
                self.credentials.backend = backend;
            }
        }

        if let Some(host) = lookup("DB_HOST") {
            self.database.host = host;
        }
        if let Some(port) = lookup("DB_PORT") {
            if let Ok(port) = port.parse() {
                self.database.port = port;
            }
        }
        if let Some(name) = lookup("DB_NAME") {
            self.database.name = name;
        }

        if let Some(interval) = lookup("ROTACONN_PROBE_INTERVAL_MS") {
            if let Ok(interval) = interval.parse() {
                self.probe.interval_ms = interval;
            }
        }
    }
}

/// Find the configuration file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    let candidates = [
        PathBuf::from("rotaconn.json"),
        PathBuf::from("rotaconn.yaml"),
        PathBuf::from("rotaconn.yml"),
        PathBuf::from("rotaconn.toml"),
    ];

    for path in &candidates {
        if path.exists() {
            return Some(path.clone());
        }
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".rotaconn").join("config.json");
        if home_config.exists() {
            return Some(home_config);
        }
    }

    None
}

/// Load configuration from a file path.
pub fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;

    let config = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid YAML in '{}'", path.display()))?,
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in '{}'", path.display()))?,
        _ => json5::from_str::<Config>(&content)
            .or_else(|_| serde_json::from_str(&content))
            .with_context(|| format!("Invalid JSON in '{}'", path.display()))?,
    };

    Ok(config)
}
