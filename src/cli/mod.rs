mod commands;

pub use commands::{fetch_once, run_probe, ProbeOutcome};

use crate::config::Config;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "rotaconn",
    version,
    about = "Keep a database session alive across Vault credential rotation"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe the database on an interval, rotating credentials on rejection.
    Probe(ProbeOpts),
    /// Fetch one credential and print it (secret redacted).
    Fetch(FetchOpts),
    Config(ConfigOpts),
    Version,
}

/// Overrides for the Vault lease path.
#[derive(clap::Args, Debug, Default)]
pub struct VaultPathOpts {
    /// Secrets engine mount (default: database)
    #[arg(long)]
    pub engine: Option<String>,
    /// Credential type path segment (default: creds)
    #[arg(long)]
    pub creds_type: Option<String>,
    /// Role name (default: postgresql-role)
    #[arg(long)]
    pub role: Option<String>,
}

impl VaultPathOpts {
    pub fn apply(&self, config: &mut Config) {
        let vault = &mut config.credentials.vault;
        if let Some(ref engine) = self.engine {
            vault.secret_engine = engine.clone();
        }
        if let Some(ref creds_type) = self.creds_type {
            vault.creds_type = creds_type.clone();
        }
        if let Some(ref role) = self.role {
            vault.role = role.clone();
        }
    }
}

#[derive(clap::Args)]
pub struct ProbeOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    #[command(flatten)]
    pub vault: VaultPathOpts,
    /// Stop after this many probes
    #[arg(short = 'n', long)]
    pub iterations: Option<u64>,
    /// Delay between probes in milliseconds
    #[arg(short, long)]
    pub interval_ms: Option<u64>,
}

impl ProbeOpts {
    pub fn apply(&self, config: &mut Config) {
        self.vault.apply(config);
        if self.iterations.is_some() {
            config.probe.max_iterations = self.iterations;
        }
        if let Some(interval) = self.interval_ms {
            config.probe.interval_ms = interval;
        }
    }
}

#[derive(clap::Args)]
pub struct FetchOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    #[command(flatten)]
    pub vault: VaultPathOpts,
}

#[derive(clap::Args)]
pub struct ConfigOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    Show,
    Validate,
    Init,
}
