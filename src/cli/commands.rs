//! Command handlers behind the CLI.

use crate::config::{validate_config_object, Config};
use crate::database::{PgSession, PgUser, PostgresConnectionFactory, ResourceError};
use crate::driver::{Driver, ProbeSuccess, StopReason};
use crate::infra::secrets::build_source;
use crate::sessions::{ActiveSession, RotationAwareSession};
use anyhow::{bail, Context, Result};
use tracing::info;

/// What one successful probe observed.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub identity: String,
    pub redacted_secret: String,
    pub generation: u64,
    pub users: Vec<PgUser>,
}

async fn list_users_probe(session: ActiveSession<PgSession>) -> Result<ProbeOutcome, ResourceError> {
    let users = session.list_users().await?;
    Ok(ProbeOutcome {
        identity: session.credential().identity().to_string(),
        redacted_secret: session.credential().redacted_secret(),
        generation: session.generation(),
        users,
    })
}

fn print_outcome(success: ProbeSuccess<'_, ProbeOutcome>) {
    let outcome = success.value;
    if success.rotated {
        println!("\nCredentials were rotated; the session now uses a fresh lease.");
    }
    println!(
        "\n[{}] connected as {} (password {}, session #{})",
        success.iteration, outcome.identity, outcome.redacted_secret, outcome.generation
    );
    println!("Database users:");
    for user in &outcome.users {
        match user.valid_until {
            Some(ref until) => println!("  {} (valid until {until})", user.name),
            None => println!("  {}", user.name),
        }
    }
}

/// Run the probe loop until interrupted, finished, or failed.
pub async fn run_probe(config: &Config) -> Result<()> {
    validate_config_object(config)?;

    let source = build_source(&config.credentials)?;
    let factory = PostgresConnectionFactory::new(&config.database)?;
    let session = RotationAwareSession::new(source, factory);

    let mut driver = Driver::from_config(&config.probe);
    driver.abort_handle().abort_on_ctrl_c();

    info!(
        host = %config.database.host,
        port = config.database.port,
        database = %config.database.name,
        interval_ms = config.probe.interval_ms,
        "Starting probe"
    );
    let report = driver.run(&session, list_users_probe, print_outcome).await;
    session.shutdown().await;

    println!(
        "\n{} probes, {} succeeded, {} credential fetches, {} rotations",
        report.iterations, report.successes, report.stats.fetches, report.stats.rotations
    );

    match report.stop {
        StopReason::Completed | StopReason::Aborted => Ok(()),
        StopReason::Fatal(err) => bail!("{err}"),
        StopReason::RetriesExhausted(err) => bail!("gave up after repeated failures: {err}"),
    }
}

/// Fetch a single credential and print it with the secret redacted.
pub async fn fetch_once(config: &Config) -> Result<()> {
    validate_config_object(config)?;

    let source = build_source(&config.credentials)?;
    let credential = source
        .fetch()
        .await
        .with_context(|| format!("{} credential fetch failed", source.name()))?;

    println!("identity:   {}", credential.identity());
    println!("secret:     {}", credential.redacted_secret());
    if let Some(lease_id) = credential.lease_id() {
        println!("lease id:   {lease_id}");
    }
    match credential.expires_at() {
        Some(expires) => println!("expires at: {}", expires.to_rfc3339()),
        None => println!("expires at: never"),
    }
    Ok(())
}
