use clap::Parser;
use rotaconn::cli::{Cli, Commands, ConfigAction};
use rotaconn::config::{validate_config_object, Config, DEFAULT_CONFIG_FILE};
use rotaconn::logging;
use std::path::Path;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Probe(opts) => {
            let (mut config, source) = Config::load_with_source(opts.config.as_deref())?;
            opts.apply(&mut config);
            logging::init(&config.logging);
            log_config_source(source.as_deref());
            rotaconn::cli::run_probe(&config).await?;
        }
        Commands::Fetch(opts) => {
            let (mut config, source) = Config::load_with_source(opts.config.as_deref())?;
            opts.vault.apply(&mut config);
            logging::init(&config.logging);
            log_config_source(source.as_deref());
            rotaconn::cli::fetch_once(&config).await?;
        }
        Commands::Config(opts) => {
            if let ConfigAction::Init = opts.action {
                let path = opts.config.as_deref().unwrap_or(DEFAULT_CONFIG_FILE);
                Config::write_default(path)?;
                println!("Configuration file created at {path}");
                return Ok(());
            }

            let (config, source) = Config::load_with_source(opts.config.as_deref())?;
            logging::init(&config.logging);
            log_config_source(source.as_deref());
            match opts.action {
                ConfigAction::Show => {
                    println!("{}", serde_json::to_string_pretty(&config)?);
                }
                ConfigAction::Validate => {
                    validate_config_object(&config)?;
                    info!("Configuration is valid");
                }
                ConfigAction::Init => {}
            }
        }
        Commands::Version => {
            println!("rotaconn {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn log_config_source(source: Option<&Path>) {
    match source {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => info!("No config file found, using defaults"),
    }
}
