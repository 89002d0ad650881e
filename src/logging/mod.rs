use crate::config::{LoggingConfig, LoggingFormat};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "rotaconn={level},sqlx=warn",
            level = config.level.as_str()
        ))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = match config.format {
        LoggingFormat::Json => builder.json().try_init(),
        LoggingFormat::Pretty => builder.with_target(false).try_init(),
    };
}
