use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

pub type InitError = Box<dyn std::error::Error + Send + Sync>;

/// Install the global `tracing` subscriber
///
/// `RUST_LOG` takes precedence over the configured level. Logs go to stderr so
/// that `validate --format json` output on stdout stays machine-readable.
pub fn init(config: &LoggingConfig) -> Result<(), InitError> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(true)
            .json()
            .try_init(),
    }
}

