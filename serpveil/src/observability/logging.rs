//! Tracing subscriber setup.

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::errors::{Result, SerpveilError};

/// Parses the configured filter directive.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    EnvFilter::try_new(&config.filter)
        .map_err(|e| SerpveilError::Logging(format!("invalid filter '{}': {e}", config.filter)))
}

/// Installs the global `tracing` subscriber, writing through `writer`.
///
/// Fails if the filter is invalid or a global subscriber is already set.
pub fn init_logging<W>(config: &LoggingConfig, writer: W) -> Result<()>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let builder = tracing_subscriber::fmt()
        .with_env_filter(build_filter(config)?)
        .with_writer(writer);
    let installed = match (config.json, config.timestamps) {
        (true, true) => builder.json().try_init(),
        (true, false) => builder.json().without_time().try_init(),
        (false, true) => builder.try_init(),
        (false, false) => builder.without_time().try_init(),
    };
    installed.map_err(|e| SerpveilError::Logging(e.to_string()))
}

/// [`init_logging`] to standard error.
pub fn init_stderr_logging(config: &LoggingConfig) -> Result<()> {
    init_logging(config, std::io::stderr)
}
