//! Structured logging with tracing.
//!
//! Logs always go to stderr so that JSON reports on stdout stay parseable.

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::LoggingConfig;

/// Environment variable holding an `EnvFilter` directive, e.g. `ahkmeta=debug`.
pub const LOG_ENV: &str = "AHKMETA_LOG";

/// Initialize the global subscriber from `config`.
///
/// `AHKMETA_LOG` takes precedence over the configured level.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let level = parse_log_level(&config.level)?;
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(&config.level));

    // The layer types differ, so each format gets its own branch.
    if config.json {
        let stderr = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true);
        Registry::default().with(filter).with(stderr).try_init()?;
    } else {
        let stderr = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false);
        Registry::default().with(filter).with(stderr).try_init()?;
    }

    tracing::debug!("logging initialized with level: {}", level);
    Ok(())
}

/// Parse log level string to tracing Level.
pub fn parse_log_level(level: &str) -> anyhow::Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "invalid log level: {}. Use trace, debug, info, warn, or error",
            level
        ),
    }
}
