use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::{Error, Result};

/// Initialize structured logging based on configuration
///
/// Console output goes to stderr so stdout only carries verdicts. Supports
/// `json`, `pretty` and `compact` formats with an optional log file.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let log_level = parse_log_level(&config.level)?;

    // RUST_LOG wins over the configured level
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let file = match &config.file_path {
        Some(path) => Some(Arc::new(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?,
        )),
        None => None,
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match (config.format.as_str(), file) {
        ("json", Some(file)) => registry
            .with(fmt::layer().json().with_current_span(true).with_writer(file))
            .try_init(),
        ("json", None) => registry
            .with(fmt::layer().json().with_current_span(true).with_writer(std::io::stderr))
            .try_init(),
        ("pretty", Some(file)) => registry
            .with(fmt::layer().pretty().with_ansi(false).with_writer(file))
            .try_init(),
        ("pretty", None) => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
        (_, Some(file)) => registry
            .with(fmt::layer().compact().with_ansi(false).with_writer(file))
            .try_init(),
        (_, None) => registry
            .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
            .try_init(),
    };

    result.map_err(|e| Error::Logging(e.to_string()))
}

/// Parse log level string to tracing Level
fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(Error::InvalidInput(format!("Invalid log level: {level}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert!(parse_log_level("trace").is_ok());
        assert!(parse_log_level("debug").is_ok());
        assert!(parse_log_level("INFO").is_ok());
        assert!(parse_log_level("warning").is_ok());
        assert!(parse_log_level("error").is_ok());
        assert!(parse_log_level("invalid").is_err());
    }

    #[test]
    fn test_init_rejects_bad_level() {
        let config = LoggingConfig {
            level: "loud".to_string(),
            ..LoggingConfig::default()
        };
        assert!(matches!(init_logging(&config), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_second_init_is_a_logging_error() {
        let config = LoggingConfig::default();
        // The first call may lose to a subscriber installed elsewhere; the
        // second one always finds one in place.
        let _ = init_logging(&config);

        assert!(matches!(init_logging(&config), Err(Error::Logging(_))));
    }
}
