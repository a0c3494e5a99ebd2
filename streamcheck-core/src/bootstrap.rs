//! Configuration loading

use std::path::Path;

use crate::{Config, Error, Result};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "STREAMCHECK_CONFIG_PATH";

const DEFAULT_CONFIG_FILE: &str = "streamcheck.yaml";

/// Load configuration from a config file or environment variables
///
/// Config file search order:
/// 1. `explicit` (the `--config` flag)
/// 2. STREAMCHECK_CONFIG_PATH environment variable
/// 3. ./streamcheck.yaml (current working directory)
/// 4. Fall back to environment variables only
///
/// Runs before logging is initialized, so progress goes to stderr directly.
pub fn load_config(explicit: Option<&str>) -> Result<Config> {
    if let Some(path) = explicit {
        if !Path::new(path).exists() {
            return Err(Error::InvalidInput(format!("config file not found: {path}")));
        }
    }

    let config_path = explicit
        .map(str::to_string)
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
        .filter(|p| Path::new(p).exists())
        .or_else(|| {
            Path::new(DEFAULT_CONFIG_FILE)
                .exists()
                .then(|| DEFAULT_CONFIG_FILE.to_string())
        });

    let config = match config_path {
        Some(path) => {
            eprintln!("Loading config from {path}");
            Config::from_file(&path)?
        }
        None => Config::from_env()?,
    };

    if let Err(errors) = config.validate() {
        return Err(Error::InvalidInput(format!(
            "Configuration validation failed with {} error(s): {}",
            errors.len(),
            errors.join("; ")
        )));
    }

    Ok(config)
}
