use config::{Config as ConfigBuilder, ConfigError, Environment, File, Map};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::verify::MarkerPrecedence;

/// Longest accepted duration setting: one week
pub const MAX_DURATION_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub player: PlayerConfig,
    pub push: PushCheckConfig,
    pub pull: PullCheckConfig,
    pub logging: LoggingConfig,
}

/// External media player used to verify playback
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub path: String,
    /// Extra arguments passed before the stream URL
    pub args: Vec<String>,
    pub precedence: MarkerPrecedence,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            path: "/Applications/VLC.app/Contents/MacOS/VLC".to_string(),
            args: Vec::new(),
            precedence: MarkerPrecedence::default(),
        }
    }
}

/// Push-style (RTMP) check settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushCheckConfig {
    pub connect_timeout_seconds: u64,
    /// Fixed upper bound for a push-style session
    pub timeout_seconds: u64,
    pub confirm_seconds: u64,
    pub long_confirm_seconds: u64,
    pub long_timeout_grace_seconds: u64,
    pub failure_confirm_seconds: u64,
    pub success_marker: String,
    pub failure_marker: String,
}

impl Default for PushCheckConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: 35,
            timeout_seconds: 35,
            confirm_seconds: 15,
            long_confirm_seconds: 100,
            long_timeout_grace_seconds: 20,
            failure_confirm_seconds: 5,
            success_marker: "Raising max DPB to 3".to_string(),
            failure_marker: "stream error".to_string(),
        }
    }
}

/// Pull-style (HLS) check settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PullCheckConfig {
    /// Nominal playback duration when none is given on the command line
    pub duration_seconds: u64,
    pub confirm_grace_seconds: u64,
    pub timeout_grace_seconds: u64,
    pub failure_confirm_seconds: u64,
    pub http_timeout_seconds: u64,
    pub segment_marker: String,
    pub success_marker: String,
    pub failure_marker: String,
}

impl Default for PullCheckConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 10,
            confirm_grace_seconds: 5,
            timeout_grace_seconds: 10,
            failure_confirm_seconds: 5,
            http_timeout_seconds: 30,
            segment_marker: ".ts".to_string(),
            success_marker: "Changing stream format Unknown -> TS".to_string(),
            failure_marker: "stream error".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "compact", "pretty" or "json"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided and present)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        Self::load_with_env(config_file, None)
    }

    /// Same as [`Config::load`], reading `env` instead of the process environment when given
    fn load_with_env(
        config_file: Option<&str>,
        env: Option<Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // STREAMCHECK_PLAYER__PATH, STREAMCHECK_PULL__DURATION_SECONDS, ...
        builder = builder.add_source(
            Environment::with_prefix("STREAMCHECK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Check for misconfigurations, collecting every problem found
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.player.path.trim().is_empty() {
            errors.push("player.path must not be empty".to_string());
        }

        for (name, marker) in [
            ("push.success_marker", &self.push.success_marker),
            ("push.failure_marker", &self.push.failure_marker),
            ("pull.success_marker", &self.pull.success_marker),
            ("pull.failure_marker", &self.pull.failure_marker),
            ("pull.segment_marker", &self.pull.segment_marker),
        ] {
            if marker.is_empty() {
                errors.push(format!("{name} must not be empty"));
            }
        }

        for (name, value) in [
            ("push.connect_timeout_seconds", self.push.connect_timeout_seconds),
            ("push.timeout_seconds", self.push.timeout_seconds),
            ("push.confirm_seconds", self.push.confirm_seconds),
            ("push.long_confirm_seconds", self.push.long_confirm_seconds),
            ("pull.duration_seconds", self.pull.duration_seconds),
            ("pull.http_timeout_seconds", self.pull.http_timeout_seconds),
        ] {
            if value == 0 {
                errors.push(format!("{name} must be greater than zero"));
            }
        }

        for (name, value) in [
            ("push.connect_timeout_seconds", self.push.connect_timeout_seconds),
            ("push.timeout_seconds", self.push.timeout_seconds),
            ("push.confirm_seconds", self.push.confirm_seconds),
            ("push.long_confirm_seconds", self.push.long_confirm_seconds),
            ("push.long_timeout_grace_seconds", self.push.long_timeout_grace_seconds),
            ("push.failure_confirm_seconds", self.push.failure_confirm_seconds),
            ("pull.duration_seconds", self.pull.duration_seconds),
            ("pull.confirm_grace_seconds", self.pull.confirm_grace_seconds),
            ("pull.timeout_grace_seconds", self.pull.timeout_grace_seconds),
            ("pull.failure_confirm_seconds", self.pull.failure_confirm_seconds),
            ("pull.http_timeout_seconds", self.pull.http_timeout_seconds),
        ] {
            if value > MAX_DURATION_SECONDS {
                errors.push(format!(
                    "{name} must be at most {MAX_DURATION_SECONDS} (got {value})"
                ));
            }
        }

        if self.push.failure_confirm_seconds >= self.push.timeout_seconds {
            errors.push(
                "push.failure_confirm_seconds must be shorter than push.timeout_seconds".to_string(),
            );
        }
        if self.pull.failure_confirm_seconds
            >= self
                .pull
                .duration_seconds
                .saturating_add(self.pull.timeout_grace_seconds)
        {
            errors.push(
                "pull.failure_confirm_seconds must be shorter than the pull hard timeout".to_string(),
            );
        }

        if !matches!(self.logging.format.as_str(), "compact" | "pretty" | "json") {
            errors.push(format!(
                "logging.format must be one of compact, pretty, json (got {})",
                self.logging.format
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.push.timeout_seconds, 35);
        assert_eq!(config.push.confirm_seconds, 15);
        assert_eq!(config.pull.duration_seconds, 10);
        assert_eq!(config.pull.segment_marker, ".ts");
        assert_eq!(config.player.precedence, MarkerPrecedence::FailureOverrides);
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = Config::default();
        config.player.path = "  ".to_string();
        config.push.failure_marker = String::new();
        config.push.failure_confirm_seconds = 40;
        config.logging.format = "xml".to_string();

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.contains("player.path")));
        assert!(errors.iter().any(|e| e.contains("push.failure_marker")));
        assert!(errors.iter().any(|e| e.contains("failure_confirm_seconds")));
        assert!(errors.iter().any(|e| e.contains("logging.format")));
    }

    #[test]
    fn test_validate_rejects_out_of_range_durations() {
        let mut config = Config::default();
        config.push.long_confirm_seconds = u64::MAX;
        config.pull.duration_seconds = u64::MAX;
        config.pull.timeout_grace_seconds = u64::MAX;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.starts_with("push.long_confirm_seconds must be at most")));
        assert!(errors.iter().any(|e| e.starts_with("pull.duration_seconds must be at most")));
        assert!(errors.iter().any(|e| e.starts_with("pull.timeout_grace_seconds must be at most")));

        config.pull.duration_seconds = MAX_DURATION_SECONDS;
        config.pull.timeout_grace_seconds = 10;
        config.push.long_confirm_seconds = MAX_DURATION_SECONDS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "player:\n  path: /usr/bin/vlc\n  args: [\"--intf\", \"dummy\"]\n  precedence: first_wins\npull:\n  duration_seconds: 20\n"
        )
        .unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.player.path, "/usr/bin/vlc");
        assert_eq!(config.player.args, vec!["--intf", "dummy"]);
        assert_eq!(config.player.precedence, MarkerPrecedence::FirstWins);
        assert_eq!(config.pull.duration_seconds, 20);
        // Untouched sections keep their defaults
        assert_eq!(config.push.success_marker, "Raising max DPB to 3");
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "player:\n  path: /usr/bin/vlc\npush:\n  confirm_seconds: 20\n  timeout_seconds: 40\n"
        )
        .unwrap();

        let mut env = Map::new();
        env.insert("STREAMCHECK_PUSH__CONFIRM_SECONDS".to_string(), "7".to_string());
        env.insert("STREAMCHECK_PLAYER__PATH".to_string(), "/opt/vlc".to_string());
        env.insert("OTHERAPP_PUSH__CONFIRM_SECONDS".to_string(), "99".to_string());

        let config = Config::load_with_env(file.path().to_str(), Some(env)).unwrap();

        assert_eq!(config.push.confirm_seconds, 7);
        assert_eq!(config.player.path, "/opt/vlc");
        // File values without an environment override survive
        assert_eq!(config.push.timeout_seconds, 40);
        assert_eq!(config.pull.duration_seconds, 10);
    }

    #[test]
    fn test_environment_without_file() {
        let mut env = Map::new();
        env.insert("STREAMCHECK_PULL__DURATION_SECONDS".to_string(), "25".to_string());
        env.insert("STREAMCHECK_PLAYER__PRECEDENCE".to_string(), "latest_wins".to_string());

        let config = Config::load_with_env(None, Some(env)).unwrap();

        assert_eq!(config.pull.duration_seconds, 25);
        assert_eq!(config.player.precedence, MarkerPrecedence::LatestWins);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load(Some("/nonexistent/streamcheck.yaml")).unwrap();
        assert_eq!(config.pull.http_timeout_seconds, 30);
    }
}
