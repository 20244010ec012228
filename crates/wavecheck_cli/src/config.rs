//! Configuration file support for wavecheck.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `WAVECHECK_`, e.g.,
//!    `WAVECHECK_TOKENS_SOURCE`)
//! 3. Config file (~/.config/wavecheck/config.toml or ./wavecheck.toml)
//! 4. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [tokens]
//! source = "ghp_..."  # or WAVECHECK_TOKENS_SOURCE
//! target = "ghp_..."  # or WAVECHECK_TOKENS_TARGET
//!
//! [paths]
//! logs = "logs"
//! snapshots = "snapshots"
//! report = "report"
//! scripts = "scripts"
//! mapping = "report/org-mapping.csv"
//! ```

use std::path::PathBuf;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// GitHub credentials.
    pub tokens: TokensConfig,
    /// Working directories and the org mapping location.
    pub paths: PathsConfig,
}

/// GitHub credentials, one per side of the migration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TokensConfig {
    /// Token for source organizations.
    /// Can also be set via WAVECHECK_TOKENS_SOURCE.
    pub source: Option<String>,
    /// Token for target organizations.
    /// Can also be set via WAVECHECK_TOKENS_TARGET.
    pub target: Option<String>,
}

/// Working directories and the org mapping location.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Where stats captures and migration run logs live.
    pub logs: PathBuf,
    /// Where entity snapshot captures live.
    pub snapshots: PathBuf,
    /// Where report tables are written.
    pub report: PathBuf,
    /// Where rendered operator scripts are written.
    pub scripts: PathBuf,
    /// The org mapping table.
    pub mapping: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            logs: PathBuf::from("logs"),
            snapshots: PathBuf::from("snapshots"),
            report: PathBuf::from("report"),
            scripts: PathBuf::from("scripts"),
            mapping: PathBuf::from("report/org-mapping.csv"),
        }
    }
}

impl Config {
    /// Load configuration from file, environment, and defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(dirs) = ProjectDirs::from("", "", "wavecheck") {
            let path = dirs.config_dir().join("config.toml");
            builder =
                builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }
        builder = builder.add_source(
            File::with_name("wavecheck")
                .format(FileFormat::Toml)
                .required(false),
        );
        builder = builder.add_source(
            Environment::with_prefix("WAVECHECK")
                .separator("_")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// The token for one side of the migration, CLI flag winning.
    #[must_use]
    pub fn token_for(&self, flag: Option<&str>, side: wavecheck::Side) -> Option<String> {
        if let Some(token) = flag {
            return Some(token.to_string());
        }
        match side {
            wavecheck::Side::Source => self.tokens.source.clone(),
            wavecheck::Side::Target => self.tokens.target.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_the_conventional_layout() {
        let config = Config::default();
        assert_eq!(config.paths.logs, PathBuf::from("logs"));
        assert_eq!(config.paths.snapshots, PathBuf::from("snapshots"));
        assert_eq!(config.paths.mapping, PathBuf::from("report/org-mapping.csv"));
        assert!(config.tokens.source.is_none());
    }

    #[test]
    fn cli_flag_wins_over_configured_token() {
        let config = Config {
            tokens: TokensConfig {
                source: Some("from-config".into()),
                target: None,
            },
            paths: PathsConfig::default(),
        };
        assert_eq!(
            config.token_for(Some("from-flag"), wavecheck::Side::Source),
            Some("from-flag".to_string())
        );
        assert_eq!(
            config.token_for(None, wavecheck::Side::Source),
            Some("from-config".to_string())
        );
        assert_eq!(config.token_for(None, wavecheck::Side::Target), None);
    }
}
