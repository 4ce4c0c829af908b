//! TOML configuration and logging setup.
//!
//! Every field has a default, so a missing or partial file is fine:
//!
//! ```toml
//! cache_ttl_minutes = 30
//! user_selection_ttl_hours = 24
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```

use std::env;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Duration;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, EnvFilter};

use crate::store::StoreSettings;

pub const CONFIG_ENV: &str = "SALES_DASHBOARD_CONFIG";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("failed to open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache_ttl_minutes: i64,
    pub state_max_age_minutes: i64,
    pub user_selection_ttl_hours: i64,
    pub future_tolerance_days: i64,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_ttl_minutes: 30,
            state_max_age_minutes: 30,
            user_selection_ttl_hours: 24,
            future_tolerance_days: 1,
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_toml(&content)
    }

    /// Picks the config from `--config`, then `SALES_DASHBOARD_CONFIG`, then
    /// `config.toml` inside the state directory. Falls back to defaults.
    pub fn resolve(cli_path: Option<&Path>, state_dir: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = cli_path {
            return Self::load(path);
        }

        if let Some(path) = env::var_os(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if !path.as_os_str().is_empty() {
                return Self::load(&path);
            }
        }

        let default_path = state_dir.join(CONFIG_FILE);
        if default_path.is_file() {
            return Self::load(&default_path);
        }

        Ok(Self::default())
    }

    pub fn store_settings(&self) -> Result<StoreSettings, ConfigError> {
        Ok(StoreSettings {
            cache_ttl: duration("cache_ttl_minutes", Duration::try_minutes(self.cache_ttl_minutes))?,
            state_max_age: duration(
                "state_max_age_minutes",
                Duration::try_minutes(self.state_max_age_minutes),
            )?,
            user_selection_ttl: duration(
                "user_selection_ttl_hours",
                Duration::try_hours(self.user_selection_ttl_hours),
            )?,
            future_tolerance: duration(
                "future_tolerance_days",
                Duration::try_days(self.future_tolerance_days),
            )?,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("cache_ttl_minutes", self.cache_ttl_minutes),
            ("state_max_age_minutes", self.state_max_age_minutes),
            ("user_selection_ttl_hours", self.user_selection_ttl_hours),
        ];
        for (field, value) in positive {
            if value <= 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("must be greater than 0, got {value}"),
                });
            }
        }
        if self.future_tolerance_days < 0 {
            return Err(ConfigError::InvalidValue {
                field: "future_tolerance_days",
                reason: "must not be negative".to_string(),
            });
        }
        self.store_settings()?;
        match self.logging.format.as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(ConfigError::InvalidValue {
                field: "logging.format",
                reason: format!("expected 'pretty' or 'json', got '{other}'"),
            }),
        }
    }
}

fn duration(field: &'static str, value: Option<Duration>) -> Result<Duration, ConfigError> {
    value.ok_or_else(|| ConfigError::InvalidValue {
        field,
        reason: "too large to represent as a duration".to_string(),
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Installs the global subscriber. Output goes to the configured file, else
    /// to `fallback_file`, else to stderr. `RUST_LOG` overrides `level`.
    pub fn init(&self, fallback_file: Option<&Path>) -> Result<(), ConfigError> {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        let target = self.file.as_deref().or(fallback_file);
        let writer = match target {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        fs::create_dir_all(parent).map_err(|source| ConfigError::LogFile {
                            path: path.to_path_buf(),
                            source,
                        })?;
                    }
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| ConfigError::LogFile {
                        path: path.to_path_buf(),
                        source,
                    })?;
                BoxMakeWriter::new(Mutex::new(file))
            }
            None => BoxMakeWriter::new(std::io::stderr),
        };

        let builder = fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(target.is_none());
        let installed = match self.format.as_str() {
            "json" => builder.json().try_init(),
            _ => builder.try_init(),
        };
        // Another subscriber already owns the process; it receives this warning.
        if let Err(err) = installed {
            warn!(error = %err, "logging already initialized, keeping the existing subscriber");
        }
        Ok(())
    }
}
