//! INI configuration file.
//!
//! Settings live in `~/.pointquery/config.ini`:
//!
//! ```ini
//! [service]
//! base_url = https://api.opentopodata.org/v1
//! demo = true
//! http_timeout_secs = 30
//!
//! [query]
//! request_deadline_ms = 2000
//! prefetch_quiet_ms = 1000
//! prefetch_leading_edge = false
//!
//! [datasets]
//! ids = srtm30m,aster30m
//!
//! [logging]
//! level = info
//! file = /var/log/pointquery.log
//! ```
//!
//! A missing file or key falls back to the default. A value that does not
//! parse is an error naming the offending key.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::coordinator::CoordinatorConfig;
use crate::dataset::DatasetId;
use crate::logging::LoggingConfig;
use crate::service::ServiceConfig;

/// Datasets shown when none are configured.
pub const DEFAULT_DATASETS: &[&str] = &["srtm30m", "aster30m"];

/// Errors from loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read or written.
    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid INI.
    #[error("Failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// A key holds a value of the wrong shape.
    #[error("Invalid value '{value}' for {section}.{key}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },

    /// No such `section.key`.
    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),
}

/// Directory holding the configuration file and default log file.
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pointquery")
}

/// Default configuration file path.
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.ini")
}

/// `[service]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSection {
    pub base_url: String,
    pub demo: bool,
    pub http_timeout_secs: u64,
}

/// `[query]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySection {
    pub request_deadline_ms: u64,
    pub prefetch_quiet_ms: u64,
    pub prefetch_leading_edge: bool,
}

/// `[datasets]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetsSection {
    pub ids: Vec<String>,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSection {
    pub level: String,
    pub file: Option<PathBuf>,
}

/// Parsed configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub service: ServiceSection,
    pub query: QuerySection,
    pub datasets: DatasetsSection,
    pub logging: LoggingSection,
}

impl Default for ConfigFile {
    fn default() -> Self {
        let service = ServiceConfig::default();
        let query = CoordinatorConfig::default();
        Self {
            service: ServiceSection {
                base_url: service.base_url,
                demo: service.demo,
                http_timeout_secs: service.http_timeout.as_secs(),
            },
            query: QuerySection {
                request_deadline_ms: query.request_deadline.as_millis() as u64,
                prefetch_quiet_ms: query.prefetch_quiet_period.as_millis() as u64,
                prefetch_leading_edge: query.prefetch_leading_edge,
            },
            datasets: DatasetsSection {
                ids: DEFAULT_DATASETS.iter().map(|s| s.to_string()).collect(),
            },
            logging: LoggingSection {
                level: "info".to_string(),
                file: None,
            },
        }
    }
}

impl ConfigFile {
    /// Load from the default path.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No configuration file, using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => ConfigError::Io {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(e) => ConfigError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;

        let mut config = Self::default();
        for key in ConfigKey::all() {
            if let Some(value) = ini.get_from(Some(key.section()), key.key_name()) {
                key.set(&mut config, value)?;
            }
        }

        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Save to the default path.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Write every key to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            ini.with_section(Some(key.section()))
                .set(key.key_name(), key.get(self));
        }
        ini.write_to_file(path).map_err(io_err)
    }

    /// Timing configuration for the coordinator.
    pub fn to_coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig::default()
            .with_request_deadline(Duration::from_millis(self.query.request_deadline_ms))
            .with_prefetch_quiet_period(Duration::from_millis(self.query.prefetch_quiet_ms))
            .with_prefetch_leading_edge(self.query.prefetch_leading_edge)
    }

    /// Endpoint configuration for the remote service.
    pub fn to_service_config(&self) -> ServiceConfig {
        ServiceConfig::new(self.service.base_url.clone())
            .with_demo(self.service.demo)
            .with_http_timeout(Duration::from_secs(self.service.http_timeout_secs))
    }

    /// Logging configuration.
    pub fn to_logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.logging.level.clone(),
            file: self.logging.file.clone(),
        }
    }

    /// Configured datasets, in order.
    pub fn dataset_ids(&self) -> Vec<DatasetId> {
        self.datasets.ids.iter().map(|id| DatasetId::new(id.clone())).collect()
    }
}

/// Every recognised `section.key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    ServiceBaseUrl,
    ServiceDemo,
    ServiceHttpTimeoutSecs,
    QueryRequestDeadlineMs,
    QueryPrefetchQuietMs,
    QueryPrefetchLeadingEdge,
    DatasetsIds,
    LoggingLevel,
    LoggingFile,
}

impl ConfigKey {
    /// All keys in file order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::ServiceBaseUrl,
            ConfigKey::ServiceDemo,
            ConfigKey::ServiceHttpTimeoutSecs,
            ConfigKey::QueryRequestDeadlineMs,
            ConfigKey::QueryPrefetchQuietMs,
            ConfigKey::QueryPrefetchLeadingEdge,
            ConfigKey::DatasetsIds,
            ConfigKey::LoggingLevel,
            ConfigKey::LoggingFile,
        ]
    }

    pub fn section(&self) -> &'static str {
        match self {
            ConfigKey::ServiceBaseUrl | ConfigKey::ServiceDemo | ConfigKey::ServiceHttpTimeoutSecs => {
                "service"
            }
            ConfigKey::QueryRequestDeadlineMs
            | ConfigKey::QueryPrefetchQuietMs
            | ConfigKey::QueryPrefetchLeadingEdge => "query",
            ConfigKey::DatasetsIds => "datasets",
            ConfigKey::LoggingLevel | ConfigKey::LoggingFile => "logging",
        }
    }

    pub fn key_name(&self) -> &'static str {
        match self {
            ConfigKey::ServiceBaseUrl => "base_url",
            ConfigKey::ServiceDemo => "demo",
            ConfigKey::ServiceHttpTimeoutSecs => "http_timeout_secs",
            ConfigKey::QueryRequestDeadlineMs => "request_deadline_ms",
            ConfigKey::QueryPrefetchQuietMs => "prefetch_quiet_ms",
            ConfigKey::QueryPrefetchLeadingEdge => "prefetch_leading_edge",
            ConfigKey::DatasetsIds => "ids",
            ConfigKey::LoggingLevel => "level",
            ConfigKey::LoggingFile => "file",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as text; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::ServiceBaseUrl => config.service.base_url.clone(),
            ConfigKey::ServiceDemo => config.service.demo.to_string(),
            ConfigKey::ServiceHttpTimeoutSecs => config.service.http_timeout_secs.to_string(),
            ConfigKey::QueryRequestDeadlineMs => config.query.request_deadline_ms.to_string(),
            ConfigKey::QueryPrefetchQuietMs => config.query.prefetch_quiet_ms.to_string(),
            ConfigKey::QueryPrefetchLeadingEdge => config.query.prefetch_leading_edge.to_string(),
            ConfigKey::DatasetsIds => config.datasets.ids.join(","),
            ConfigKey::LoggingLevel => config.logging.level.clone(),
            ConfigKey::LoggingFile => config
                .logging
                .file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Parse `value` and store it.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match self {
            ConfigKey::ServiceBaseUrl => {
                if !(value.starts_with("http://") || value.starts_with("https://")) {
                    return Err(self.invalid(value));
                }
                config.service.base_url = value.to_string();
            }
            ConfigKey::ServiceDemo => config.service.demo = self.parse_bool(value)?,
            ConfigKey::ServiceHttpTimeoutSecs => {
                config.service.http_timeout_secs = self.parse_positive(value)?
            }
            ConfigKey::QueryRequestDeadlineMs => {
                config.query.request_deadline_ms = self.parse_positive(value)?
            }
            ConfigKey::QueryPrefetchQuietMs => {
                config.query.prefetch_quiet_ms = value.parse().map_err(|_| self.invalid(value))?
            }
            ConfigKey::QueryPrefetchLeadingEdge => {
                config.query.prefetch_leading_edge = self.parse_bool(value)?
            }
            ConfigKey::DatasetsIds => {
                config.datasets.ids = value
                    .split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            ConfigKey::LoggingLevel => {
                if value.is_empty() {
                    return Err(self.invalid(value));
                }
                config.logging.level = value.to_string();
            }
            ConfigKey::LoggingFile => {
                config.logging.file = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
        }
        Ok(())
    }

    fn invalid(&self, value: &str) -> ConfigError {
        ConfigError::InvalidValue {
            section: self.section().to_string(),
            key: self.key_name().to_string(),
            value: value.to_string(),
        }
    }

    fn parse_bool(&self, value: &str) -> Result<bool, ConfigError> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => Err(self.invalid(value)),
        }
    }

    fn parse_positive(&self, value: &str) -> Result<u64, ConfigError> {
        match value.parse::<u64>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(self.invalid(value)),
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section(), self.key_name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == s)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}
