/// Configuration file management
///
/// Settings are read from `<config dir>/pulmo-sync/config.toml`. Every field
/// has a default, so a missing file is the same as an empty one.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::aggregation::Calendar;
use crate::domain::UserId;
use crate::sync::SyncSettings;

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Oldest day fetched on a sync, counted back from today
    pub max_days_back: u32,

    /// Upper bound on day documents written at once for one metric
    pub max_concurrent_writes: usize,

    /// Offset used to find calendar days; the host's offset when unset
    pub utc_offset_minutes: Option<i32>,

    /// Identifier of the signed-in patient
    pub user_id: Option<String>,

    /// JSON health export used as the health data source
    pub health_export: Option<PathBuf>,

    pub remote: RemoteConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_days_back: 7,
            max_concurrent_writes: 8,
            utc_offset_minutes: None,
            user_id: None,
            health_export: None,
            remote: RemoteConfig::default(),
        }
    }
}

/// Remote document store settings
///
/// Without a URL documents are written to the local database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub url: Option<String>,
    pub token: Option<String>,
}

impl Config {
    /// Load configuration from the default path
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_writes == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_writes must be at least 1".to_string(),
            ));
        }
        if let Some(minutes) = self.utc_offset_minutes {
            if Calendar::from_offset_minutes(minutes).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "utc_offset_minutes out of range: {}",
                    minutes
                )));
            }
        }
        if let Some(user) = &self.user_id {
            UserId::new(user.as_str()).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(())
    }

    /// Calendar implied by `utc_offset_minutes`
    pub fn calendar(&self) -> Calendar {
        self.utc_offset_minutes
            .and_then(Calendar::from_offset_minutes)
            .unwrap_or_else(Calendar::local)
    }

    /// The configured user, if it is a valid identifier
    pub fn user(&self) -> Option<UserId> {
        self.user_id.as_deref().and_then(|raw| UserId::new(raw).ok())
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            max_days_back: self.max_days_back,
            max_concurrent_writes: self.max_concurrent_writes,
            calendar: self.calendar(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Default configuration file path
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pulmo-sync")
        .join("config.toml")
}

/// Default database path
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pulmo-sync")
        .join("pulmo-sync.db")
}
