//! Persisted session settings.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::domain::model_descriptor::ModelId;
use crate::models::model_store::default_model_dir;
use crate::pipeline::detection_coordinator::CoordinatorConfig;
use crate::shared::constants::{CATALOGUE_URL, CONFIDENCE_THRESHOLD, DEFAULT_STALL_WARNING_MS};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to access settings at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("could not determine model directory")]
    NoModelDir,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Overrides the platform model directory.
    pub model_dir: Option<PathBuf>,
    pub catalogue_url: String,
    pub confidence_threshold: i32,
    pub stall_warning_ms: u64,
    /// Re-activated on the next start.
    pub last_active_model: Option<ModelId>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model_dir: None,
            catalogue_url: CATALOGUE_URL.to_string(),
            confidence_threshold: CONFIDENCE_THRESHOLD,
            stall_warning_ms: DEFAULT_STALL_WARNING_MS,
            last_active_model: None,
        }
    }
}

impl SessionConfig {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("FaceMark").join("settings.json"))
    }

    /// Loads the user's settings, falling back to defaults.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(ConfigError::Io { ref source, .. }) if source.kind() == ErrorKind::NotFound => {
                Self::default()
            }
            Err(e) => {
                log::warn!("{e}; using default settings");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |e: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        fs::write(path, json).map_err(io_err)
    }

    pub fn resolved_model_dir(&self) -> Result<PathBuf, ConfigError> {
        self.model_dir
            .clone()
            .or_else(default_model_dir)
            .ok_or(ConfigError::NoModelDir)
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            confidence_threshold: self.confidence_threshold,
            stall_warning: Duration::from_millis(self.stall_warning_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.confidence_threshold, 30);
        assert_eq!(config.stall_warning_ms, 5000);
        assert_eq!(config.catalogue_url, CATALOGUE_URL);
        assert!(config.last_active_model.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("FaceMark").join("settings.json");
        let config = SessionConfig {
            model_dir: Some(tmp.path().join("models")),
            last_active_model: Some(ModelId(3)),
            ..SessionConfig::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(SessionConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        fs::write(&path, r#"{"last_active_model": 2}"#).unwrap();
        let config = SessionConfig::load_from(&path).unwrap();
        assert_eq!(config.last_active_model, Some(ModelId(2)));
        assert_eq!(config.confidence_threshold, CONFIDENCE_THRESHOLD);
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            SessionConfig::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_explicit_model_dir_wins() {
        let config = SessionConfig {
            model_dir: Some(PathBuf::from("/opt/models")),
            ..SessionConfig::default()
        };
        assert_eq!(config.resolved_model_dir().unwrap(), PathBuf::from("/opt/models"));
    }

    #[test]
    fn test_coordinator_config() {
        let config = SessionConfig {
            confidence_threshold: 50,
            stall_warning_ms: 250,
            ..SessionConfig::default()
        };
        let coordinator = config.coordinator_config();
        assert_eq!(coordinator.confidence_threshold, 50);
        assert_eq!(coordinator.stall_warning, Duration::from_millis(250));
    }
}
