//! Configuration file handling.
//!
//! The file is optional; every key has a default. Lookup order for the path:
//! the `MAILKEY_CONFIG` environment variable, then
//! `<config_dir>/mailkey/config.toml`.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::{DEFAULT_AUTHORITY, ProviderConfig};

/// Environment variable overriding the configuration file path.
pub const CONFIG_ENV: &str = "MAILKEY_CONFIG";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Which credential store backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Keyring,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Identity provider authority; endpoints are derived from it.
    pub authority: String,

    /// Namespace for every stored credential.
    pub keyring_service: String,

    pub store_backend: StoreBackend,

    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Render QR codes for URLs shown to the user.
    pub qr_codes: bool,

    pub qr_service: String,

    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            authority: DEFAULT_AUTHORITY.to_string(),
            keyring_service: "mailkey".to_string(),
            store_backend: StoreBackend::default(),
            log_level: "warn".to_string(),
            qr_codes: true,
            qr_service: "https://qrenco.de".to_string(),
            config_path: None,
        }
    }
}

impl Config {
    /// Load from an explicit path. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Load from `MAILKEY_CONFIG` or the platform config directory.
    pub fn load() -> Result<Self, ConfigError> {
        match default_config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Endpoint configuration derived from [`authority`](Self::authority).
    pub fn provider(&self) -> ProviderConfig {
        ProviderConfig::from_authority(self.authority.as_str())
    }
}

/// Where [`Config::load`] looks for the file.
pub fn default_config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    project_dirs().map(|d| d.config_dir().join("config.toml"))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "raibid-labs", "mailkey")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.authority, "https://login.microsoftonline.com/common");
        assert_eq!(config.keyring_service, "mailkey");
        assert_eq!(config.store_backend, StoreBackend::Keyring);
        assert!(config.qr_codes);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            store_backend = "memory"
            qr_codes = false
            "#,
        )
        .unwrap();

        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert!(!config.qr_codes);
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.qr_service, "https://qrenco.de");
    }

    #[test]
    fn test_provider_from_authority() {
        let config = Config {
            authority: "http://127.0.0.1:8080/tenant/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.provider().token_url,
            "http://127.0.0.1:8080/tenant/oauth2/v2.0/token"
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "keyring_service = \"mailkey-work\"\nlog_level = \"debug\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.keyring_service, "mailkey-work");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_invalid_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "qr_codes = \"sometimes\"").unwrap();

        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let result: Result<Config, _> = toml::from_str(r#"store_backend = "vault""#);
        assert!(result.is_err());
    }
}
