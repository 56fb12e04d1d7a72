use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default size of the chunks an upload is processed in (1 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;
/// Default number of leading bytes kept for signature sniffing
pub const DEFAULT_HEADER_WINDOW: usize = 1024;
/// Default upload ceiling (100 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;
/// Default retention window (1 day)
pub const DEFAULT_MAX_AGE_SECS: u64 = 24 * 60 * 60;
/// Default sweep period (4 hours)
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 4 * 60 * 60;

/// Upload validation limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Size of the chunks the body is processed and buffered in
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Cap on the header bytes accumulated for the signature check
    #[serde(default = "default_header_window")]
    pub header_window: usize,

    /// Maximum accepted upload size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

const fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

const fn default_header_window() -> usize {
    DEFAULT_HEADER_WINDOW
}

const fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            header_window: default_header_window(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// Retention sweep configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Files older than this many seconds are deleted
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,

    /// Seconds between two sweeps
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Also delete orphaned `.pdf.part` staging files
    #[serde(default = "default_true")]
    pub include_staging: bool,
}

const fn default_max_age_secs() -> u64 {
    DEFAULT_MAX_AGE_SECS
}

const fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}

const fn default_true() -> bool {
    true
}

impl RetentionConfig {
    pub const fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age_secs: default_max_age_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            include_staging: true,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS (empty = permissive)
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Pre-built front-end served for unmatched paths
    pub static_dir: Option<PathBuf>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    3000
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            static_dir: None,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage root holding `inputs/` and `outputs/`
    /// (defaults to $XDG_DATA_HOME/pdf-splitter)
    pub data_dir: Option<PathBuf>,

    /// Upload limits
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Retention sweep
    #[serde(default)]
    pub retention: RetentionConfig,

    /// HTTP server
    #[serde(default)]
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigLoad(format!("Failed to parse config: {e}")))
    }

    /// Load from default locations (~/.config/pdf-splitter/config.toml, ./config.toml)
    pub fn load() -> Self {
        // Try user config
        if let Some(config_dir) = crate::util::config_dir() {
            let user_config = config_dir.join("pdf-splitter").join("config.toml");
            if user_config.exists() {
                match Self::from_file(&user_config) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {}", user_config.display());
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // Try local config
        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            match Self::from_file(&local_config) {
                Ok(config) => {
                    tracing::debug!("Loaded config from ./config.toml");
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load ./config.toml: {}", e);
                }
            }
        }

        tracing::debug!("No config file found, using defaults");
        Self::default()
    }

    /// Resolved storage root
    pub fn storage_root(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(crate::util::default_storage_path)
    }

    /// Reject values the components cannot work with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &str, reason: &str| {
            Err(Error::ConfigInvalid {
                field: field.to_string(),
                reason: reason.to_string(),
            })
        };

        if self.ingest.chunk_size == 0 {
            return invalid("ingest.chunk_size", "must be greater than zero");
        }
        if self.ingest.header_window < crate::ingest::PDF_SIGNATURE.len() {
            return invalid("ingest.header_window", "must hold at least the 5-byte signature");
        }
        if self.ingest.max_upload_bytes == 0 {
            return invalid("ingest.max_upload_bytes", "must be greater than zero");
        }
        if self.retention.max_age_secs == 0 {
            return invalid("retention.max_age_secs", "must be greater than zero");
        }
        if self.retention.sweep_interval_secs == 0 {
            return invalid("retention.sweep_interval_secs", "must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_constants() {
        let config = AppConfig::default();
        assert_eq!(config.ingest.chunk_size, 1024 * 1024);
        assert_eq!(config.ingest.header_window, 1024);
        assert_eq!(config.ingest.max_upload_bytes, 100 * 1024 * 1024);
        assert_eq!(config.retention.max_age(), Duration::from_secs(86_400));
        assert_eq!(config.retention.sweep_interval(), Duration::from_secs(14_400));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            data_dir = "/srv/splitter"

            [ingest]
            max_upload_bytes = 2048
            "#,
        )
        .unwrap();

        assert_eq!(config.storage_root(), PathBuf::from("/srv/splitter"));
        assert_eq!(config.ingest.max_upload_bytes, 2048);
        assert_eq!(config.ingest.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(config.retention.include_staging);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_invalid_toml() {
        let result = AppConfig::from_toml("ingest = 3");
        assert!(matches!(result, Err(Error::ConfigLoad(_))));
    }

    #[test]
    fn test_validate_rejects_tiny_header_window() {
        let mut config = AppConfig::default();
        config.ingest.header_window = 4;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid { ref field, .. } if field == "ingest.header_window"));
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let mut config = AppConfig::default();
        config.ingest.chunk_size = 0;
        assert!(config.validate().is_err());
    }
}
