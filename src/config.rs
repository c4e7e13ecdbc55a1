//! Server Configuration
//!
//! Defines the YAML configuration for the data product server:
//! - Listen address for the metadata API
//! - Registrar (proxy) location
//! - Metadata source type and directory
//! - Registration retry and confirmation record settings

use crate::metadata::MetadataKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_CONFIG: &str = "./config/config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid configuration {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Complete server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where this server listens; command-line values apply when absent
    #[serde(default)]
    pub product: Option<ListenConfig>,
    /// Registrar, reached through the proxy
    pub proxy: RegistrarConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub registration: RegistrationConfig,
}

impl AppConfig {
    pub fn from_yaml(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read and parse a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(path, &contents)
    }

    /// Path of the registration confirmation record
    pub fn registration_file(&self) -> PathBuf {
        self.metadata.directory.join(&self.registration.filename)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrarConfig {
    pub host: String,
    pub port: u16,
}

impl RegistrarConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Metadata source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Source type, resolved when the configuration is parsed
    #[serde(rename = "type")]
    pub kind: MetadataKind,
    pub directory: PathBuf,
    /// Delay between failed load attempts
    pub retry_seconds: u64,
    /// Directory polling interval
    pub watch_interval_ms: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            kind: MetadataKind::Simple,
            directory: PathBuf::from("dataproducts"),
            retry_seconds: 15,
            watch_interval_ms: 1000,
        }
    }
}

impl MetadataConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_seconds)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Delay between failed registration attempts
    pub retry_seconds: u64,
    /// Confirmation record file name, relative to the metadata directory
    pub filename: String,
    /// Host advertised to the registrar (defaults to the machine hostname)
    pub advertise_host: Option<String>,
    pub advertise_port: u16,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            retry_seconds: 15,
            filename: "registration.yaml".to_string(),
            advertise_host: None,
            advertise_port: DEFAULT_PORT,
        }
    }
}

impl RegistrationConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_seconds)
    }
}
