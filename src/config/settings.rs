use std::path::PathBuf;

use serde::Deserialize;

use crate::utils::constants::{
    DEFAULT_HOST, DEFAULT_METRICS_PATH, DEFAULT_PORT, DEFAULT_READ_TIMEOUT_SECONDS, DEFAULT_SCOPE,
};

/// ================================
/// Root configuration
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServiceConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// ================================
/// Global service-wide settings
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SettingsConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub logging: Option<LoggingConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// applied per request by the hosting layer
    #[serde(default = "default_read_timeout_seconds")]
    pub read_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            read_timeout_seconds: default_read_timeout_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_path")]
    pub path: String,
    #[serde(default)]
    pub is_enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            path: default_metrics_path(),
            is_enabled: false,
        }
    }
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String, // allowed: trace, debug, info, warn, error
    #[serde(default = "LogFormat::from_env")]
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new(level: String, format: LogFormat) -> Self {
        Self { level, format }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new(default_log_level(), LogFormat::from_env())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "json".to_string())
            .to_lowercase()
            .as_str()
        {
            "compact" | "text" => LogFormat::Compact,
            _ => LogFormat::Json,
        }
    }
}

/// ================================
/// Credential discovery
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct CredentialsConfig {
    /// OAuth2 scope requested from the credential source
    #[serde(default = "default_scope")]
    pub scope: String,
    /// key file used instead of GOOGLE_APPLICATION_CREDENTIALS / the gcloud well-known file
    pub credentials_file: Option<PathBuf>,
    /// metadata server base url, e.g. http://metadata.google.internal
    pub metadata_url: Option<String>,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            scope: default_scope(),
            credentials_file: None,
            metadata_url: None,
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_read_timeout_seconds() -> u64 {
    DEFAULT_READ_TIMEOUT_SECONDS
}

fn default_metrics_path() -> String {
    DEFAULT_METRICS_PATH.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}
