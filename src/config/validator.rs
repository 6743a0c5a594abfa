//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - server: host non-empty, port non-zero, read timeout non-zero
//! - logging level / metrics path
//! - credentials: scope non-empty, metadata url scheme

use crate::config::settings::{CredentialsConfig, ServiceConfig, SettingsConfig};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_credentials(&cfg.credentials, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    let server = &settings.server;
    if server.host.trim().is_empty() {
        errors.push("settings.server.host must not be empty".to_string());
    }
    if server.port == 0 {
        errors.push("settings.server.port must be in 1..=65535".to_string());
    }
    if server.read_timeout_seconds == 0 {
        errors.push("settings.server.read_timeout_seconds must be greater than 0".to_string());
    }

    if let Some(logging) = &settings.logging {
        if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' is not one of {:?}",
                logging.level, LOG_LEVELS
            ));
        }
    }

    if !settings.metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            settings.metrics.path
        ));
    }
}

fn validate_credentials(credentials: &CredentialsConfig, errors: &mut Vec<String>) {
    if credentials.scope.trim().is_empty() {
        errors.push("credentials.scope must not be empty".to_string());
    }
    if let Some(url) = &credentials.metadata_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(format!(
                "credentials.metadata_url '{}' must be an http(s) url",
                url
            ));
        }
    }
    if let Some(path) = &credentials.credentials_file {
        if path.as_os_str().is_empty() {
            errors.push("credentials.credentials_file must not be empty when set".to_string());
        }
    }
}
