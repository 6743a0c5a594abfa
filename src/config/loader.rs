use std::path::Path;

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use tracing::{debug, error};

use crate::config::settings::ServiceConfig;
use crate::config::validator;
use crate::observability::metrics::get_metrics;

/// Load config from an optional YAML file; without one every section takes its default.
/// `port_override` replaces `settings.server.port` before validation.
pub async fn run(config_path: Option<&str>, port_override: Option<u16>) -> Result<ServiceConfig> {
    let mut service_config = match config_path {
        Some(path) => file_to_config(Path::new(path))
            .await
            .with_context(|| format!("Invalid config '{}'", path))?,
        None => ServiceConfig::default(),
    };
    if let Some(port) = port_override {
        service_config.settings.server.port = port;
    }
    validate(&service_config).await?;
    Ok(service_config)
}

/// Load config from YAML file, expanding `${VAR}` / `${VAR:default}` placeholders
pub async fn file_to_config(path: &Path) -> Result<ServiceConfig> {
    let content = tokio::fs::read_to_string(path).await?;
    let expanded = expand_env_vars(&content)?;
    parse_config(&expanded).await
}

pub async fn parse_config(content: &str) -> Result<ServiceConfig> {
    let service_config: ServiceConfig = serde_yaml::from_str(content).inspect_err(|e| {
        error!("parse config error: {}", e);
    })?;
    debug!("parsed config: {:?}", service_config);
    Ok(service_config)
}

async fn validate(service_config: &ServiceConfig) -> Result<()> {
    let metrics = get_metrics().await;
    validator::validate_service_config(service_config).map_err(|errors| {
        for e in &errors {
            error!("config validation: {}", e);
        }
        metrics.config_validation_errors.inc_by(errors.len() as u64);
        anyhow!("config validation failed:\n  - {}", errors.join("\n  - "))
    })
}

fn expand_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{(\w+)(?::([^\}]+))?\}")?;
    Ok(re
        .replace_all(input, |caps: &regex::Captures| {
            let var = &caps[1];
            let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(var).unwrap_or_else(|_| default.to_string())
        })
        .to_string())
}
