//! Application Default Credentials discovery.
//!
//! Lookup order: explicit key file (config, then `GOOGLE_APPLICATION_CREDENTIALS`),
//! the gcloud well-known file, then the metadata server.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::settings::CredentialsConfig;
use crate::credentials::authorized_user::{AuthorizedUser, AuthorizedUserTokenSource};
use crate::credentials::metadata::MetadataTokenSource;
use crate::credentials::service_account::{ServiceAccountKey, ServiceAccountTokenSource};
use crate::credentials::{CredentialSource, Credentials};
use crate::errors::CredentialError;
use crate::utils::constants::{
    CREDENTIALS_ENV, DEFAULT_METADATA_URL, METADATA_HOST_ENV, WELL_KNOWN_CREDENTIALS_FILE,
};

#[derive(Debug, PartialEq)]
enum KeyFilePath {
    Explicit(PathBuf),
    WellKnown(PathBuf),
}

/// Production [`CredentialSource`]. Holds no per-request state and may be shared across requests.
#[derive(Debug, Clone)]
pub struct DefaultCredentialSource {
    client: Client,
    credentials_file: Option<PathBuf>,
    metadata_url: Option<String>,
}

impl DefaultCredentialSource {
    pub fn new(client: Client, config: &CredentialsConfig) -> Self {
        Self {
            client,
            credentials_file: config.credentials_file.clone(),
            metadata_url: config.metadata_url.clone(),
        }
    }

    fn key_file_path(&self) -> Option<KeyFilePath> {
        if let Some(path) = &self.credentials_file {
            return Some(KeyFilePath::Explicit(path.clone()));
        }
        if let Ok(path) = std::env::var(CREDENTIALS_ENV) {
            return Some(KeyFilePath::Explicit(PathBuf::from(path)));
        }
        well_known_path().map(KeyFilePath::WellKnown)
    }

    /// Contents of the key file, or `None` when discovery should fall through to the metadata server.
    async fn read_key_file(&self) -> Result<Option<String>, CredentialError> {
        match self.key_file_path() {
            None => Ok(None),
            Some(KeyFilePath::Explicit(path)) => tokio::fs::read_to_string(&path)
                .await
                .map(Some)
                .map_err(|source| CredentialError::Io {
                    path: path.display().to_string(),
                    source,
                }),
            Some(KeyFilePath::WellKnown(path)) => match tokio::fs::read_to_string(&path).await {
                Ok(contents) => Ok(Some(contents)),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(source) => Err(CredentialError::Io {
                    path: path.display().to_string(),
                    source,
                }),
            },
        }
    }

    fn metadata_base_url(&self) -> String {
        self.metadata_url
            .clone()
            .or_else(|| std::env::var(METADATA_HOST_ENV).ok().map(|host| format!("http://{host}")))
            .unwrap_or_else(|| DEFAULT_METADATA_URL.to_string())
    }

    fn from_key_file(&self, contents: &str, scope: &str) -> Result<Credentials, CredentialError> {
        let json: Value = serde_json::from_str(contents)?;
        let cred_type = json
            .get("type")
            .and_then(Value::as_str)
            .ok_or(CredentialError::MissingField("type"))?;

        match cred_type {
            "service_account" => {
                let key: ServiceAccountKey = serde_json::from_value(json.clone())?;
                debug!("using service account key for {}", key.client_email);
                Ok(Credentials {
                    identity: Some(key.client_email.clone()),
                    project_id: key.project_id.clone(),
                    token_source: Arc::new(ServiceAccountTokenSource::new(self.client.clone(), key, scope)),
                })
            }
            "authorized_user" => {
                let user: AuthorizedUser = serde_json::from_value(json.clone())?;
                debug!("using authorized user credentials");
                Ok(Credentials {
                    identity: None,
                    project_id: user.quota_project_id.clone(),
                    token_source: Arc::new(AuthorizedUserTokenSource::new(self.client.clone(), user)),
                })
            }
            other => Err(CredentialError::UnsupportedType(other.to_owned())),
        }
    }

    async fn from_metadata_server(&self, scope: &str) -> Result<Credentials, CredentialError> {
        let source = MetadataTokenSource::new(self.client.clone(), &self.metadata_base_url(), scope);
        let email = source.service_account_email().await?;
        debug!("using metadata server credentials for {}", email);
        Ok(Credentials {
            identity: Some(email),
            project_id: None,
            token_source: Arc::new(source),
        })
    }
}

#[async_trait]
impl CredentialSource for DefaultCredentialSource {
    async fn find_default_credentials(&self, scope: &str) -> Result<Credentials, CredentialError> {
        match self.read_key_file().await? {
            Some(contents) => self.from_key_file(&contents, scope),
            None => self.from_metadata_server(scope).await,
        }
    }
}

#[cfg(target_os = "windows")]
fn well_known_path() -> Option<PathBuf> {
    std::env::var("APPDATA")
        .ok()
        .map(|root| PathBuf::from(root).join("gcloud").join(WELL_KNOWN_CREDENTIALS_FILE))
}

#[cfg(not(target_os = "windows"))]
fn well_known_path() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(|root| {
        PathBuf::from(root)
            .join(".config")
            .join("gcloud")
            .join(WELL_KNOWN_CREDENTIALS_FILE)
    })
}
