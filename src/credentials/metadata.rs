use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::credentials::{fetch_access_token, send_checked, AccessToken, TokenSource};
use crate::errors::CredentialError;
use crate::utils::constants::{METADATA_FLAVOR_HEADER, METADATA_FLAVOR_VALUE};

const SERVICE_ACCOUNT_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default";

/// Token source backed by the GCE/GKE/Cloud Run metadata server.
#[derive(Debug, Clone)]
pub struct MetadataTokenSource {
    client: Client,
    base_url: String,
    scope: String,
}

impl MetadataTokenSource {
    pub fn new(client: Client, base_url: &str, scope: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            scope: scope.to_owned(),
        }
    }

    fn token_url(&self) -> String {
        format!("{}{}/token", self.base_url, SERVICE_ACCOUNT_PATH)
    }

    fn email_url(&self) -> String {
        format!("{}{}/email", self.base_url, SERVICE_ACCOUNT_PATH)
    }

    /// Email of the default service account. Doubles as the probe that a metadata server exists.
    pub async fn service_account_email(&self) -> Result<String, CredentialError> {
        let url = self.email_url();
        let request = self
            .client
            .get(&url)
            .header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR_VALUE);
        let response = send_checked(request, &url).await?;
        let email = response
            .text()
            .await
            .map_err(|source| CredentialError::Transport { url, source })?;
        Ok(email.trim().to_owned())
    }
}

#[async_trait]
impl TokenSource for MetadataTokenSource {
    async fn token(&self) -> Result<AccessToken, CredentialError> {
        let url = self.token_url();
        debug!("requesting metadata server token, scope: {}", self.scope);
        let request = self
            .client
            .get(&url)
            .query(&[("scopes", self.scope.as_str())])
            .header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR_VALUE);
        fetch_access_token(request, &url).await
    }
}
