use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::fmt;

use crate::credentials::{fetch_access_token, AccessToken, TokenSource};
use crate::errors::CredentialError;
use crate::utils::constants::DEFAULT_TOKEN_URI;

/// `gcloud auth application-default login` credentials.
#[derive(Clone, Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub quota_project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for AuthorizedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedUser")
            .field("client_id", &self.client_id)
            .field("quota_project_id", &self.quota_project_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Refresh-token grant against `token_uri`.
#[derive(Debug, Clone)]
pub struct AuthorizedUserTokenSource {
    client: Client,
    user: AuthorizedUser,
}

impl AuthorizedUserTokenSource {
    pub fn new(client: Client, user: AuthorizedUser) -> Self {
        Self { client, user }
    }
}

#[async_trait]
impl TokenSource for AuthorizedUserTokenSource {
    async fn token(&self) -> Result<AccessToken, CredentialError> {
        let request = self.client.post(&self.user.token_uri).form(&[
            ("grant_type", "refresh_token"),
            ("client_id", self.user.client_id.as_str()),
            ("client_secret", self.user.client_secret.as_str()),
            ("refresh_token", self.user.refresh_token.as_str()),
        ]);
        fetch_access_token(request, &self.user.token_uri).await
    }
}
