//! Credential sources
//!
//! The [`CredentialSource`] capability resolves ambient Google Cloud credentials for a scope.
//! The resolved [`Credentials`] carry a nested [`TokenSource`] which is asked separately for the
//! access token, so discovery and token retrieval fail independently.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;

use crate::errors::CredentialError;
use crate::helpers::time;

pub mod adc;
pub mod authorized_user;
pub mod metadata;
pub mod service_account;

pub use adc::DefaultCredentialSource;

/// An OAuth2 access token and the instant it stops being valid.
#[derive(Clone)]
pub struct AccessToken {
    pub value: String,
    pub expiry: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expiry: DateTime<Utc>) -> Self {
        Self { value: value.into(), expiry }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"redacted")
            .field("expiry", &self.expiry)
            .finish()
    }
}

#[async_trait]
pub trait TokenSource: Send + Sync + fmt::Debug {
    async fn token(&self) -> Result<AccessToken, CredentialError>;
}

/// Resolved credentials for one request. Never cached by the caller.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Principal the token is issued for, usually a service account email.
    pub identity: Option<String>,
    pub project_id: Option<String>,
    pub token_source: Arc<dyn TokenSource>,
}

impl Credentials {
    /// Subject claim: identity, else project id, else empty.
    pub fn subject(&self) -> &str {
        self.identity
            .as_deref()
            .or(self.project_id.as_deref())
            .unwrap_or_default()
    }
}

#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn find_default_credentials(&self, scope: &str) -> Result<Credentials, CredentialError>;
}

/// Body returned by Google token endpoints and the metadata server.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub expires_in: Option<i64>,
    #[allow(dead_code)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    pub fn into_access_token(self, fetched_at: DateTime<Utc>) -> AccessToken {
        AccessToken::new(
            self.access_token,
            time::expiry_from_expires_in(fetched_at, self.expires_in),
        )
    }
}

/// Sends the request and turns any non-2xx status into [`CredentialError::Endpoint`].
pub(crate) async fn send_checked(request: RequestBuilder, url: &str) -> Result<Response, CredentialError> {
    let response = request.send().await.map_err(|source| CredentialError::Transport {
        url: url.to_owned(),
        source,
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(CredentialError::Endpoint {
            url: url.to_owned(),
            status,
            body,
        });
    }
    Ok(response)
}

/// Fetches and decodes a token endpoint response.
pub(crate) async fn fetch_access_token(request: RequestBuilder, url: &str) -> Result<AccessToken, CredentialError> {
    let fetched_at = time::now();
    let response = send_checked(request, url).await?;
    let body = response.text().await.map_err(|source| CredentialError::Transport {
        url: url.to_owned(),
        source,
    })?;
    let parsed: TokenResponse = serde_json::from_str(&body)?;
    Ok(parsed.into_access_token(fetched_at))
}
