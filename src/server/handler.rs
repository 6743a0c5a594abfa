//! Token issuance handler.
//!
//! One request: find default credentials for the configured scope, assemble the compact token,
//! write the JSON envelope. Either failure point ends the request with a bare 500.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use http::header::CONTENT_TYPE;
use http::StatusCode;
use reqwest::Client;
use tokio::time::Instant;
use tracing::{debug, error};

use crate::config::settings::CredentialsConfig;
use crate::credentials::{CredentialSource, DefaultCredentialSource};
use crate::errors::IssueError;
use crate::observability::metrics::{get_metrics, OUTCOME_FAILURE, OUTCOME_SUCCESS};
use crate::server::server::AppState;
use crate::token;

const APPLICATION_JSON: &str = "application/json";

pub struct AuthHandler {
    credential_source: Arc<dyn CredentialSource>,
    scope: String,
}

/// Builds an [`AuthHandler`].
///
/// Without an explicit credential source the handler uses [`DefaultCredentialSource`]
/// configured from [`CredentialsConfig`] (defaults when none was given).
#[derive(Default)]
pub struct AuthHandlerBuilder {
    credential_source: Option<Arc<dyn CredentialSource>>,
    credentials_config: CredentialsConfig,
    scope: Option<String>,
}

impl AuthHandlerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials_config(mut self, config: &CredentialsConfig) -> Self {
        self.credentials_config = config.clone();
        self
    }

    pub fn with_credential_source(mut self, source: Arc<dyn CredentialSource>) -> Self {
        self.credential_source = Some(source);
        self
    }

    /// Overrides `credentials.scope`.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn build(self) -> AuthHandler {
        let credentials_config = self.credentials_config;
        let credential_source = self.credential_source.unwrap_or_else(|| {
            Arc::new(DefaultCredentialSource::new(Client::new(), &credentials_config))
        });
        AuthHandler {
            credential_source,
            scope: self.scope.unwrap_or(credentials_config.scope),
        }
    }
}

impl AuthHandler {
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Serialized envelope for one request.
    pub async fn issue(&self) -> Result<Vec<u8>, IssueError> {
        let credentials = self
            .credential_source
            .find_default_credentials(&self.scope)
            .await
            .map_err(IssueError::CredentialDiscovery)?;

        let envelope = token::assemble(&credentials).await?;
        debug!(
            "issued token, sub: '{}', expires_in: {}",
            credentials.subject(),
            envelope.expires_in
        );
        get_metrics().await.token_expires_in.set(envelope.expires_in);

        Ok(serde_json::to_vec(&envelope)?)
    }

    pub async fn respond(&self) -> Response {
        let metrics = get_metrics().await;
        let start = Instant::now();
        let result = self.issue().await;
        metrics
            .token_issue_duration
            .observe(start.elapsed().as_secs_f64());

        match result {
            Ok(body) => {
                metrics.token_requests.with_label_values(&[OUTCOME_SUCCESS]).inc();
                (StatusCode::OK, [(CONTENT_TYPE, APPLICATION_JSON)], body).into_response()
            }
            Err(e) => {
                metrics.token_requests.with_label_values(&[OUTCOME_FAILURE]).inc();
                metrics.token_failures.with_label_values(&[e.reason()]).inc();
                error!("token issuance failed: {:#}", anyhow::Error::new(e));
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    [(CONTENT_TYPE, APPLICATION_JSON)],
                    Body::empty(),
                )
                    .into_response()
            }
        }
    }
}

/// Router fallback: every method and path not claimed by another route issues a token.
pub async fn issue_token(State(state): State<AppState>) -> Response {
    state.auth_handler.respond().await
}
