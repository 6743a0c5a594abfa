use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::credentials::{fetch_access_token, AccessToken, TokenSource};
use crate::errors::CredentialError;
use crate::helpers::time;
use crate::utils::constants::{DEFAULT_TOKEN_URI, JWT_BEARER_GRANT_TYPE};

const ASSERTION_LIFETIME_SECONDS: i64 = 3600;

/// Subset of a service account JSON key file needed to sign an assertion.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    pub private_key_id: Option<String>,
    pub project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"redacted")
            .field("private_key_id", &self.private_key_id)
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Exchanges a self-signed RS256 assertion for an access token at `token_uri`.
#[derive(Debug, Clone)]
pub struct ServiceAccountTokenSource {
    client: Client,
    key: ServiceAccountKey,
    scope: String,
}

impl ServiceAccountTokenSource {
    pub fn new(client: Client, key: ServiceAccountKey, scope: &str) -> Self {
        Self {
            client,
            key,
            scope: scope.to_owned(),
        }
    }

    fn signed_assertion(&self) -> Result<String, CredentialError> {
        let iat = time::now_i64();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: &self.scope,
            aud: &self.key.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECONDS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())?;
        Ok(encode(&header, &claims, &key)?)
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn token(&self) -> Result<AccessToken, CredentialError> {
        let assertion = self.signed_assertion()?;
        let request = self.client.post(&self.key.token_uri).form(&[
            ("grant_type", JWT_BEARER_GRANT_TYPE),
            ("assertion", assertion.as_str()),
        ]);
        fetch_access_token(request, &self.key.token_uri).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    const TEST_KEY: &str = include_str!("../../fixtures/service_account_key.pem");

    fn key(token_uri: String) -> ServiceAccountKey {
        ServiceAccountKey {
            client_email: "svc@project.iam.gserviceaccount.com".into(),
            private_key: TEST_KEY.into(),
            private_key_id: Some("key-1".into()),
            project_id: Some("project".into()),
            token_uri,
        }
    }

    #[tokio::test]
    async fn exchanges_signed_assertion_for_token() {
        let server = MockServer::start_async().await;
        let token_mock = server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!({
                    "access_token": "sa-token",
                    "expires_in": 3600,
                    "token_type": "Bearer"
                }));
        });

        let source = ServiceAccountTokenSource::new(Client::new(), key(server.url("/token")), "scope-a");
        let token = source.token().await.expect("service account token");

        token_mock.assert_async().await;
        assert_eq!(token.value, "sa-token");
        assert!(token.expiry.timestamp() > time::now_i64());
    }

    #[test]
    fn assertion_carries_kid_and_issuer() {
        let source = ServiceAccountTokenSource::new(Client::new(), key("https://example.test/token".into()), "scope-a");
        let assertion = source.signed_assertion().expect("signed");

        let header = jsonwebtoken::decode_header(&assertion).expect("header");
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.kid.as_deref(), Some("key-1"));
        assert_eq!(assertion.split('.').count(), 3);
    }

    #[tokio::test]
    async fn malformed_private_key_fails_retrieval() {
        let mut bad = key("https://example.test/token".into());
        bad.private_key = "not a pem".into();
        let source = ServiceAccountTokenSource::new(Client::new(), bad, "scope-a");

        assert!(matches!(source.token().await, Err(CredentialError::Signing(_))));
    }

    #[test]
    fn key_file_defaults_token_uri() {
        let key: ServiceAccountKey = serde_json::from_value(json!({
            "type": "service_account",
            "client_email": "svc@example.com",
            "private_key": "pem"
        }))
        .unwrap();
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
        assert!(!format!("{key:?}").contains("pem\""));
    }
}
