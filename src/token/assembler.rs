use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credentials::{AccessToken, Credentials};
use crate::errors::IssueError;
use crate::helpers::time;
use crate::token::encoding::{b64_encode, encode_segment};
use crate::utils::constants::{COMPACT_TOKEN_ALG, COMPACT_TOKEN_ISSUER, COMPACT_TOKEN_TYP, TOKEN_TYPE_BEARER};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactHeader {
    pub typ: String,
    pub alg: String,
}

impl Default for CompactHeader {
    fn default() -> Self {
        Self {
            typ: COMPACT_TOKEN_TYP.to_string(),
            alg: COMPACT_TOKEN_ALG.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    /// Always present; empty when the credentials carry no identity.
    pub sub: String,
}

/// JSON body returned to the broker client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenEnvelope {
    pub access_token: String,
    pub token_type: String,
    /// Seconds until the upstream token expires. Negative when it already has.
    pub expires_in: i64,
}

/// Fetches the access token from `credentials` and assembles the envelope at the current time.
pub async fn assemble(credentials: &Credentials) -> Result<TokenEnvelope, IssueError> {
    let token = credentials
        .token_source
        .token()
        .await
        .map_err(IssueError::TokenRetrieval)?;

    build_envelope(credentials.subject(), &token, time::now())
}

/// Assembles `header.claims.token` for `token` as seen at `now`.
pub fn build_envelope(subject: &str, token: &AccessToken, now: DateTime<Utc>) -> Result<TokenEnvelope, IssueError> {
    let claims = Claims {
        exp: token.expiry.timestamp(),
        iat: now.timestamp(),
        iss: COMPACT_TOKEN_ISSUER.to_string(),
        sub: subject.to_string(),
    };

    let compact = format!(
        "{}.{}.{}",
        encode_segment(&CompactHeader::default())?,
        encode_segment(&claims)?,
        b64_encode(&token.value)
    );

    Ok(TokenEnvelope {
        access_token: compact,
        token_type: TOKEN_TYPE_BEARER.to_string(),
        expires_in: claims.exp - claims.iat,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::TokenSource;
    use crate::errors::CredentialError;
    use async_trait::async_trait;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use chrono::Duration;
    use serde::de::DeserializeOwned;
    use std::sync::Arc;

    fn decode<T: DeserializeOwned>(segment: &str) -> T {
        let bytes = URL_SAFE_NO_PAD.decode(segment).expect("base64url segment");
        serde_json::from_slice(&bytes).expect("json segment")
    }

    fn at(ts: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(ts, 0).unwrap()
    }

    #[test]
    fn produces_three_unpadded_segments() {
        let token = AccessToken::new("tok123", at(1_700_003_600));
        let envelope = build_envelope("svc@example.com", &token, at(1_700_000_000)).unwrap();

        let segments: Vec<&str> = envelope.access_token.split('.').collect();
        assert_eq!(segments.len(), 3);
        for segment in &segments {
            assert!(!segment.is_empty());
            assert!(!segment.contains('='));
        }

        let header: serde_json::Value = decode(segments[0]);
        assert_eq!(header, serde_json::json!({ "typ": "JWT", "alg": "GOOG_OAUTH2_TOKEN" }));

        let raw = URL_SAFE_NO_PAD.decode(segments[2]).unwrap();
        assert_eq!(raw, b"tok123");
    }

    #[test]
    fn claims_reflect_expiry_and_assembly_time() {
        let now = at(1_700_000_000);
        let token = AccessToken::new("tok123", now + Duration::seconds(3600));
        let envelope = build_envelope("svc@example.com", &token, now).unwrap();

        let claims: Claims = decode(envelope.access_token.split('.').nth(1).unwrap());
        assert_eq!(
            claims,
            Claims {
                exp: 1_700_003_600,
                iat: 1_700_000_000,
                iss: "Google".into(),
                sub: "svc@example.com".into(),
            }
        );
        assert_eq!(envelope.expires_in, 3600);
        assert_eq!(envelope.token_type, "Bearer");
    }

    #[test]
    fn empty_subject_is_kept_as_empty_string() {
        let token = AccessToken::new("tok", at(1_700_000_100));
        let envelope = build_envelope("", &token, at(1_700_000_000)).unwrap();

        let claims: serde_json::Value = decode(envelope.access_token.split('.').nth(1).unwrap());
        assert_eq!(claims["sub"], "");
    }

    #[test]
    fn expired_token_yields_negative_lifetime() {
        let now = at(1_700_000_000);
        let token = AccessToken::new("stale", now - Duration::seconds(90));
        let envelope = build_envelope("svc", &token, now).unwrap();

        assert_eq!(envelope.expires_in, -90);
    }

    #[test]
    fn zero_value_expiry_is_not_clamped() {
        let token = AccessToken::new("tok", DateTime::<Utc>::default());
        let envelope = build_envelope("svc", &token, at(1_700_000_000)).unwrap();

        assert_eq!(envelope.expires_in, -1_700_000_000);
    }

    #[test]
    fn envelope_serializes_with_wire_field_names() {
        let token = AccessToken::new("tok", at(1_700_000_060));
        let envelope = build_envelope("svc", &token, at(1_700_000_000)).unwrap();
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["token_type"], "Bearer");
        assert_eq!(json["expires_in"], 60);
        assert!(json["access_token"].is_string());
    }

    #[derive(Debug)]
    struct Fixed(Result<(), ()>);

    #[async_trait]
    impl TokenSource for Fixed {
        async fn token(&self) -> Result<AccessToken, CredentialError> {
            match self.0 {
                Ok(()) => Ok(AccessToken::new("tok", time::now() + Duration::seconds(3600))),
                Err(()) => Err(CredentialError::MissingField("access_token")),
            }
        }
    }

    #[tokio::test]
    async fn assemble_uses_current_time() {
        let credentials = Credentials {
            identity: Some("svc@example.com".into()),
            project_id: None,
            token_source: Arc::new(Fixed(Ok(()))),
        };

        let before = time::now_i64();
        let envelope = assemble(&credentials).await.unwrap();
        let claims: Claims = decode(envelope.access_token.split('.').nth(1).unwrap());

        assert!(claims.iat >= before && claims.iat <= time::now_i64());
        assert!((envelope.expires_in - 3600).abs() <= 1);
        assert_eq!(envelope.expires_in, claims.exp - claims.iat);
    }

    #[tokio::test]
    async fn assemble_reports_token_retrieval_failure() {
        let credentials = Credentials {
            identity: None,
            project_id: None,
            token_source: Arc::new(Fixed(Err(()))),
        };

        let err = assemble(&credentials).await.unwrap_err();
        assert!(matches!(err, IssueError::TokenRetrieval(_)));
    }
}
