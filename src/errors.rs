use thiserror::Error;

/// Failures raised by credential sources and their token endpoints.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to read credentials file '{path}'")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse credentials: {0}")]
    Json(#[from] serde_json::Error),
    #[error("credentials are missing required field '{0}'")]
    MissingField(&'static str),
    #[error("unsupported credential type '{0}'")]
    UnsupportedType(String),
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} responded with status {status}: {body}")]
    Endpoint {
        url: String,
        status: http::StatusCode,
        body: String,
    },
    #[error("failed to sign service account assertion")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Why one token issuance request failed.
///
/// Every variant maps to the same client-visible outcome; the detail is for logs only.
#[derive(Debug, Error)]
pub enum IssueError {
    #[error("failed to find default credentials")]
    CredentialDiscovery(#[source] CredentialError),
    #[error("failed to retrieve access token from credentials")]
    TokenRetrieval(#[source] CredentialError),
    #[error("failed to serialize token")]
    Serialization(#[from] serde_json::Error),
}

impl IssueError {
    /// Metrics label for the failure point.
    pub fn reason(&self) -> &'static str {
        match self {
            IssueError::CredentialDiscovery(_) => "credential_discovery",
            IssueError::TokenRetrieval(_) => "token_retrieval",
            IssueError::Serialization(_) => "serialization",
        }
    }
}
