//! Shared constants and invariants

pub const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_READ_TIMEOUT_SECONDS: u64 = 5;
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

// Application Default Credentials
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";
pub const WELL_KNOWN_CREDENTIALS_FILE: &str = "application_default_credentials.json";
pub const METADATA_HOST_ENV: &str = "GCE_METADATA_HOST";
pub const DEFAULT_METADATA_URL: &str = "http://metadata.google.internal";
pub const METADATA_FLAVOR_HEADER: &str = "Metadata-Flavor";
pub const METADATA_FLAVOR_VALUE: &str = "Google";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

// Compact token
pub const TOKEN_TYPE_BEARER: &str = "Bearer";
pub const COMPACT_TOKEN_TYP: &str = "JWT";
pub const COMPACT_TOKEN_ALG: &str = "GOOG_OAUTH2_TOKEN";
pub const COMPACT_TOKEN_ISSUER: &str = "Google";
