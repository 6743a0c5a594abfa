//! Compact token assembly.
//!
//! Repackages an OAuth2 access token into three dot-joined base64url segments
//! (header, claims, raw access token) for SASL/OAUTHBEARER clients.

pub mod assembler;
pub mod encoding;

pub use assembler::{assemble, build_envelope, Claims, CompactHeader, TokenEnvelope};
