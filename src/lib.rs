//! # GCP Kafka Auth
//!
//! HTTP bridge that turns ambient Google Cloud credentials into SASL/OAUTHBEARER-shaped
//! bearer tokens for Kafka clients.
//!
//! Modules:
//! - `credentials` — credential source capability and Application Default Credentials
//! - `token` — compact token assembly and encoding
//! - `server` — axum hosting and the token request handler
//! - `config` — service configuration, loading and validation
//! - `observability` — prometheus metrics

pub mod config;
pub mod credentials;
pub mod errors;
pub mod helpers;
pub mod observability;
pub mod server;
pub mod token;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::config::settings::ServiceConfig;
pub use crate::credentials::{AccessToken, CredentialSource, Credentials, TokenSource};
pub use crate::errors::{CredentialError, IssueError};
pub use crate::token::TokenEnvelope;
