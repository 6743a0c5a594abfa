pub use axum::Router;
pub use tokio::task::JoinHandle;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::settings::SettingsConfig;
use crate::credentials::{AccessToken, CredentialSource, Credentials, TokenSource};
use crate::errors::CredentialError;
use crate::observability::metrics::get_metrics;
use crate::server::handler::AuthHandlerBuilder;
use crate::server::server::{router, serve, AppState};

/// Serve `router` on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router, read_timeout: Duration) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(serve(listener, router, read_timeout, std::future::pending()));
    (handle, addr)
}

/// Full service router around `source`, served on an ephemeral port.
pub async fn spawn_service(source: Arc<dyn CredentialSource>, settings: &SettingsConfig) -> (JoinHandle<()>, SocketAddr) {
    let handler = AuthHandlerBuilder::new().with_credential_source(source).build();
    let state = AppState::new(get_metrics().await, handler);
    let read_timeout = Duration::from_secs(settings.server.read_timeout_seconds);
    spawn_axum(router(settings, state), read_timeout).await
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

#[derive(Debug)]
pub struct StaticTokenSource {
    pub value: String,
    pub expiry: DateTime<Utc>,
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn token(&self) -> Result<AccessToken, CredentialError> {
        Ok(AccessToken::new(self.value.clone(), self.expiry))
    }
}

/// Takes `delay` before handing out a token valid for an hour.
#[derive(Debug)]
pub struct SlowTokenSource {
    pub delay: Duration,
}

#[async_trait]
impl TokenSource for SlowTokenSource {
    async fn token(&self) -> Result<AccessToken, CredentialError> {
        tokio::time::sleep(self.delay).await;
        Ok(AccessToken::new("slow", Utc::now() + chrono::Duration::seconds(3600)))
    }
}

#[derive(Debug)]
pub struct FailingTokenSource;

#[async_trait]
impl TokenSource for FailingTokenSource {
    async fn token(&self) -> Result<AccessToken, CredentialError> {
        Err(CredentialError::MissingField("access_token"))
    }
}

/// Returns the same credentials on every call and counts invocations.
pub struct StaticCredentialSource {
    pub identity: Option<String>,
    pub token_source: Arc<dyn TokenSource>,
    pub calls: AtomicUsize,
    pub requested_scopes: std::sync::Mutex<Vec<String>>,
}

impl StaticCredentialSource {
    pub fn new(identity: Option<&str>, token_source: Arc<dyn TokenSource>) -> Self {
        Self {
            identity: identity.map(str::to_owned),
            token_source,
            calls: AtomicUsize::new(0),
            requested_scopes: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialSource for StaticCredentialSource {
    async fn find_default_credentials(&self, scope: &str) -> Result<Credentials, CredentialError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested_scopes.lock().unwrap().push(scope.to_owned());
        Ok(Credentials {
            identity: self.identity.clone(),
            project_id: None,
            token_source: self.token_source.clone(),
        })
    }
}

pub struct FailingCredentialSource;

#[async_trait]
impl CredentialSource for FailingCredentialSource {
    async fn find_default_credentials(&self, _scope: &str) -> Result<Credentials, CredentialError> {
        Err(CredentialError::UnsupportedType("no ambient identity".into()))
    }
}
