use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::config::settings::SettingsConfig;
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;
use crate::server::handler::{issue_token, AuthHandler};

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
    pub auth_handler: Arc<AuthHandler>,
}

impl AppState {
    pub fn new(metrics: &Metrics, auth_handler: AuthHandler) -> Self {
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
            auth_handler: Arc::new(auth_handler),
        }
    }
}

/// Metrics route when enabled; every other request falls through to the token handler.
pub fn router(settings_config: &SettingsConfig, state: AppState) -> Router {
    Router::new()
        .merge(state.metrics_state.router(&settings_config.metrics))
        .fallback(issue_token)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `host:port` and serve until Ctrl+C / SIGTERM.
pub async fn start(settings_config: &SettingsConfig, auth_handler: AuthHandler) -> Result<()> {
    let metrics = get_metrics().await;
    let state = AppState::new(metrics, auth_handler);
    let app = router(settings_config, state);

    let bind_addr = format!(
        "{}:{}",
        settings_config.server.host, settings_config.server.port
    );
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("Starting server listening at {}", bind_addr);

    let read_timeout = Duration::from_secs(settings_config.server.read_timeout_seconds);
    metrics.up.set(1);
    serve(listener, app, read_timeout, shutdown_signal()).await;
    metrics.up.set(0);

    Ok(())
}

/// Accept connections until `shutdown` resolves, then drain the open ones.
///
/// `read_timeout` bounds how long a client may take to send its request headers.
/// Handlers themselves run to completion.
pub async fn serve<F>(listener: TcpListener, app: Router, read_timeout: Duration, shutdown: F)
where
    F: Future<Output = ()> + Send,
{
    let mut builder = Builder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(read_timeout);

    let (drain_tx, drain_rx) = watch::channel(());
    let mut connections = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("accept failed: {}", e);
                    continue;
                }
            },
            () = &mut shutdown => break,
        };

        let builder = builder.clone();
        let service = TowerToHyperService::new(app.clone());
        let mut drain_rx = drain_rx.clone();
        connections.spawn(async move {
            let conn = builder.serve_connection(TokioIo::new(stream), service);
            tokio::pin!(conn);
            let result = tokio::select! {
                res = conn.as_mut() => res,
                _ = drain_rx.changed() => {
                    conn.as_mut().graceful_shutdown();
                    conn.await
                }
            };
            if let Err(e) = result {
                debug!("connection from {} closed: {}", peer, e);
            }
        });
        while connections.try_join_next().is_some() {}
    }

    drop(listener);
    let _ = drain_tx.send(());
    while connections.join_next().await.is_some() {}
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
