//! HTTP listener for the callback server
//!
//! Routes:
//!
//! - `GET /oauth-callback` -- the provider redirect target; always answers
//!   with a redirect to the host application
//! - `GET /health` -- liveness probe, independent of any OAuth state
//!
//! The listener binds its own port so the provider's registered redirect URI
//! stays fixed regardless of how the main application is routed.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{RawQuery, State};
use axum::response::Redirect;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::callback::{
    handle_callback, CallbackRequest, HostRedirect, HttpIdentityProvider, IdentityProvider,
    RequestContext,
};
use crate::config::Config;
use crate::error::{CallbackError, Result};

/// Service name reported by the health endpoint.
pub const SERVICE_NAME: &str = "oauth-callback";

/// Shared, read-only state for all requests.
#[derive(Clone)]
pub struct AppState {
    provider: Arc<dyn IdentityProvider>,
    redirect: Arc<HostRedirect>,
}

impl AppState {
    /// Creates state from an explicit provider and redirect builder.
    pub fn new(provider: Arc<dyn IdentityProvider>, redirect: HostRedirect) -> Self {
        Self {
            provider,
            redirect: Arc::new(redirect),
        }
    }

    /// Creates state for the HTTP provider described by `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client or host redirect cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = HttpIdentityProvider::new(&config.provider)?;
        let redirect = HostRedirect::new(&config.host.base_url, config.host.include_subject)?;
        Ok(Self::new(Arc::new(provider), redirect))
    }
}

/// Liveness probe body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `ok`
    pub status: &'static str,
    /// Always [`SERVICE_NAME`]
    pub service: &'static str,
}

/// Builds the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/oauth-callback", get(oauth_callback))
        .route("/health", get(health))
        .with_state(state)
}

async fn oauth_callback(State(state): State<AppState>, RawQuery(query): RawQuery) -> Redirect {
    let ctx = RequestContext::new();
    let request = CallbackRequest::from_query(query.as_deref());

    let redirected = handle_callback(
        &ctx,
        state.provider.as_ref(),
        state.redirect.as_ref(),
        request,
    )
    .await;

    Redirect::to(redirected.location.as_str())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
    })
}

/// Binds the listener and serves until Ctrl-C or SIGTERM.
///
/// In-flight callbacks complete before this returns.
///
/// # Errors
///
/// Returns [`CallbackError::Server`] if the address cannot be bound, or if
/// the server fails while running.
pub async fn serve(config: &Config) -> Result<()> {
    let state = AppState::from_config(config)?;

    if let Some(port) = config.metrics.listen_port {
        crate::callback::metrics::install_exporter(&config.server.host, port)?;
    }

    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port))
            .await
            .map_err(|e| {
                CallbackError::Server(format!(
                    "failed to bind {}:{}: {e}",
                    config.server.host, config.server.port
                ))
            })?;
    let addr: SocketAddr = listener
        .local_addr()
        .map_err(|e| CallbackError::Server(format!("failed to get local address: {e}")))?;

    tracing::info!(
        %addr,
        redirect_uri = %config.provider.redirect_uri,
        host = %config.host.base_url,
        "OAuth callback server listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| CallbackError::Server(format!("server error: {e}")))?;

    tracing::info!("OAuth callback server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining in-flight callbacks");
}
