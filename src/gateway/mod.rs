// SPDX-License-Identifier: EUPL-1.2

//! Axum-based HTTP gateway: binds the loopback listener, assembles the
//! shared [`AppState`], and composes the control surface routes with the
//! catch-all proxy route underneath.

pub mod api;

use crate::config::Config;
use crate::error::ConfigError;
use crate::pii::Detector;
use crate::providers::ProviderRegistry;
use crate::vault::TokenVault;
use axum::http::{header, HeaderValue};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// State shared across every handler, cloned cheaply via `Arc` fields —
/// never a global singleton, so tests can stand up independent instances.
#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<Detector>,
    pub vault: Arc<TokenVault>,
    pub providers: Arc<ProviderRegistry>,
    pub config: Arc<Config>,
    pub started_at: Instant,
}

/// Build the state, assemble the router, bind the listener, and serve
/// until the process receives a shutdown signal.
pub async fn run_gateway(config: Config) -> anyhow::Result<()> {
    let crypto = crate::crypto::CryptoCore::load_or_create(&crate::crypto::master_key_path(&config.data_dir))?;
    let vault = TokenVault::open(&config.data_dir.join("vault.db"), crypto)?;
    let detector = Detector::new()?;

    let state = AppState {
        detector: Arc::new(detector),
        vault: Arc::new(vault),
        providers: Arc::new(ProviderRegistry::new()),
        config: Arc::new(config.clone()),
        started_at: Instant::now(),
    };

    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ));

    let app = Router::new()
        .route("/", get(api::control::root))
        .merge(api::routes())
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(config.upstream_timeout_secs)))
        .layer(TraceLayer::new_for_http())
        .layer(security_headers);

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .map_err(|source| ConfigError::Bind {
            addr: config.listen,
            source,
        })?;

    tracing::info!(addr = %config.listen, "privacyguardian listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
