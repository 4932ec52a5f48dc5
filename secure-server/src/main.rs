//! Secure Server - authenticated webhook receiver.
//!
//! Loads configuration from the environment, resolves the issuer's signing
//! keys and serves the webhook routes until SIGINT/SIGTERM.

use std::net::SocketAddr;

use anyhow::{ensure, Context, Result};
use reqwest::Client;
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use secure_server::auth::discover_jwks_uri;
use secure_server::{build_router, AuthGate, Config, JwksCache, TokenVerifier};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("secure_server_starting");

    // Load configuration
    let config = Config::from_env();
    ensure!(
        !config.issuer.is_empty(),
        "OKTA_OAUTH2_ISSUER must be set to the trusted token issuer"
    );
    info!(
        port = config.port,
        issuer = %config.issuer,
        audience = ?config.audience,
        required_scope = %config.required_scope,
        jwks_uri_configured = config.jwks_uri.is_some(),
        "config_loaded"
    );

    let client = Client::builder()
        .timeout(config.http_timeout())
        .build()
        .context("Failed to build HTTP client")?;

    // Resolve where the issuer publishes its signing keys
    let jwks_uri = match &config.jwks_uri {
        Some(uri) => uri.clone(),
        None => discover_jwks_uri(&client, &config.issuer)
            .await
            .context("Failed to discover JWKS URI from issuer")?,
    };
    info!(jwks_uri = %jwks_uri, "jwks_uri_resolved");

    let keys = JwksCache::remote(
        client,
        jwks_uri,
        config.jwks_cache_ttl(),
        config.jwks_refresh_min_interval(),
    );
    match keys.warm().await {
        Ok(count) => info!(keys = count, "jwks_prefetched"),
        Err(e) => warn!(error = %e, "jwks_prefetch_failed"),
    }

    let verifier = TokenVerifier::new(keys, config.issuer.clone())
        .with_audience(config.audience.clone())
        .with_leeway(config.clock_skew_secs);
    info!(issuer = %verifier.issuer(), "token_verifier_ready");
    let gate = AuthGate::new(verifier, config.required_scope.clone());
    info!(required_scope = %gate.required_scope(), "auth_gate_ready");

    // Build the router
    let app = build_router(gate, config.max_body_bytes);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "secure_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("secure_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "ctrl_c_handler_failed");
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
                warn!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("secure_server_shutting_down");
}
