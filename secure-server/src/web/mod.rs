//! Web server module for the authenticated webhook endpoint.
//!
//! This module provides:
//! - `GET /`: greeting for the authenticated caller
//! - `POST /`: logs an arbitrary JSON body and echoes it in a receipt
//!
//! Every route, including unknown ones, sits behind the auth gate.

pub mod handlers;
pub mod payload;

use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::auth::{require_auth, AuthGate};

pub use handlers::{greet, receive_webhook, WebhookReceipt};
pub use payload::{canonical_json, WebhookPayload};

/// Build the application router.
///
/// Layer order, outermost first: tracing, auth gate, body limit. An
/// unauthenticated request is rejected before its body is read. axum's own
/// 2 MiB extractor limit is disabled so `max_body_bytes` is the only cap.
pub fn build_router(gate: AuthGate, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", get(greet).post(receive_webhook))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(middleware::from_fn_with_state(gate, require_auth))
        .layer(TraceLayer::new_for_http())
}
