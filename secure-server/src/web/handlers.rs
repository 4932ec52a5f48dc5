//! Webhook endpoint handlers.
//!
//! Both handlers run only after the auth gate has accepted the request and
//! receive the caller's [`Principal`] as an argument.

use axum::{
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use serde_json::value::RawValue;
use tracing::info;

use crate::auth::Principal;
use crate::web::payload::{canonical_json, WebhookPayload};

/// Acknowledgement returned for every accepted webhook.
#[derive(Debug, Serialize)]
pub struct WebhookReceipt<'a> {
    pub status: &'static str,
    pub request: &'a RawValue,
}

/// `GET /` greets the authenticated caller.
pub async fn greet(Extension(principal): Extension<Principal>) -> String {
    format!("Welcome, {}", principal.name())
}

/// `POST /` logs the JSON body and echoes it back.
pub async fn receive_webhook(
    Extension(principal): Extension<Principal>,
    WebhookPayload(message): WebhookPayload,
) -> Response {
    // Canonicalization cannot fail for a body that already parsed; fall back
    // to the original text rather than skip the record.
    let logged = canonical_json(&message).unwrap_or_else(|| message.get().to_string());

    info!(
        subject = %principal.name(),
        payload = %logged,
        "webhook_received"
    );

    Json(WebhookReceipt {
        status: "received",
        request: &message,
    })
    .into_response()
}
