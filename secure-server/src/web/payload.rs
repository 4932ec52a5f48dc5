//! Request body extraction for inbound webhook messages.

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    response::{IntoResponse, Response},
};
use serde_json::value::RawValue;
use tracing::warn;

use crate::error::ApiError;

/// An arbitrary JSON document taken verbatim from the request body.
///
/// The body is checked for syntax but kept as the original text, so echoing
/// it back does not reorder keys or reformat numbers. An empty body is
/// rejected. The `Content-Type` header is not consulted.
#[derive(Debug)]
pub struct WebhookPayload(pub Box<RawValue>);

#[async_trait]
impl<S> FromRequest<S> for WebhookPayload
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;

        if body.iter().all(u8::is_ascii_whitespace) {
            warn!("webhook_payload_empty");
            return Err(ApiError::MalformedPayload.into_response());
        }

        match serde_json::from_slice::<Box<RawValue>>(&body) {
            Ok(raw) => Ok(WebhookPayload(raw)),
            Err(err) => {
                warn!(
                    line = err.line(),
                    column = err.column(),
                    body_length = body.len(),
                    "webhook_payload_invalid_json"
                );
                Err(ApiError::MalformedPayload.into_response())
            }
        }
    }
}

/// Compact JSON with object keys sorted, used for the log record.
pub fn canonical_json(message: &RawValue) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(message.get())
        .and_then(|value| serde_json::to_string(&value))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(text: &str) -> Box<RawValue> {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_canonical_json_sorts_and_compacts() {
        let message = raw(r#"{ "b": [1, 2], "a": {"z": null, "y": "s"} }"#);
        assert_eq!(
            canonical_json(&message).unwrap(),
            r#"{"a":{"y":"s","z":null},"b":[1,2]}"#
        );
    }

    #[test]
    fn test_canonical_json_scalars() {
        assert_eq!(canonical_json(&raw("42")).unwrap(), "42");
        assert_eq!(canonical_json(&raw(r#""hi""#)).unwrap(), r#""hi""#);
        assert_eq!(canonical_json(&raw("null")).unwrap(), "null");
    }
}
