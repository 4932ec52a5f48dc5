//! Caller-facing error taxonomy.
//!
//! Every failure a client can observe maps to one of these variants. Internal
//! detail (why a token was rejected) is logged where it happens and never
//! placed in the response.

use axum::{
    http::{header::WWW_AUTHENTICATE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// No token, or a token that failed verification.
    #[error("unauthenticated")]
    Unauthenticated { token_supplied: bool },

    /// Valid token without the required scope.
    #[error("forbidden: scope {required_scope} required")]
    Forbidden { required_scope: String },

    /// Request body is absent or not valid JSON.
    #[error("malformed payload")]
    MalformedPayload,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::MalformedPayload => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken => ApiError::Unauthenticated {
                token_supplied: false,
            },
            AuthError::InsufficientScope(required_scope) => ApiError::Forbidden { required_scope },
            _ => ApiError::Unauthenticated {
                token_supplied: true,
            },
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // RFC 6750 section 3 challenges.
        match self {
            ApiError::Unauthenticated {
                token_supplied: false,
            } => (status, [(WWW_AUTHENTICATE, "Bearer".to_string())]).into_response(),
            ApiError::Unauthenticated { .. } => (
                status,
                [(WWW_AUTHENTICATE, r#"Bearer error="invalid_token""#.to_string())],
            )
                .into_response(),
            ApiError::Forbidden { required_scope } => (
                status,
                [(
                    WWW_AUTHENTICATE,
                    format!(r#"Bearer error="insufficient_scope", scope="{required_scope}""#),
                )],
            )
                .into_response(),
            ApiError::MalformedPayload => (
                status,
                Json(ErrorBody {
                    status: "malformed_payload",
                }),
            )
                .into_response(),
        }
    }
}
