//! The auth gate: an axum middleware placed in front of every route.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use super::error::AuthError;
use super::principal::Principal;
use super::verifier::TokenVerifier;
use crate::error::ApiError;

/// Verifier plus the scope every request must carry.
#[derive(Clone)]
pub struct AuthGate {
    verifier: Arc<TokenVerifier>,
    required_scope: Arc<str>,
}

impl AuthGate {
    pub fn new(verifier: TokenVerifier, required_scope: impl Into<String>) -> Self {
        Self {
            verifier: Arc::new(verifier),
            required_scope: Arc::from(required_scope.into()),
        }
    }

    pub fn required_scope(&self) -> &str {
        &self.required_scope
    }

    /// Authenticate a request from its headers.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let token = bearer_token(headers)?;
        let principal = self.verifier.verify(token).await?;

        if !principal.has_scope(&self.required_scope) {
            return Err(AuthError::InsufficientScope(self.required_scope.to_string()));
        }

        Ok(principal)
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// A missing header or a different scheme counts as no token at all. A
/// bearer header with no usable token is malformed.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::Malformed("authorization header is not ASCII".into()))?;

    let (scheme, token) = value.trim().split_once(' ').unwrap_or((value.trim(), ""));
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MissingToken);
    }

    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(AuthError::Malformed("bearer token is empty or contains spaces".into()));
    }

    Ok(token)
}

/// Middleware that rejects unauthenticated or under-scoped requests and
/// hands the [`Principal`] to the handler through request extensions.
pub async fn require_auth(State(gate): State<AuthGate>, mut req: Request, next: Next) -> Response {
    match gate.authenticate(req.headers()).await {
        Ok(principal) => {
            debug!(subject = %principal.name(), path = %req.uri().path(), "request_authenticated");
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        Err(err) => {
            warn!(
                error = %err,
                forbidden = err.is_forbidden(),
                method = %req.method(),
                path = %req.uri().path(),
                "request_rejected"
            );
            ApiError::from(err).into_response()
        }
    }
}
