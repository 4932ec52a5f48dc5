//! Reasons a request fails authentication.
//!
//! These carry internal detail for the log. Callers only ever see the
//! status mapping in [`crate::error::ApiError`].

use jsonwebtoken::Algorithm;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no bearer token in request")]
    MissingToken,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("no signing key matches kid {0:?}")]
    UnknownKey(Option<String>),

    #[error("algorithm {0:?} is not allowed for the signing key")]
    AlgorithmMismatch(Algorithm),

    #[error("signing key unusable: {0}")]
    InvalidKey(String),

    #[error("key set unavailable: {0}")]
    KeySetUnavailable(String),

    #[error("token rejected: {0}")]
    Rejected(#[from] jsonwebtoken::errors::Error),

    #[error("token lacks required scope {0}")]
    InsufficientScope(String),
}

impl AuthError {
    /// True when the token itself was valid but not authorized.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, AuthError::InsufficientScope(_))
    }
}
