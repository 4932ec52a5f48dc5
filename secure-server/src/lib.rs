//! Secure Server - OAuth2-protected webhook receiver.
//!
//! Two routes at `/`, both requiring a bearer JWT from the trusted issuer
//! with the configured scope:
//! - `GET /`: greets the authenticated principal
//! - `POST /`: logs the JSON body and echoes it in a receipt
//!
//! ## Architecture
//!
//! ```text
//! Request → Auth Gate (401/403) → Webhook Handler → Response
//!                ↑
//!            JWKS cache ← issuer
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod web;

// Re-export commonly used types
pub use auth::{AuthGate, JwksCache, Principal, TokenVerifier};
pub use config::Config;
pub use error::ApiError;
pub use web::build_router;
