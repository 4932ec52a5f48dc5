//! Bearer token authentication for the webhook routes.
//!
//! Every request passes through [`require_auth`] before reaching a handler:
//! - Extract the `Authorization: Bearer <jwt>` header
//! - Verify signature, expiry, issuer and audience against the issuer's JWKS
//! - Check the required scope
//! - Attach the resulting [`Principal`] to the request
//!
//! ## Flow
//!
//! ```text
//! Request → bearer_token() → TokenVerifier → scope check → Extension<Principal> → handler
//! ```

pub mod claims;
pub mod error;
pub mod jwks;
pub mod middleware;
pub mod principal;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testing;

pub use claims::TokenClaims;
pub use error::AuthError;
pub use jwks::{discover_jwks_uri, Jwk, Jwks, JwksCache};
pub use middleware::{bearer_token, require_auth, AuthGate};
pub use principal::Principal;
pub use verifier::TokenVerifier;
