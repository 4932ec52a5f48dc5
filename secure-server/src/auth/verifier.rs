//! JWT verification against the trusted issuer.

use jsonwebtoken::{decode, decode_header, Validation};
use tracing::debug;

use super::claims::TokenClaims;
use super::error::AuthError;
use super::jwks::JwksCache;
use super::principal::Principal;

/// Default leeway for `exp` and `nbf`, matching common resource servers.
pub const DEFAULT_LEEWAY_SECS: u64 = 60;

/// Verifies bearer tokens and turns them into [`Principal`]s.
///
/// Checks, in order: header decodes, a signing key for the header exists,
/// the signature verifies, `exp`/`nbf` hold, `iss` matches and (if
/// configured) `aud` contains the expected audience.
pub struct TokenVerifier {
    keys: JwksCache,
    issuer: String,
    audience: Option<String>,
    leeway_secs: u64,
}

impl TokenVerifier {
    pub fn new(keys: JwksCache, issuer: impl Into<String>) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            audience: None,
            leeway_secs: DEFAULT_LEEWAY_SECS,
        }
    }

    pub fn with_audience(mut self, audience: Option<String>) -> Self {
        self.audience = audience;
        self
    }

    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub async fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let header = decode_header(token).map_err(|err| AuthError::Malformed(err.to_string()))?;
        let key = self.keys.key_for(header.kid.as_deref(), header.alg).await?;

        let mut validation = Validation::new(header.alg);
        validation.leeway = self.leeway_secs;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.set_issuer(&[self.issuer.as_str()]);
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience.as_str()]),
            None => validation.validate_aud = false,
        }

        let data = decode::<TokenClaims>(token, &key, &validation)?;
        let principal = data.claims.into_principal();

        debug!(
            subject = %principal.name(),
            kid = ?header.kid,
            scopes = principal.scopes().len(),
            "token_verified"
        );

        Ok(principal)
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::errors::ErrorKind;
    use jsonwebtoken::get_current_timestamp;

    use super::*;
    use crate::auth::testing::{
        claims, mint, mint_with, static_jwks, verifier, AUDIENCE, ISSUER, KID, SECRET,
    };

    fn rejected_kind(result: Result<Principal, AuthError>) -> ErrorKind {
        match result {
            Err(AuthError::Rejected(err)) => err.into_kind(),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_valid_token() {
        let token = mint(&claims("alice@example.com", "openid mod_custom"));
        let principal = verifier().verify(&token).await.unwrap();

        assert_eq!(principal.name(), "alice@example.com");
        assert!(principal.has_scope("mod_custom"));
        assert!(principal.has_scope("openid"));
    }

    #[tokio::test]
    async fn test_garbage_token_is_malformed() {
        let result = verifier().verify("not-a-jwt").await;
        assert!(matches!(result, Err(AuthError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_wrong_secret_fails_signature() {
        let token = mint_with(&claims("alice", "mod_custom"), KID, b"some-other-secret");
        let kind = rejected_kind(verifier().verify(&token).await);
        assert!(matches!(kind, ErrorKind::InvalidSignature));
    }

    #[tokio::test]
    async fn test_expired_token() {
        let mut expired = claims("alice", "mod_custom");
        expired["exp"] = (get_current_timestamp() - 3600).into();

        let kind = rejected_kind(verifier().verify(&mint(&expired)).await);
        assert!(matches!(kind, ErrorKind::ExpiredSignature));
    }

    #[tokio::test]
    async fn test_expiry_within_leeway_is_accepted() {
        let mut recent = claims("alice", "mod_custom");
        recent["exp"] = (get_current_timestamp() - 10).into();

        assert!(verifier().verify(&mint(&recent)).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_exp_is_rejected() {
        let mut no_exp = claims("alice", "mod_custom");
        no_exp.as_object_mut().unwrap().remove("exp");

        let kind = rejected_kind(verifier().verify(&mint(&no_exp)).await);
        assert!(matches!(kind, ErrorKind::MissingRequiredClaim(_)));
    }

    #[tokio::test]
    async fn test_not_yet_valid() {
        let mut future = claims("alice", "mod_custom");
        future["nbf"] = (get_current_timestamp() + 3600).into();

        let kind = rejected_kind(verifier().verify(&mint(&future)).await);
        assert!(matches!(kind, ErrorKind::ImmatureSignature));
    }

    #[tokio::test]
    async fn test_wrong_issuer() {
        let mut foreign = claims("alice", "mod_custom");
        foreign["iss"] = "https://evil.example.com".into();

        let kind = rejected_kind(verifier().verify(&mint(&foreign)).await);
        assert!(matches!(kind, ErrorKind::InvalidIssuer));
    }

    #[tokio::test]
    async fn test_wrong_audience() {
        let mut other = claims("alice", "mod_custom");
        other["aud"] = "api://other".into();

        let kind = rejected_kind(verifier().verify(&mint(&other)).await);
        assert!(matches!(kind, ErrorKind::InvalidAudience));
    }

    #[tokio::test]
    async fn test_audience_check_can_be_disabled() {
        let mut other = claims("alice", "mod_custom");
        other["aud"] = "api://other".into();

        let verifier = TokenVerifier::new(JwksCache::from_static(static_jwks()), ISSUER);
        assert!(verifier.verify(&mint(&other)).await.is_ok());
    }

    #[tokio::test]
    async fn test_audience_list() {
        let mut listed = claims("alice", "mod_custom");
        listed["aud"] = serde_json::json!(["api://other", AUDIENCE]);

        assert!(verifier().verify(&mint(&listed)).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_kid() {
        let token = mint_with(&claims("alice", "mod_custom"), "unknown", SECRET);
        let result = verifier().verify(&token).await;
        assert!(matches!(result, Err(AuthError::UnknownKey(Some(_)))));
    }
}
