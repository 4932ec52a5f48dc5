//! Token claims consumed after signature and time validation.
//!
//! `exp`, `nbf`, `iss` and `aud` are checked by `jsonwebtoken` itself; this
//! module only reads what the principal needs.

use std::collections::BTreeSet;

use serde::Deserialize;

use super::principal::Principal;

/// Claims read from a validated token.
///
/// Scopes come from `scope` (RFC 8693 style) and fall back to `scp` (Okta,
/// Azure AD). Either may be a space-delimited string or a list.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    #[serde(default)]
    scope: Option<ScopeClaim>,
    #[serde(default)]
    scp: Option<ScopeClaim>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ScopeClaim {
    Delimited(String),
    List(Vec<String>),
}

impl ScopeClaim {
    fn to_set(&self) -> BTreeSet<String> {
        match self {
            ScopeClaim::Delimited(s) => s.split_whitespace().map(String::from).collect(),
            ScopeClaim::List(v) => v
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        }
    }
}

impl TokenClaims {
    /// Scopes granted by the token. Empty when neither claim is present.
    pub fn scopes(&self) -> BTreeSet<String> {
        self.scope
            .as_ref()
            .or(self.scp.as_ref())
            .map(ScopeClaim::to_set)
            .unwrap_or_default()
    }

    pub fn into_principal(self) -> Principal {
        let scopes = self.scopes();
        Principal::new(self.sub, scopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> TokenClaims {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_scope_string_is_space_delimited() {
        let claims = parse(json!({"sub": "alice", "scope": "openid  mod_custom profile"}));
        let scopes = claims.scopes();

        assert_eq!(scopes.len(), 3);
        assert!(scopes.contains("mod_custom"));
    }

    #[test]
    fn test_scp_array() {
        let claims = parse(json!({"sub": "alice", "scp": ["mod_custom", "email"]}));
        assert!(claims.scopes().contains("mod_custom"));
    }

    #[test]
    fn test_scope_takes_precedence_over_scp() {
        let claims = parse(json!({"sub": "alice", "scope": "email", "scp": ["mod_custom"]}));
        let scopes = claims.scopes();

        assert!(scopes.contains("email"));
        assert!(!scopes.contains("mod_custom"));
    }

    #[test]
    fn test_missing_scopes_is_empty() {
        let principal = parse(json!({"sub": "alice", "exp": 1})).into_principal();

        assert_eq!(principal.name(), "alice");
        assert!(principal.scopes().is_empty());
    }

    #[test]
    fn test_sub_is_required() {
        let result: Result<TokenClaims, _> = serde_json::from_value(json!({"scope": "x"}));
        assert!(result.is_err());
    }
}
