//! Keys, token minting and a throwaway HTTP server for tests.

use axum::Router;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{encode, get_current_timestamp, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use super::{Jwks, JwksCache, TokenVerifier};

pub const ISSUER: &str = "https://issuer.example.com/oauth2/default";
pub const AUDIENCE: &str = "api://default";
pub const KID: &str = "test-key-1";
pub const SECRET: &[u8] = b"webhook-test-signing-secret-0123456789";

pub fn oct_jwk(kid: &str, secret: &[u8]) -> Value {
    json!({
        "kty": "oct",
        "kid": kid,
        "alg": "HS256",
        "use": "sig",
        "k": URL_SAFE_NO_PAD.encode(secret),
    })
}

pub fn static_jwks() -> Jwks {
    serde_json::from_value(json!({ "keys": [oct_jwk(KID, SECRET)] })).unwrap()
}

pub fn verifier() -> TokenVerifier {
    TokenVerifier::new(JwksCache::from_static(static_jwks()), ISSUER)
        .with_audience(Some(AUDIENCE.to_string()))
}

/// Claims for a token valid for the next five minutes.
pub fn claims(sub: &str, scope: &str) -> Value {
    let now = get_current_timestamp();
    json!({
        "sub": sub,
        "iss": ISSUER,
        "aud": AUDIENCE,
        "iat": now,
        "exp": now + 300,
        "scope": scope,
    })
}

pub fn mint(claims: &Value) -> String {
    mint_with(claims, KID, SECRET)
}

pub fn mint_with(claims: &Value, kid: &str, secret: &[u8]) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(kid.to_string());
    encode(&header, claims, &EncodingKey::from_secret(secret)).unwrap()
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}
