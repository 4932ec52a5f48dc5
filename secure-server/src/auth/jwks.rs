//! JWKS (JSON Web Key Set) discovery, fetching and caching.
//!
//! The key set is the only state shared between requests. It is read through
//! a short read lock and replaced wholesale after a fetch. Refreshes are
//! single-flight behind a separate guard, so readers of a fresh set never wait
//! on the network, and fetch attempts are spaced by the minimum refresh
//! interval whether they succeed or fail.

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, ensure, Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{Algorithm, DecodingKey};
use reqwest::{header::ACCEPT, Client};
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use super::error::AuthError;

/// Default time a fetched key set is trusted.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Default minimum spacing between fetch attempts after the first.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

const RSA_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];
const HMAC_ALGORITHMS: &[Algorithm] = &[Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// JWKS document as published by the issuer.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// A single JSON Web Key. Only the members needed for verification are read.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type (`RSA`, `EC`, `oct`)
    pub kty: String,
    pub kid: Option<String>,
    pub alg: Option<String>,
    /// Key use (`sig`, `enc`)
    #[serde(rename = "use")]
    pub use_: Option<String>,

    // RSA
    pub n: Option<String>,
    pub e: Option<String>,

    // EC
    pub crv: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,

    // Symmetric
    pub k: Option<String>,
}

impl Jwk {
    fn is_signing_key(&self) -> bool {
        self.use_.as_deref().map_or(true, |u| u == "sig")
    }

    fn family(&self) -> &'static [Algorithm] {
        match self.kty.as_str() {
            "RSA" => RSA_ALGORITHMS,
            "EC" => match self.crv.as_deref() {
                Some("P-256") => &[Algorithm::ES256],
                Some("P-384") => &[Algorithm::ES384],
                _ => &[],
            },
            "oct" => HMAC_ALGORITHMS,
            _ => &[],
        }
    }

    /// Whether a token signed with `alg` may be verified by this key.
    ///
    /// The algorithm must belong to the key type's family and, when the key
    /// declares `alg`, be exactly that algorithm.
    pub fn supports(&self, alg: Algorithm) -> bool {
        if !self.family().contains(&alg) {
            return false;
        }
        match self.alg.as_deref() {
            Some(declared) => Algorithm::from_str(declared).map_or(false, |d| d == alg),
            None => true,
        }
    }

    pub fn decoding_key(&self) -> Result<DecodingKey, AuthError> {
        match self.kty.as_str() {
            "RSA" => {
                let n = required(&self.n, "n")?;
                let e = required(&self.e, "e")?;
                DecodingKey::from_rsa_components(n, e)
                    .map_err(|err| AuthError::InvalidKey(err.to_string()))
            }
            "EC" => {
                let x = required(&self.x, "x")?;
                let y = required(&self.y, "y")?;
                DecodingKey::from_ec_components(x, y)
                    .map_err(|err| AuthError::InvalidKey(err.to_string()))
            }
            "oct" => {
                let k = required(&self.k, "k")?;
                let secret = URL_SAFE_NO_PAD
                    .decode(k.trim_end_matches('='))
                    .map_err(|err| AuthError::InvalidKey(err.to_string()))?;
                Ok(DecodingKey::from_secret(&secret))
            }
            other => Err(AuthError::InvalidKey(format!("unsupported key type {other}"))),
        }
    }
}

fn required<'a>(member: &'a Option<String>, name: &str) -> Result<&'a str, AuthError> {
    member
        .as_deref()
        .ok_or_else(|| AuthError::InvalidKey(format!("missing member {name}")))
}

impl Jwks {
    /// Find the signing key for a token header.
    ///
    /// With a `kid` the key is matched by id only; the algorithm is checked
    /// afterwards so a mismatch is reported as such. Without a `kid` the first
    /// signing key that supports `alg` is used.
    pub fn find(&self, kid: Option<&str>, alg: Algorithm) -> Option<&Jwk> {
        self.keys
            .iter()
            .filter(|key| key.is_signing_key())
            .find(|key| match kid {
                Some(kid) => key.kid.as_deref() == Some(kid),
                None => key.supports(alg),
            })
    }
}

/// Shared, refreshable key set.
///
/// Cloning is cheap; all clones share one cache.
#[derive(Clone)]
pub struct JwksCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    source: KeySource,
    ttl: Duration,
    min_refresh_interval: Duration,
    cached: RwLock<Option<CachedKeys>>,
    /// Refresh guard; holds when the last fetch started.
    last_attempt: Mutex<Option<Instant>>,
}

enum KeySource {
    Static,
    Remote { client: Client, uri: String },
}

#[derive(Clone)]
struct CachedKeys {
    jwks: Arc<Jwks>,
    fetched_at: Instant,
}

impl JwksCache {
    /// A fixed key set that is never refreshed.
    pub fn from_static(jwks: Jwks) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                source: KeySource::Static,
                ttl: Duration::MAX,
                min_refresh_interval: Duration::MAX,
                cached: RwLock::new(Some(CachedKeys {
                    jwks: Arc::new(jwks),
                    fetched_at: Instant::now(),
                })),
                last_attempt: Mutex::new(None),
            }),
        }
    }

    /// A key set fetched lazily from `uri` and refetched after `ttl`.
    pub fn remote(
        client: Client,
        uri: impl Into<String>,
        ttl: Duration,
        min_refresh_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                source: KeySource::Remote {
                    client,
                    uri: uri.into(),
                },
                ttl,
                min_refresh_interval,
                cached: RwLock::new(None),
                last_attempt: Mutex::new(None),
            }),
        }
    }

    /// Fetch the key set now so the first request does not pay for it.
    pub async fn warm(&self) -> Result<usize, AuthError> {
        let observed = self.observed().await;
        match self.refresh(observed, false).await? {
            Some(keys) => Ok(keys.jwks.keys.len()),
            None => Err(AuthError::KeySetUnavailable("no key set configured".into())),
        }
    }

    /// Resolve the verification key for a token header.
    pub async fn key_for(
        &self,
        kid: Option<&str>,
        alg: Algorithm,
    ) -> Result<DecodingKey, AuthError> {
        let current = self.current().await?;
        if let Some(jwk) = current.jwks.find(kid, alg) {
            return select(jwk, alg);
        }

        // Rotated keys show up as an unknown kid before the TTL expires.
        if kid.is_some() {
            debug!(kid = ?kid, "jwks_kid_miss");
            if let Some(refreshed) = self.refresh(Some(current.fetched_at), true).await? {
                if let Some(jwk) = refreshed.jwks.find(kid, alg) {
                    return select(jwk, alg);
                }
            }
        }

        Err(AuthError::UnknownKey(kid.map(String::from)))
    }

    async fn observed(&self) -> Option<Instant> {
        self.inner
            .cached
            .read()
            .await
            .as_ref()
            .map(|keys| keys.fetched_at)
    }

    async fn current(&self) -> Result<CachedKeys, AuthError> {
        let cached = self.inner.cached.read().await.clone();

        match cached {
            Some(keys) if keys.fetched_at.elapsed() < self.inner.ttl => Ok(keys),
            Some(stale) => match self.refresh(Some(stale.fetched_at), true).await {
                Ok(Some(fresh)) => Ok(fresh),
                Ok(None) => Ok(stale),
                Err(err) => {
                    warn!(error = %err, "jwks_refresh_failed_serving_stale");
                    Ok(stale)
                }
            },
            None => self
                .refresh(None, true)
                .await?
                .ok_or_else(|| AuthError::KeySetUnavailable("refresh throttled".into())),
        }
    }

    /// Refetch the key set, one caller at a time.
    ///
    /// `observed` is the `fetched_at` the caller saw. If the cache changed
    /// while waiting for the refresh guard, the newer set is returned without
    /// a fetch. With `throttled`, no fetch starts within the minimum refresh
    /// interval of the previous attempt, successful or not; `Ok(None)` means
    /// nothing newer is available.
    async fn refresh(
        &self,
        observed: Option<Instant>,
        throttled: bool,
    ) -> Result<Option<CachedKeys>, AuthError> {
        let KeySource::Remote { client, uri } = &self.inner.source else {
            return Ok(None);
        };

        let mut last_attempt = self.inner.last_attempt.lock().await;

        // Double-check after acquiring the guard
        let cached = self.inner.cached.read().await.clone();
        if let Some(keys) = cached {
            if Some(keys.fetched_at) != observed {
                return Ok(Some(keys));
            }
        }

        if throttled {
            if let Some(at) = *last_attempt {
                if at.elapsed() < self.inner.min_refresh_interval {
                    debug!(uri = %uri, "jwks_refresh_throttled");
                    return Ok(None);
                }
            }
        }

        *last_attempt = Some(Instant::now());

        let jwks = fetch_jwks(client, uri)
            .await
            .map_err(|err| AuthError::KeySetUnavailable(format!("{err:#}")))?;

        info!(uri = %uri, keys = jwks.keys.len(), "jwks_refreshed");

        let fresh = CachedKeys {
            jwks: Arc::new(jwks),
            fetched_at: Instant::now(),
        };
        *self.inner.cached.write().await = Some(fresh.clone());

        Ok(Some(fresh))
    }
}

fn select(jwk: &Jwk, alg: Algorithm) -> Result<DecodingKey, AuthError> {
    if !jwk.supports(alg) {
        return Err(AuthError::AlgorithmMismatch(alg));
    }
    jwk.decoding_key()
}

async fn fetch_jwks(client: &Client, uri: &str) -> Result<Jwks> {
    client
        .get(uri)
        .header(ACCEPT, "application/json")
        .send()
        .await
        .context("Failed to request JWKS")?
        .error_for_status()
        .context("JWKS endpoint returned an error status")?
        .json::<Jwks>()
        .await
        .context("Failed to parse JWKS")
}

/// OpenID provider metadata members used for key discovery.
#[derive(Debug, Deserialize)]
struct ProviderMetadata {
    issuer: String,
    jwks_uri: String,
}

/// Resolve the issuer's JWKS location from its OpenID configuration document.
pub async fn discover_jwks_uri(client: &Client, issuer: &str) -> Result<String> {
    let issuer = issuer.trim_end_matches('/');
    let url = Url::parse(&format!("{issuer}/.well-known/openid-configuration"))
        .context("Invalid issuer URL")?;

    let metadata: ProviderMetadata = client
        .get(url.clone())
        .header(ACCEPT, "application/json")
        .send()
        .await
        .with_context(|| format!("Failed to request {url}"))?
        .error_for_status()
        .context("Discovery endpoint returned an error status")?
        .json()
        .await
        .context("Failed to parse provider metadata")?;

    if metadata.issuer.trim_end_matches('/') != issuer {
        bail!(
            "Provider metadata issuer {} does not match configured issuer {}",
            metadata.issuer,
            issuer
        );
    }

    let jwks_uri = Url::parse(&metadata.jwks_uri).context("Invalid jwks_uri in provider metadata")?;
    ensure!(
        matches!(jwks_uri.scheme(), "http" | "https"),
        "jwks_uri must use HTTP(S)"
    );

    Ok(jwks_uri.to_string())
}
