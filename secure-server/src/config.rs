//! Configuration module for environment variable parsing.
//!
//! Variable names follow the Okta Spring Boot starter so existing deployments
//! can point this server at the same authorization server unchanged.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Default audience of an Okta custom authorization server.
pub const DEFAULT_AUDIENCE: &str = "api://default";

/// Scope every request to `/` must carry.
pub const DEFAULT_REQUIRED_SCOPE: &str = "mod_custom";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Trusted token issuer (e.g. `https://dev-123.okta.com/oauth2/default`)
    pub issuer: String,

    /// Expected `aud` claim; `None` skips the audience check
    pub audience: Option<String>,

    /// Scope required on the webhook routes
    pub required_scope: String,

    /// Explicit JWKS location; discovered from the issuer when unset
    pub jwks_uri: Option<String>,

    /// How long a fetched key set is trusted before refetching
    pub jwks_cache_ttl_secs: u64,

    /// Minimum spacing between refetches triggered by an unknown `kid`
    pub jwks_refresh_min_interval_secs: u64,

    /// Leeway applied to `exp` and `nbf`
    pub clock_skew_secs: u64,

    /// Timeout for discovery and JWKS requests
    pub http_timeout_ms: u64,

    /// Maximum accepted request body size
    pub max_body_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            port: parse_or("PORT", 8080),

            issuer: env::var("OKTA_OAUTH2_ISSUER")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .unwrap_or_default(),

            audience: match env::var("OKTA_OAUTH2_AUDIENCE") {
                Ok(v) if v.trim().is_empty() => None,
                Ok(v) => Some(v.trim().to_string()),
                Err(_) => Some(DEFAULT_AUDIENCE.to_string()),
            },

            required_scope: env::var("REQUIRED_SCOPE")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_REQUIRED_SCOPE.to_string()),

            jwks_uri: env::var("JWKS_URI")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),

            jwks_cache_ttl_secs: parse_or("JWKS_CACHE_TTL_SECS", 3600),

            jwks_refresh_min_interval_secs: parse_or("JWKS_REFRESH_MIN_INTERVAL_SECS", 30),

            clock_skew_secs: parse_or("JWT_CLOCK_SKEW_SECS", 60),

            http_timeout_ms: parse_or("HTTP_TIMEOUT_MS", 5000),

            max_body_bytes: parse_or("MAX_BODY_BYTES", 1024 * 1024),
        }
    }

    pub fn jwks_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_cache_ttl_secs)
    }

    pub fn jwks_refresh_min_interval(&self) -> Duration {
        Duration::from_secs(self.jwks_refresh_min_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

/// Parse an environment variable, falling back to `default` when it is unset
/// or unparsable.
fn parse_or<T: FromStr>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}
