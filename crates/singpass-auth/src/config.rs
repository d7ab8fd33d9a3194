//! Verifier configuration
//!
//! The default key set endpoint and the transport limits are explicit
//! configuration rather than module constants, so tests and deployments can
//! point the fetcher at a different provider without touching code.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// SingPass staging JWKS endpoint used when no source is supplied
pub const DEFAULT_JWKS_URL: &str =
    "https://stg-saml-internet.singpass.gov.sg/mga/sps/oauth/oauth20/jwks/SingPassOP";

/// Environment variable overriding [`SingpassConfig::jwks_url`]
pub const ENV_JWKS_URL: &str = "SINGPASS_JWKS_URL";
/// Environment variable overriding [`SingpassConfig::request_timeout`] (seconds)
pub const ENV_TIMEOUT_SECS: &str = "SINGPASS_JWKS_TIMEOUT_SECS";
/// Environment variable overriding [`SingpassConfig::max_response_size`] (bytes)
pub const ENV_MAX_RESPONSE_BYTES: &str = "SINGPASS_JWKS_MAX_RESPONSE_BYTES";
/// Environment variable overriding [`SingpassConfig::require_https`]
pub const ENV_REQUIRE_HTTPS: &str = "SINGPASS_JWKS_REQUIRE_HTTPS";
/// Environment variable enabling the key store cache (TTL in seconds, `0` disables)
pub const ENV_CACHE_TTL_SECS: &str = "SINGPASS_JWKS_CACHE_TTL_SECS";

/// Configuration for key set retrieval and assertion verification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SingpassConfig {
    /// Key set endpoint used when a call does not name a source
    pub jwks_url: String,
    /// HTTP request timeout (default: 10 seconds)
    pub request_timeout: Duration,
    /// Maximum key set body size in bytes (default: 1 MiB)
    pub max_response_size: usize,
    /// User agent for key set requests
    pub user_agent: String,
    /// Require HTTPS for key set URLs; plain HTTP is still allowed for loopback hosts
    pub require_https: bool,
    /// Key store cache TTL. `None` (default) rebuilds the store on every verification.
    pub cache_ttl: Option<Duration>,
    /// Minimum interval between forced refreshes of a cached key set
    pub min_refresh_interval: Duration,
}

impl Default for SingpassConfig {
    fn default() -> Self {
        Self {
            jwks_url: DEFAULT_JWKS_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            max_response_size: 1024 * 1024, // 1 MiB
            user_agent: format!("singpass-auth/{}", env!("CARGO_PKG_VERSION")),
            require_https: true,
            cache_ttl: None,
            min_refresh_interval: Duration::from_secs(5),
        }
    }
}

impl SingpassConfig {
    /// Load configuration from `SINGPASS_JWKS_*` environment variables
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Example
    /// ```rust,no_run
    /// use singpass_auth::SingpassConfig;
    ///
    /// let config = SingpassConfig::from_env().expect("invalid SingPass configuration");
    /// ```
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] if a variable is set but cannot be
    /// parsed, or if the resulting configuration fails [`Self::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var(ENV_JWKS_URL) {
            config.jwks_url = url;
        }

        if let Ok(raw) = std::env::var(ENV_TIMEOUT_SECS) {
            config.request_timeout = Duration::from_secs(parse_number(ENV_TIMEOUT_SECS, &raw)?);
        }

        if let Ok(raw) = std::env::var(ENV_MAX_RESPONSE_BYTES) {
            config.max_response_size = parse_number(ENV_MAX_RESPONSE_BYTES, &raw)?;
        }

        if let Ok(raw) = std::env::var(ENV_REQUIRE_HTTPS) {
            config.require_https = parse_bool(ENV_REQUIRE_HTTPS, &raw)?;
        }

        if let Ok(raw) = std::env::var(ENV_CACHE_TTL_SECS) {
            config.cache_ttl = match parse_number::<u64>(ENV_CACHE_TTL_SECS, &raw)? {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is usable
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] if the default endpoint is not an
    /// absolute URL, or a limit is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.jwks_url)
            .map_err(|e| ConfigError::invalid("jwks_url", format!("not a valid URL: {e}")))?;

        if self.request_timeout.is_zero() {
            return Err(ConfigError::invalid(
                "request_timeout",
                "must be greater than zero",
            ));
        }

        if self.max_response_size == 0 {
            return Err(ConfigError::invalid(
                "max_response_size",
                "must be greater than zero",
            ));
        }

        Ok(())
    }

    /// Set the default key set endpoint
    pub fn with_jwks_url(mut self, url: impl Into<String>) -> Self {
        self.jwks_url = url.into();
        self
    }

    /// Set the HTTP request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the maximum key set body size
    pub fn with_max_response_size(mut self, bytes: usize) -> Self {
        self.max_response_size = bytes;
        self
    }

    /// Allow or forbid plain HTTP for non-loopback key set URLs
    pub fn with_require_https(mut self, require: bool) -> Self {
        self.require_https = require;
        self
    }

    /// Enable the key store cache with the given TTL
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Set the minimum interval between forced key set refreshes
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ConfigError::invalid(name, format!("'{raw}': {e}")))
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(name, format!("'{raw}' is not a boolean"))),
    }
}
