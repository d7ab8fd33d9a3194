//! End-to-end assertion verification
//!
//! [`AssertionVerifier`] wires the pipeline together: resolve the key set
//! source, fetch it, build a [`KeyStore`], verify the assertion against the
//! requested kid. Without a cache every call starts from a fresh fetch. With
//! one, a kid missing from the cached store triggers a single forced refetch
//! before the call fails, which is how rotated provider keys get picked up.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::KeyStoreCache;
use crate::config::SingpassConfig;
use crate::error::VerifyError;
use crate::jwks::KeySetFetcher;
use crate::keys::KeyStore;
use crate::verify::{Claims, verify};
use crate::{Error, Result};

/// Fetches provider keys and verifies signed assertions
///
/// # Example
///
/// ```rust,no_run
/// use singpass_auth::{AssertionVerifier, SingpassConfig};
///
/// # tokio_test::block_on(async {
/// let verifier = AssertionVerifier::new(SingpassConfig::from_env()?)?;
///
/// let claims = verifier
///     .verify_assertion("eyJhbGciOiJSUzI1NiJ9...", None, "singpass-sig-2024")
///     .await?;
/// println!("subject: {:?}", claims.get("sub"));
/// # Ok::<(), singpass_auth::Error>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct AssertionVerifier {
    fetcher: KeySetFetcher,
    cache: Option<KeyStoreCache>,
}

impl AssertionVerifier {
    /// Create a verifier from configuration
    ///
    /// A cache is set up when `config.cache_ttl` is set.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the configuration is invalid and
    /// [`Error::Fetch`] if the HTTP client cannot be built.
    pub fn new(config: SingpassConfig) -> Result<Self> {
        config.validate()?;
        let cache_ttl = config.cache_ttl;
        let fetcher = KeySetFetcher::new(config)?;

        let cache = cache_ttl.map(|ttl| KeyStoreCache::new(fetcher.clone(), ttl));
        Ok(Self { fetcher, cache })
    }

    /// Create an uncached verifier around an existing fetcher
    pub fn with_fetcher(fetcher: KeySetFetcher) -> Self {
        Self {
            fetcher,
            cache: None,
        }
    }

    /// Use `cache` for key stores
    ///
    /// The cache brings its own fetcher, which replaces this verifier's.
    pub fn with_cache(mut self, cache: KeyStoreCache) -> Self {
        self.fetcher = cache.fetcher().clone();
        self.cache = Some(cache);
        self
    }

    /// Verifier configuration
    pub fn config(&self) -> &SingpassConfig {
        self.fetcher.config()
    }

    /// Whether key stores are cached between calls
    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    /// Verify `token` against key `kid` from the key set at `source`
    ///
    /// `None` uses the configured default endpoint. Only the signature is
    /// checked; the returned claims are not validated.
    ///
    /// # Errors
    /// - [`Error::Fetch`] if the key set cannot be retrieved
    /// - [`Error::Verify`] if the kid is unknown, the signature is invalid, or
    ///   the payload is malformed
    pub async fn verify_assertion(
        &self,
        token: &str,
        source: Option<&str>,
        kid: &str,
    ) -> Result<Claims> {
        let Some(cache) = &self.cache else {
            let entries = self.fetcher.fetch_key_set(source).await?;
            let store = KeyStore::from_key_set(&entries);
            return Ok(verify(token, &store, kid)?);
        };

        let store = cache.get(source).await?;
        match verify(token, &store, kid) {
            Err(VerifyError::KeyNotFound { .. }) => {
                warn!(kid = %kid, "Key ID not in cached key set, refreshing once");
                let refreshed = cache.refresh(source).await?;
                if Arc::ptr_eq(&store, &refreshed) {
                    debug!(kid = %kid, "Refresh served the same key store");
                }
                Ok(verify(token, &refreshed, kid)?)
            }
            result => Ok(result?),
        }
    }
}

impl TryFrom<SingpassConfig> for AssertionVerifier {
    type Error = Error;

    fn try_from(config: SingpassConfig) -> Result<Self> {
        Self::new(config)
    }
}
