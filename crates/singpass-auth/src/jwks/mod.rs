//! JWKS (JSON Web Key Set) retrieval
//!
//! A key set source is either an `http(s)` URL or a local file. The source is
//! validated before any I/O: a string that is not a usable URL is a caller
//! error ([`FetchError::InvalidSource`]), never a network failure.
//!
//! Raw entries are passed through untouched; turning them into verification
//! keys is the job of [`crate::KeyStore::from_key_set`].

mod fetcher;

use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use url::{Host, Url};

use crate::config::SingpassConfig;
use crate::error::FetchError;
pub use fetcher::KeySetFetcher;

/// One key exactly as published in the provider's key set
pub type RawKeyEntry = serde_json::Value;

/// Where a key set is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySetSource {
    /// Remote JWKS endpoint
    Url(Url),
    /// Local JWKS file
    File(PathBuf),
}

impl KeySetSource {
    /// Parse and validate a source string
    ///
    /// `http` and `https` URLs become [`KeySetSource::Url`]. `file://` URLs
    /// and absolute filesystem paths become [`KeySetSource::File`]. With
    /// `require_https`, plain `http` is only accepted for loopback hosts.
    ///
    /// # Errors
    /// Returns [`FetchError::InvalidSource`] for anything else, relative
    /// paths included.
    pub fn parse(source: &str, require_https: bool) -> Result<Self, FetchError> {
        let source = source.trim();
        if Path::new(source).is_absolute() {
            return Ok(Self::File(PathBuf::from(source)));
        }

        let url = Url::parse(source).map_err(|e| {
            FetchError::InvalidSource(format!("'{source}' is not an absolute URL: {e}"))
        })?;

        match url.scheme() {
            "https" => Self::remote(url),
            "http" if !require_https || is_loopback(&url) => Self::remote(url),
            "http" => Err(FetchError::InvalidSource(format!(
                "key set endpoint must use HTTPS (HTTP only allowed for loopback hosts): {url}"
            ))),
            "file" => url.to_file_path().map(Self::File).map_err(|()| {
                FetchError::InvalidSource(format!("'{source}' is not a local file path"))
            }),
            other => Err(FetchError::InvalidSource(format!(
                "unsupported URL scheme '{other}'"
            ))),
        }
    }

    fn remote(url: Url) -> Result<Self, FetchError> {
        if url.host().is_none() {
            return Err(FetchError::InvalidSource(format!("URL has no host: {url}")));
        }
        Ok(Self::Url(url))
    }
}

impl fmt::Display for KeySetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{url}"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
        Some(Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
        None => false,
    }
}

/// Fetch a key set with the default configuration
///
/// `None` uses [`crate::config::DEFAULT_JWKS_URL`]. Builds a fresh
/// [`KeySetFetcher`] per call; hold on to a fetcher when fetching repeatedly.
///
/// # Example
///
/// ```rust,no_run
/// # tokio_test::block_on(async {
/// let keys = singpass_auth::jwks::fetch_key_set(None).await?;
/// println!("provider publishes {} keys", keys.len());
/// # Ok::<(), singpass_auth::FetchError>(())
/// # });
/// ```
///
/// # Errors
/// See [`KeySetFetcher::fetch_key_set`].
pub async fn fetch_key_set(source: Option<&str>) -> Result<Vec<RawKeyEntry>, FetchError> {
    KeySetFetcher::new(SingpassConfig::default())?
        .fetch_key_set(source)
        .await
}
