//! Key set fetcher
//!
//! One GET per call: no retries, no caching. Redirects are disabled so an
//! HTTPS endpoint cannot bounce the request to plain HTTP, and the body is
//! read with a hard size cap.

use std::path::Path;

use reqwest::header::ACCEPT;
use serde_json::Value;
use tracing::{debug, error, info};
use url::Url;

use super::{KeySetSource, RawKeyEntry};
use crate::config::SingpassConfig;
use crate::error::FetchError;

/// Retrieves raw key set entries from a URL or a local file
///
/// # Example
///
/// ```rust,no_run
/// use singpass_auth::{KeySetFetcher, KeyStore, SingpassConfig};
///
/// # tokio_test::block_on(async {
/// let fetcher = KeySetFetcher::new(SingpassConfig::default())?;
/// let entries = fetcher
///     .fetch_key_set(Some("https://id.singpass.gov.sg/.well-known/keys"))
///     .await?;
/// let store = KeyStore::from_key_set(&entries);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct KeySetFetcher {
    client: reqwest::Client,
    config: SingpassConfig,
}

impl KeySetFetcher {
    /// Create a fetcher with its own HTTP client
    ///
    /// # Errors
    /// Returns [`FetchError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: SingpassConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| FetchError::Transport {
                source_location: config.jwks_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client, config })
    }

    /// Create a fetcher around a caller-supplied HTTP client
    ///
    /// The client's own timeout and redirect policy apply; only the body size
    /// cap and source validation come from `config`.
    pub fn with_client(client: reqwest::Client, config: SingpassConfig) -> Self {
        Self { client, config }
    }

    /// The configuration this fetcher was built with
    pub fn config(&self) -> &SingpassConfig {
        &self.config
    }

    /// Validate a source string, falling back to the configured endpoint
    ///
    /// # Errors
    /// Returns [`FetchError::InvalidSource`] if the source is not usable.
    pub fn parse_source(&self, source: Option<&str>) -> Result<KeySetSource, FetchError> {
        let source = source.unwrap_or(&self.config.jwks_url);
        KeySetSource::parse(source, self.config.require_https)
    }

    /// Fetch the raw key set entries from `source`
    ///
    /// `None` uses the configured default endpoint. A source is an `http(s)`
    /// URL, a `file://` URL or an absolute path; see [`KeySetSource::parse`].
    ///
    /// # Errors
    /// - [`FetchError::InvalidSource`] if `source` is none of those; no
    ///   request is made
    /// - [`FetchError::Transport`] on connection failure, timeout, non-2xx
    ///   status, an oversized body, or an unreadable file
    /// - [`FetchError::MalformedResponse`] if the body is not JSON or has no
    ///   `keys` array
    pub async fn fetch_key_set(
        &self,
        source: Option<&str>,
    ) -> Result<Vec<RawKeyEntry>, FetchError> {
        let source = self.parse_source(source)?;
        self.fetch(&source).await
    }

    /// Fetch the raw key set entries from an already validated source
    ///
    /// # Errors
    /// See [`Self::fetch_key_set`].
    pub async fn fetch(&self, source: &KeySetSource) -> Result<Vec<RawKeyEntry>, FetchError> {
        let location = source.to_string();
        let body = match source {
            KeySetSource::Url(url) => self.fetch_url(url).await?,
            KeySetSource::File(path) => read_file(path).await?,
        };

        let keys = parse_key_set(&body).map_err(|reason| {
            error!(jwks_uri = %location, %reason, "Malformed key set");
            FetchError::MalformedResponse {
                source_location: location.clone(),
                reason,
            }
        })?;

        info!(jwks_uri = %location, key_count = keys.len(), "Fetched key set");
        Ok(keys)
    }

    async fn fetch_url(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        info!(jwks_uri = %url, "Fetching key set from endpoint");

        let transport = |reason: String| {
            error!(jwks_uri = %url, %reason, "Key set request failed");
            FetchError::Transport {
                source_location: url.to_string(),
                reason,
            }
        };

        let mut response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| transport(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(transport(format!("server returned HTTP {}", status.as_u16())));
        }

        let limit = self.config.max_response_size;
        if let Some(length) = response.content_length()
            && length > limit as u64
        {
            return Err(transport(format!(
                "response of {length} bytes exceeds maximum size of {limit} bytes"
            )));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| transport(format!("failed to read response body: {e}")))?
        {
            if body.len() + chunk.len() > limit {
                return Err(transport(format!(
                    "response exceeds maximum size of {limit} bytes"
                )));
            }
            body.extend_from_slice(&chunk);
        }

        debug!(jwks_uri = %url, status = %status, bytes = body.len(), "Read key set response");
        Ok(body)
    }
}

async fn read_file(path: &Path) -> Result<Vec<u8>, FetchError> {
    debug!(path = %path.display(), "Reading key set file");
    tokio::fs::read(path).await.map_err(|e| {
        error!(path = %path.display(), error = %e, "Failed to read key set file");
        FetchError::Transport {
            source_location: path.display().to_string(),
            reason: format!("failed to read file: {e}"),
        }
    })
}

/// Extract the `keys` array of a JWK Set document
fn parse_key_set(body: &[u8]) -> Result<Vec<RawKeyEntry>, String> {
    let document: Value =
        serde_json::from_slice(body).map_err(|e| format!("body is not valid JSON: {e}"))?;

    match document {
        Value::Object(mut members) => match members.remove("keys") {
            Some(Value::Array(keys)) => Ok(keys),
            Some(_) => Err("'keys' is not an array".to_string()),
            None => Err("document has no 'keys' member".to_string()),
        },
        _ => Err("document is not a JSON object".to_string()),
    }
}
