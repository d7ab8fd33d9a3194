//! # SingPass Auth - Provider Assertion Verification
//!
//! Relying-party building blocks for SingPass-style OpenID Connect logins:
//! fetch the provider's JSON Web Key Set, index it by key ID, verify a signed
//! assertion against the referenced key and hand back its claims. Also
//! generates the `nonce`/`state` values of the authorization request and
//! redacts NRIC numbers for logs.
//!
//! ## Scope
//!
//! Only the cryptographic signature is verified. Issuer, audience and expiry
//! checks, the OAuth code exchange and background key rotation are left to
//! the caller; claims come back exactly as signed.
//!
//! ## Architecture
//!
//! - [`jwks`] - Key set sources and the [`KeySetFetcher`]
//! - [`keys`] - [`KeyStore`]: JWK and PEM parsing, lookup by key ID
//! - [`verify`](mod@verify) - JWS signature verification
//! - [`cache`] - Optional TTL cache of key stores
//! - [`verifier`] - [`AssertionVerifier`], the whole pipeline in one call
//! - [`mask`] - NRIC redaction
//! - [`random`] - Nonce and state generation
//! - [`config`] - [`SingpassConfig`] with environment loading
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use singpass_auth::{AssertionVerifier, SingpassConfig, create_nonce, create_state, mask_nric};
//!
//! # tokio_test::block_on(async {
//! // Authorization request
//! let nonce = create_nonce();
//! let state = create_state();
//!
//! // ... user authenticates, the provider returns a signed assertion ...
//! # let assertion = "";
//!
//! let verifier = AssertionVerifier::new(SingpassConfig::default())?;
//! let claims = verifier
//!     .verify_assertion(assertion, None, "singpass-sig")
//!     .await?;
//!
//! let nric = claims.get("sub").and_then(|v| v.as_str());
//! tracing::info!(nric = %mask_nric(nric), "User logged in");
//! # Ok::<(), singpass_auth::Error>(())
//! # });
//! ```
//!
//! ## Logging
//!
//! The crate emits `tracing` events and never installs a subscriber. Tokens
//! and claims are never logged.
//!
//! ## Standards
//!
//! - **RFC 7515** - JSON Web Signature (JWS)
//! - **RFC 7517** - JSON Web Key (JWK)
//! - **RFC 7638** - JWK Thumbprint
//! - **RFC 8037** - Ed25519 keys in JOSE

pub mod cache;
pub mod config;
pub mod error;
pub mod jwks;
pub mod keys;
pub mod mask;
pub mod random;
pub mod verifier;
pub mod verify;

#[doc(inline)]
pub use cache::KeyStoreCache;
#[doc(inline)]
pub use config::{DEFAULT_JWKS_URL, SingpassConfig};
#[doc(inline)]
pub use error::{ConfigError, FetchError, KeyError, VerifyError};
#[doc(inline)]
pub use jwks::{KeySetFetcher, KeySetSource, RawKeyEntry, fetch_key_set};
#[doc(inline)]
pub use keys::{EcCurve, KeyMaterial, KeyStore, KeyUse, VerificationKey};
#[doc(inline)]
pub use mask::{MaskOptions, MaskRange, mask_chars, mask_identifier, mask_nric};
#[doc(inline)]
pub use random::{create_nonce, create_state};
#[doc(inline)]
pub use verifier::AssertionVerifier;
#[doc(inline)]
pub use verify::{Claims, verify};

/// Any failure of the verification pipeline
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Key set retrieval failed
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Key material could not be loaded
    #[error(transparent)]
    Key(#[from] KeyError),

    /// The assertion did not verify
    #[error(transparent)]
    Verify(#[from] VerifyError),

    /// The configuration is unusable
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Whether retrying the same call might succeed
    ///
    /// Only transport failures qualify; everything else is deterministic for
    /// the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch(FetchError::Transport { .. }))
    }

    /// Whether the failure is an unknown key ID
    ///
    /// A fresh key set may contain the key if the provider rotated keys.
    pub fn is_key_not_found(&self) -> bool {
        matches!(
            self,
            Self::Verify(VerifyError::KeyNotFound { .. }) | Self::Key(KeyError::NotFound { .. })
        )
    }
}

/// Result alias for the verification pipeline
pub type Result<T> = std::result::Result<T, Error>;
