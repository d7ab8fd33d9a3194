//! Error types for key set retrieval, key store construction and verification
//!
//! Each stage of the verification pipeline has its own error enum so callers
//! can react to the failure class (retry a fetch, refetch keys on a rotated
//! kid, reject an assertion) without string matching. [`crate::Error`] unifies
//! them for the end-to-end [`crate::AssertionVerifier`].

use std::path::PathBuf;
use thiserror::Error;

/// Key set fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    /// The key set source is not a usable URL. Raised before any I/O.
    #[error("Invalid key set source: {0}")]
    InvalidSource(String),

    /// Network or file I/O failed while retrieving the key set
    #[error("Failed to retrieve key set from {source_location}: {reason}")]
    Transport {
        /// URL or path the fetch was aimed at
        source_location: String,
        /// What went wrong
        reason: String,
    },

    /// The key set body is not JSON or lacks a `keys` array
    #[error("Malformed key set response from {source_location}: {reason}")]
    MalformedResponse {
        /// URL or path the body came from
        source_location: String,
        /// What was wrong with the body
        reason: String,
    },
}

/// Key material and key store errors
#[derive(Debug, Error)]
pub enum KeyError {
    /// A JWK entry or PEM blob cannot be turned into verification key material
    #[error("Malformed key{}: {reason}", describe_kid(.kid))]
    Malformed {
        /// Key ID of the offending entry, when it carried one
        kid: Option<String>,
        /// Why the key was rejected
        reason: String,
    },

    /// A local key file is missing or unreadable
    #[error("Key file {} is unavailable: {source}", .path.display())]
    SourceUnavailable {
        /// The file that could not be read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The requested key ID is not in the store
    #[error("Key ID '{kid}' not found in key store")]
    NotFound {
        /// The key ID that was looked up
        kid: String,
    },
}

fn describe_kid(kid: &Option<String>) -> String {
    kid.as_deref()
        .map(|kid| format!(" '{kid}'"))
        .unwrap_or_default()
}

impl KeyError {
    pub(crate) fn malformed(kid: Option<&str>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            kid: kid.map(str::to_string),
            reason: reason.into(),
        }
    }
}

/// Signature verification errors
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The key ID is absent from the key store; no signature math was attempted
    #[error("Key ID '{kid}' not found in key store")]
    KeyNotFound {
        /// The key ID that was looked up
        kid: String,
    },

    /// The token is malformed, uses an unacceptable algorithm, or its
    /// signature does not validate under the resolved key
    #[error("Signature verification failed: {0}")]
    SignatureVerification(String),

    /// The signature is valid but the payload is not a JSON object
    #[error("Verified payload is malformed: {0}")]
    MalformedPayload(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration value could not be parsed or is out of range
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue {
        /// Setting or environment variable name
        name: String,
        /// Why the value was rejected
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
