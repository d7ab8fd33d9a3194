//! JWS signature verification
//!
//! Only the signature is checked. Issuer, audience and time-based claims are
//! returned untouched for the caller to judge; `jsonwebtoken` is configured
//! with every claim check disabled.
//!
//! The token is inspected in a fixed order: the key is resolved first, then
//! the compact structure and header, then the signature, and only then is the
//! payload decoded. Nothing from the payload is exposed unless the signature
//! holds.

use std::collections::HashSet;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Validation, decode, decode_header};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::VerifyError;
use crate::keys::KeyStore;

/// Decoded claims of a verified assertion
pub type Claims = serde_json::Map<String, Value>;

/// Compact JWS: header, payload, signature
const JWS_SEGMENTS: usize = 3;
/// Compact JWE: header, encrypted key, IV, ciphertext, tag
const JWE_SEGMENTS: usize = 5;

/// Verify a compact JWS against the key `kid` and return its claims
///
/// # Example
///
/// ```rust
/// use singpass_auth::{KeyStore, VerifyError, verify};
///
/// let store = KeyStore::default();
/// let err = verify("a.b.c", &store, "missing").unwrap_err();
/// assert!(matches!(err, VerifyError::KeyNotFound { .. }));
/// ```
///
/// # Errors
/// - [`VerifyError::KeyNotFound`] if `kid` is not in `store`; the token is
///   not looked at
/// - [`VerifyError::SignatureVerification`] if the token is not a compact
///   JWS, its algorithm is not accepted by the key, or the signature is
///   invalid
/// - [`VerifyError::MalformedPayload`] if the signature is valid but the
///   payload is not a JSON object
pub fn verify(token: &str, store: &KeyStore, kid: &str) -> Result<Claims, VerifyError> {
    let key = store.resolve(kid).map_err(|_| {
        debug!(kid = %kid, "Key not found for verification");
        VerifyError::KeyNotFound {
            kid: kid.to_string(),
        }
    })?;

    let segments: Vec<&str> = token.split('.').collect();
    match segments.len() {
        JWS_SEGMENTS => {}
        JWE_SEGMENTS => {
            return Err(VerifyError::SignatureVerification(
                "token is an encrypted JWE; only signed JWS assertions are accepted".to_string(),
            ));
        }
        n => {
            return Err(VerifyError::SignatureVerification(format!(
                "expected {JWS_SEGMENTS} dot-separated segments, found {n}"
            )));
        }
    }

    // Reject a garbled signature here so that jsonwebtoken's base64 errors can
    // only come from the payload
    URL_SAFE_NO_PAD
        .decode(segments[2])
        .map_err(|e| VerifyError::SignatureVerification(format!("signature is not base64url: {e}")))?;

    let header = decode_header(token)
        .map_err(|e| VerifyError::SignatureVerification(format!("invalid JWS header: {e}")))?;

    if !key.accepts(header.alg) {
        warn!(
            kid = %kid,
            algorithm = ?header.alg,
            key_algorithm = ?key.algorithm(),
            kty = key.material().kty(),
            "Token algorithm not accepted by key"
        );
        return Err(VerifyError::SignatureVerification(format!(
            "algorithm {:?} is not accepted by key '{kid}'",
            header.alg
        )));
    }

    if let Some(header_kid) = header.kid.as_deref()
        && header_kid != kid
    {
        warn!(
            kid = %kid,
            header_kid = %header_kid,
            "Token header names a different key ID than requested"
        );
    }

    let mut validation = Validation::new(header.alg);
    validation.required_spec_claims = HashSet::new();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;

    let data = decode::<Claims>(token, key.decoding_key(), &validation).map_err(|e| {
        match e.kind() {
            ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                warn!(kid = %kid, error = %e, "Signed payload is not a JSON object");
                VerifyError::MalformedPayload(e.to_string())
            }
            _ => {
                warn!(kid = %kid, error = %e, "Signature verification failed");
                VerifyError::SignatureVerification(e.to_string())
            }
        }
    })?;

    debug!(kid = %kid, algorithm = ?header.alg, "Signature verified");
    Ok(data.claims)
}
