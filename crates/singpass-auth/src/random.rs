//! Nonce and state generation for the authorization request
//!
//! Both values come from UUIDv4 (122 bits drawn from the OS CSPRNG). The
//! caller owns correlation and storage; nothing here is persisted.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use uuid::Uuid;

/// Create a fresh, unguessable nonce for the `nonce` authorization parameter
///
/// ```rust
/// let nonce = singpass_auth::create_nonce();
/// assert_eq!(nonce.len(), 36);
/// ```
pub fn create_nonce() -> String {
    Uuid::new_v4().to_string()
}

/// Create a fresh, unguessable `state` value, base64url-encoded without padding
///
/// The output only contains URL-safe characters and can be placed in a query
/// string as is.
pub fn create_state() -> String {
    URL_SAFE_NO_PAD.encode(Uuid::new_v4().to_string())
}
