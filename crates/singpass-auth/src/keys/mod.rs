//! Key store: verification keys indexed by key ID
//!
//! A [`KeyStore`] is built once from a fetched JWK Set, a PEM blob, or a local
//! key file, and is read-only afterwards. Resolution is a plain hash lookup.
//!
//! Building from a key set is best-effort: providers publish signing and
//! encryption keys side by side, so an entry that cannot be used for
//! signature verification is logged and skipped instead of failing the build.

pub mod material;
pub(crate) mod pem;

use std::collections::HashMap;
use std::path::Path;

use jsonwebtoken::{Algorithm, DecodingKey};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::KeyError;
use crate::jwks::RawKeyEntry;
pub use material::{EcCurve, KeyMaterial, KeyUse};

/// A key ready for signature verification
#[derive(Clone)]
pub struct VerificationKey {
    kid: String,
    algorithm: Option<Algorithm>,
    key_use: Option<KeyUse>,
    material: KeyMaterial,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("key_use", &self.key_use)
            .field("material", &self.material)
            .finish_non_exhaustive()
    }
}

impl VerificationKey {
    /// Assemble a key, checking that the declared algorithm fits the material
    ///
    /// Without a `kid` the RFC 7638 thumbprint is used as the identifier.
    pub(crate) fn new(
        kid: Option<String>,
        algorithm: Option<Algorithm>,
        key_use: Option<KeyUse>,
        material: KeyMaterial,
    ) -> Result<Self, KeyError> {
        if let Some(alg) = algorithm
            && !material.accepts(alg)
        {
            return Err(KeyError::malformed(
                kid.as_deref(),
                format!("algorithm {alg:?} cannot be used with a {} key", material.kty()),
            ));
        }

        let decoding_key = material.decoding_key().map_err(|e| {
            KeyError::malformed(kid.as_deref(), format!("unusable key material: {e}"))
        })?;

        let kid = kid.unwrap_or_else(|| material.thumbprint());

        Ok(Self {
            kid,
            algorithm,
            key_use,
            material,
            decoding_key,
        })
    }

    /// Key identifier
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Algorithm declared by the key (JWK `alg`), if any
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }

    /// Declared key use (JWK `use`), if any
    pub fn key_use(&self) -> Option<&KeyUse> {
        self.key_use.as_ref()
    }

    /// The public key material
    pub fn material(&self) -> &KeyMaterial {
        &self.material
    }

    /// RFC 7638 thumbprint of the key material
    pub fn thumbprint(&self) -> String {
        self.material.thumbprint()
    }

    /// Whether a token signed with `algorithm` may be checked against this key
    ///
    /// A declared algorithm must match exactly; otherwise any signature
    /// algorithm of the key's family is accepted.
    pub fn accepts(&self, algorithm: Algorithm) -> bool {
        match self.algorithm {
            Some(declared) => declared == algorithm,
            None => self.material.accepts(algorithm),
        }
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

/// Verification keys indexed by key ID
///
/// # Example
///
/// ```rust
/// use singpass_auth::KeyStore;
/// use serde_json::json;
///
/// let store = KeyStore::from_key_set(&[json!({
///     "kty": "EC",
///     "kid": "sig-2024",
///     "use": "sig",
///     "alg": "ES256",
///     "crv": "P-256",
///     "x": "f83OJ3D2xF1Bg8vub9tLe1gHMzV76e8Tus9uPHvRVEU",
///     "y": "x_FEzRu9m36HLN_tue659LNpXW6pCyStikYjKIWI5a0"
/// })]);
///
/// assert!(store.resolve("sig-2024").is_ok());
/// assert!(store.resolve("unknown").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    keys: HashMap<String, VerificationKey>,
}

impl KeyStore {
    /// Build a store from raw key set entries
    ///
    /// Entries that cannot be parsed are skipped with a warning. A store with
    /// no usable keys is still returned; lookups on it fail with
    /// [`KeyError::NotFound`].
    pub fn from_key_set(entries: &[RawKeyEntry]) -> Self {
        let mut keys = HashMap::with_capacity(entries.len());
        let mut skipped = 0usize;

        for entry in entries {
            match material::parse_jwk(entry) {
                Ok(key) => {
                    if keys.contains_key(key.kid()) {
                        warn!(kid = %key.kid(), "Duplicate key ID in key set, keeping the first entry");
                        skipped += 1;
                        continue;
                    }
                    debug!(
                        kid = %key.kid(),
                        kty = key.material().kty(),
                        alg = ?key.algorithm(),
                        "Parsed JWK"
                    );
                    keys.insert(key.kid().to_string(), key);
                }
                Err(e) => {
                    warn!(error = %e, "Skipping unusable key set entry");
                    skipped += 1;
                }
            }
        }

        info!(key_count = keys.len(), skipped, "Built key store from key set");
        Self { keys }
    }

    /// Build a single-key store from a PEM public key
    ///
    /// The key ID is the key's RFC 7638 thumbprint.
    ///
    /// # Errors
    /// Returns [`KeyError::Malformed`] if the PEM is not an RSA, P-256,
    /// P-384 or Ed25519 public key.
    pub fn from_pem(pem: &str) -> Result<Self, KeyError> {
        let material = pem::parse_public_key_pem(pem)?;
        Self::single(VerificationKey::new(None, None, None, material)?)
    }

    /// Build a single-key store from a PEM public key under an explicit key ID
    ///
    /// # Errors
    /// Returns [`KeyError::Malformed`] if the PEM is not an RSA, P-256,
    /// P-384 or Ed25519 public key.
    pub fn from_pem_with_kid(pem: &str, kid: impl Into<String>) -> Result<Self, KeyError> {
        let material = pem::parse_public_key_pem(pem)?;
        Self::single(VerificationKey::new(Some(kid.into()), None, None, material)?)
    }

    /// Load keys from a local file
    ///
    /// The file may contain a PEM public key, a single JWK, or a JWK Set.
    /// Entries of a JWK Set are parsed best-effort, but the file must yield
    /// at least one usable key.
    ///
    /// # Errors
    /// Returns [`KeyError::SourceUnavailable`] if the file cannot be read and
    /// [`KeyError::Malformed`] if its contents are not usable key material.
    pub async fn load_file(path: impl AsRef<Path>) -> Result<Self, KeyError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| KeyError::SourceUnavailable {
                path: path.to_path_buf(),
                source,
            })?;

        let contents = String::from_utf8(bytes)
            .map_err(|_| KeyError::malformed(None, "key file is not valid UTF-8"))?;

        let store = Self::from_file_contents(&contents)?;
        debug!(path = %path.display(), key_count = store.len(), "Loaded key file");
        Ok(store)
    }

    fn from_file_contents(contents: &str) -> Result<Self, KeyError> {
        if contents.trim_start().starts_with("-----BEGIN") {
            return Self::from_pem(contents);
        }

        let value: Value = serde_json::from_str(contents)
            .map_err(|e| KeyError::malformed(None, format!("key file is neither PEM nor JSON: {e}")))?;

        match value.get("keys") {
            Some(Value::Array(entries)) => {
                let store = Self::from_key_set(entries);
                if store.is_empty() {
                    return Err(KeyError::malformed(
                        None,
                        "key set file contains no usable keys",
                    ));
                }
                Ok(store)
            }
            Some(_) => Err(KeyError::malformed(None, "'keys' is not an array")),
            None => Self::single(material::parse_jwk(&value)?),
        }
    }

    fn single(key: VerificationKey) -> Result<Self, KeyError> {
        debug!(kid = %key.kid(), kty = key.material().kty(), "Built single-key store");
        let mut keys = HashMap::with_capacity(1);
        keys.insert(key.kid().to_string(), key);
        Ok(Self { keys })
    }

    /// Look up a key by ID
    ///
    /// # Errors
    /// Returns [`KeyError::NotFound`] if no key has this ID.
    pub fn resolve(&self, kid: &str) -> Result<&VerificationKey, KeyError> {
        self.keys.get(kid).ok_or_else(|| KeyError::NotFound {
            kid: kid.to_string(),
        })
    }

    /// Look up a key by ID, returning `None` when absent
    pub fn get(&self, kid: &str) -> Option<&VerificationKey> {
        self.keys.get(kid)
    }

    /// Whether a key with this ID is present
    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    /// Number of usable keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the store holds no usable keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// IDs of all keys in the store, in no particular order
    pub fn key_ids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }
}
