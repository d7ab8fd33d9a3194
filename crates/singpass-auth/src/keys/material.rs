//! Typed key material and JWK parsing
//!
//! Provider key sets are loosely shaped JSON. Each entry is parsed into a
//! [`KeyMaterial`] variant through a dedicated per-`kty` function, so an
//! unsupported or incomplete key surfaces as [`KeyError::Malformed`] rather
//! than a missing field deep inside signature verification.
//!
//! Supported: RSA, EC (P-256, P-384) and OKP (Ed25519). Symmetric `oct` keys
//! are refused; a relying party never verifies provider assertions with a
//! shared secret.

use std::str::FromStr;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use super::VerificationKey;
use crate::error::KeyError;

/// Elliptic curves usable for ECDSA verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EcCurve {
    /// NIST P-256 (ES256)
    P256,
    /// NIST P-384 (ES384)
    P384,
}

impl EcCurve {
    /// JWK `crv` name
    pub fn name(self) -> &'static str {
        match self {
            Self::P256 => "P-256",
            Self::P384 => "P-384",
        }
    }

    /// Look up a curve by its JWK `crv` name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "P-256" => Some(Self::P256),
            "P-384" => Some(Self::P384),
            _ => None,
        }
    }

    /// Byte length of one affine coordinate
    pub fn coordinate_len(self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
        }
    }

    /// The only JWS algorithm defined for this curve
    pub fn algorithm(self) -> Algorithm {
        match self {
            Self::P256 => Algorithm::ES256,
            Self::P384 => Algorithm::ES384,
        }
    }
}

/// Declared purpose of a key (JWK `use`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyUse {
    /// `sig`
    Signature,
    /// `enc`
    Encryption,
    /// Any other value, kept verbatim
    Other(String),
}

impl From<&str> for KeyUse {
    fn from(value: &str) -> Self {
        match value {
            "sig" => Self::Signature,
            "enc" => Self::Encryption,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Public key material, one variant per supported key type
///
/// Components are base64url strings without padding, exactly as they appear
/// in a JWK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    /// RSA public key
    Rsa {
        /// Modulus
        n: String,
        /// Public exponent
        e: String,
    },
    /// Elliptic curve public key
    Ec {
        /// Curve
        curve: EcCurve,
        /// X coordinate
        x: String,
        /// Y coordinate
        y: String,
    },
    /// Ed25519 public key (JWK `kty: OKP`)
    Ed25519 {
        /// Public key bytes
        x: String,
    },
}

impl KeyMaterial {
    /// JWK `kty` value
    pub fn kty(&self) -> &'static str {
        match self {
            Self::Rsa { .. } => "RSA",
            Self::Ec { .. } => "EC",
            Self::Ed25519 { .. } => "OKP",
        }
    }

    /// Algorithm assumed when neither the key nor the caller names one
    pub fn default_algorithm(&self) -> Algorithm {
        match self {
            Self::Rsa { .. } => Algorithm::RS256,
            Self::Ec { curve, .. } => curve.algorithm(),
            Self::Ed25519 { .. } => Algorithm::EdDSA,
        }
    }

    /// Whether `algorithm` is a signature algorithm for this key type
    pub fn accepts(&self, algorithm: Algorithm) -> bool {
        match self {
            Self::Rsa { .. } => matches!(
                algorithm,
                Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512
            ),
            Self::Ec { curve, .. } => algorithm == curve.algorithm(),
            Self::Ed25519 { .. } => algorithm == Algorithm::EdDSA,
        }
    }

    /// RFC 7638 JWK thumbprint (SHA-256, base64url)
    ///
    /// Members are emitted in lexicographic order with no whitespace, which is
    /// what the RFC hashes.
    pub fn thumbprint(&self) -> String {
        let canonical = match self {
            Self::Rsa { n, e } => json!({ "e": e, "kty": "RSA", "n": n }),
            Self::Ec { curve, x, y } => {
                json!({ "crv": curve.name(), "kty": "EC", "x": x, "y": y })
            }
            Self::Ed25519 { x } => json!({ "crv": "Ed25519", "kty": "OKP", "x": x }),
        };

        let digest = Sha256::digest(canonical.to_string().as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    /// Build the `jsonwebtoken` verification key
    pub(crate) fn decoding_key(&self) -> Result<DecodingKey, jsonwebtoken::errors::Error> {
        match self {
            Self::Rsa { n, e } => DecodingKey::from_rsa_components(n, e),
            Self::Ec { x, y, .. } => DecodingKey::from_ec_components(x, y),
            Self::Ed25519 { x } => DecodingKey::from_ed_components(x),
        }
    }
}

/// The JWK members this crate reads. Everything else is ignored.
#[derive(Debug, Deserialize)]
struct JwkFields {
    kty: Option<String>,
    kid: Option<String>,
    #[serde(rename = "use")]
    key_use: Option<String>,
    alg: Option<String>,
    crv: Option<String>,
    n: Option<String>,
    e: Option<String>,
    x: Option<String>,
    y: Option<String>,
}

/// Parse one raw key set entry into a verification key
pub(crate) fn parse_jwk(entry: &Value) -> Result<VerificationKey, KeyError> {
    let fields = JwkFields::deserialize(entry).map_err(|e| {
        let kid = entry.get("kid").and_then(Value::as_str);
        KeyError::malformed(kid, format!("not a JWK object: {e}"))
    })?;
    let kid = fields.kid.as_deref();

    let kty = fields
        .kty
        .as_deref()
        .ok_or_else(|| KeyError::malformed(kid, "missing 'kty'"))?;

    let material = match kty {
        "RSA" => parse_rsa(&fields)?,
        "EC" => parse_ec(&fields)?,
        "OKP" => parse_okp(&fields)?,
        "oct" => {
            return Err(KeyError::malformed(
                kid,
                "symmetric keys cannot verify provider-signed assertions",
            ));
        }
        other => {
            return Err(KeyError::malformed(
                kid,
                format!("unsupported key type '{other}'"),
            ));
        }
    };

    let key_use = fields.key_use.as_deref().map(KeyUse::from);
    if key_use == Some(KeyUse::Encryption) {
        return Err(KeyError::malformed(
            kid,
            "key is published for encryption ('use': 'enc'), not signature verification",
        ));
    }

    let algorithm = fields
        .alg
        .as_deref()
        .map(|alg| parse_algorithm(kid, alg))
        .transpose()?;

    VerificationKey::new(fields.kid.clone(), algorithm, key_use, material)
}

/// Parse a JWK `alg` into a JWS signature algorithm
///
/// JWE key-management algorithms (`RSA-OAEP`, `ECDH-ES+A128KW`, ...) and HMAC
/// are rejected.
fn parse_algorithm(kid: Option<&str>, alg: &str) -> Result<Algorithm, KeyError> {
    let algorithm = Algorithm::from_str(alg).map_err(|_| {
        KeyError::malformed(kid, format!("'{alg}' is not a JWS signature algorithm"))
    })?;

    if matches!(
        algorithm,
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
    ) {
        return Err(KeyError::malformed(
            kid,
            format!("HMAC algorithm {alg} is not allowed for provider keys"),
        ));
    }

    Ok(algorithm)
}

fn parse_rsa(fields: &JwkFields) -> Result<KeyMaterial, KeyError> {
    let kid = fields.kid.as_deref();
    let n = required_component(kid, "RSA", "n", fields.n.as_deref())?;
    let e = required_component(kid, "RSA", "e", fields.e.as_deref())?;

    decode_component(kid, "n", &n, None)?;
    decode_component(kid, "e", &e, None)?;

    Ok(KeyMaterial::Rsa { n, e })
}

fn parse_ec(fields: &JwkFields) -> Result<KeyMaterial, KeyError> {
    let kid = fields.kid.as_deref();
    let crv = fields
        .crv
        .as_deref()
        .ok_or_else(|| KeyError::malformed(kid, "EC key missing 'crv' parameter"))?;
    let curve = EcCurve::from_name(crv)
        .ok_or_else(|| KeyError::malformed(kid, format!("unsupported EC curve '{crv}'")))?;

    let x = required_component(kid, "EC", "x", fields.x.as_deref())?;
    let y = required_component(kid, "EC", "y", fields.y.as_deref())?;

    decode_component(kid, "x", &x, Some(curve.coordinate_len()))?;
    decode_component(kid, "y", &y, Some(curve.coordinate_len()))?;

    Ok(KeyMaterial::Ec { curve, x, y })
}

fn parse_okp(fields: &JwkFields) -> Result<KeyMaterial, KeyError> {
    let kid = fields.kid.as_deref();
    match fields.crv.as_deref() {
        Some("Ed25519") => {}
        Some(other) => {
            return Err(KeyError::malformed(
                kid,
                format!("unsupported OKP curve '{other}'"),
            ));
        }
        None => return Err(KeyError::malformed(kid, "OKP key missing 'crv' parameter")),
    }

    let x = required_component(kid, "OKP", "x", fields.x.as_deref())?;
    decode_component(kid, "x", &x, Some(32))?;

    Ok(KeyMaterial::Ed25519 { x })
}

/// Fetch a required member, dropping any base64 padding a provider may have added
fn required_component(
    kid: Option<&str>,
    kty: &str,
    name: &str,
    value: Option<&str>,
) -> Result<String, KeyError> {
    value
        .map(|v| v.trim_end_matches('=').to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| KeyError::malformed(kid, format!("{kty} key missing '{name}' parameter")))
}

fn decode_component(
    kid: Option<&str>,
    name: &str,
    value: &str,
    expected_len: Option<usize>,
) -> Result<(), KeyError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| KeyError::malformed(kid, format!("'{name}' is not base64url: {e}")))?;

    if let Some(expected) = expected_len
        && bytes.len() != expected
    {
        return Err(KeyError::malformed(
            kid,
            format!(
                "'{name}' is {} bytes, expected {expected}",
                bytes.len()
            ),
        ));
    }

    Ok(())
}
