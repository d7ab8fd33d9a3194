//! PEM public key decoding
//!
//! Providers hand out signing keys as PEM as often as JWK. The text is
//! normalized first (per-line trimming, blank lines dropped) because keys
//! pasted into config files or string literals usually arrive indented.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use spki::{Document, ObjectIdentifier, SubjectPublicKeyInfoRef};

use super::material::{EcCurve, KeyMaterial};
use crate::error::KeyError;

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");
const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

/// Strip indentation and blank lines so strict RFC 7468 parsers accept the text
pub(crate) fn normalize_pem(text: &str) -> String {
    let mut normalized = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    normalized.push('\n');
    normalized
}

/// Label of the first PEM block, e.g. `PUBLIC KEY`
fn pem_label(normalized: &str) -> Option<&str> {
    normalized
        .lines()
        .next()?
        .strip_prefix("-----BEGIN ")?
        .strip_suffix("-----")
}

/// Decode a PEM public key into key material
///
/// Accepts `PUBLIC KEY` (SubjectPublicKeyInfo holding an RSA, P-256, P-384 or
/// Ed25519 key) and `RSA PUBLIC KEY` (PKCS#1). Private keys are refused
/// outright.
pub(crate) fn parse_public_key_pem(text: &str) -> Result<KeyMaterial, KeyError> {
    let pem = normalize_pem(text);
    let label = pem_label(&pem)
        .ok_or_else(|| KeyError::malformed(None, "no PEM '-----BEGIN' header found"))?;

    match label {
        "PUBLIC KEY" => parse_spki_pem(&pem),
        "RSA PUBLIC KEY" => rsa::RsaPublicKey::from_pkcs1_pem(&pem)
            .map(|key| rsa_material(&key))
            .map_err(|e| KeyError::malformed(None, format!("invalid PKCS#1 RSA public key: {e}"))),
        "PRIVATE KEY" | "RSA PRIVATE KEY" | "EC PRIVATE KEY" | "ENCRYPTED PRIVATE KEY" => {
            Err(KeyError::malformed(
                None,
                "expected a public key but the PEM holds private key material",
            ))
        }
        other => Err(KeyError::malformed(
            None,
            format!("unsupported PEM block '{other}'"),
        )),
    }
}

/// Dispatch a SubjectPublicKeyInfo on its algorithm OID
fn parse_spki_pem(pem: &str) -> Result<KeyMaterial, KeyError> {
    let (_, document) = Document::from_pem(pem)
        .map_err(|e| KeyError::malformed(None, format!("invalid PEM encoding: {e}")))?;
    let spki = SubjectPublicKeyInfoRef::try_from(document.as_bytes())
        .map_err(|e| KeyError::malformed(None, format!("invalid SubjectPublicKeyInfo: {e}")))?;

    let key_bytes = spki.subject_public_key.as_bytes().ok_or_else(|| {
        KeyError::malformed(None, "SubjectPublicKeyInfo key is not a whole number of bytes")
    })?;

    match spki.algorithm.oid {
        oid if oid == RSA_ENCRYPTION => rsa::RsaPublicKey::from_public_key_der(document.as_bytes())
            .map(|key| rsa_material(&key))
            .map_err(|e| KeyError::malformed(None, format!("invalid RSA public key: {e}"))),
        oid if oid == EC_PUBLIC_KEY => {
            let curve = spki.algorithm.parameters_oid().map_err(|e| {
                KeyError::malformed(None, format!("EC public key without a named curve: {e}"))
            })?;
            match curve {
                oid if oid == SECP256R1 => p256_material(key_bytes),
                oid if oid == SECP384R1 => uncompressed_ec_material(EcCurve::P384, key_bytes),
                other => Err(KeyError::malformed(
                    None,
                    format!("unsupported EC curve OID {other}"),
                )),
            }
        }
        oid if oid == ED25519 => {
            if key_bytes.len() != 32 {
                return Err(KeyError::malformed(
                    None,
                    format!("Ed25519 public key is {} bytes, expected 32", key_bytes.len()),
                ));
            }
            Ok(KeyMaterial::Ed25519 {
                x: URL_SAFE_NO_PAD.encode(key_bytes),
            })
        }
        other => Err(KeyError::malformed(
            None,
            format!("unsupported public key algorithm OID {other}"),
        )),
    }
}

fn rsa_material(key: &rsa::RsaPublicKey) -> KeyMaterial {
    KeyMaterial::Rsa {
        n: URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()),
        e: URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()),
    }
}

/// P-256 points may arrive compressed; `p256` expands them
fn p256_material(sec1: &[u8]) -> Result<KeyMaterial, KeyError> {
    let key = p256::PublicKey::from_sec1_bytes(sec1)
        .map_err(|_| KeyError::malformed(None, "P-256 public key is not a valid curve point"))?;
    let point = key.to_encoded_point(false);
    uncompressed_ec_material(EcCurve::P256, point.as_bytes())
}

/// Split an uncompressed SEC1 point (`0x04 || x || y`) into JWK coordinates
fn uncompressed_ec_material(curve: EcCurve, sec1: &[u8]) -> Result<KeyMaterial, KeyError> {
    let len = curve.coordinate_len();
    match sec1.split_first() {
        Some((0x04, coordinates)) if coordinates.len() == 2 * len => {
            let (x, y) = coordinates.split_at(len);
            Ok(KeyMaterial::Ec {
                curve,
                x: URL_SAFE_NO_PAD.encode(x),
                y: URL_SAFE_NO_PAD.encode(y),
            })
        }
        _ => Err(KeyError::malformed(
            None,
            format!("{} public key must be an uncompressed point", curve.name()),
        )),
    }
}
