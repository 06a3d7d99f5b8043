//! ECDSA P-256 signing and verification primitives.
//!
//! Signatures are IEEE P1363 format (raw r||s, 64 bytes). Public credentials
//! travel as JWK (`kty: EC`, `crv: P-256`).

use base64ct::{Base64UrlUnpadded, Encoding};
use ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use serde_json::Value;

use crate::error::CryptoError;

/// Sign a message with ECDSA P-256 + SHA-256.
///
/// # Returns
/// 64-byte IEEE P1363 signature (r||s)
pub fn sign(private_key: &SigningKey, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let signature: Signature = private_key
        .try_sign(message)
        .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
    Ok(signature.to_bytes().to_vec())
}

/// Verify an ECDSA P-256 + SHA-256 signature against an imported key.
///
/// Returns false for any malformed signature; never errors.
pub fn verify(public_key: &VerifyingKey, message: &[u8], signature_bytes: &[u8]) -> bool {
    match Signature::from_slice(signature_bytes) {
        Ok(signature) => public_key.verify(message, &signature).is_ok(),
        Err(_) => false,
    }
}

fn decode_coordinate(jwk: &Value, field: &'static str) -> Result<Vec<u8>, CryptoError> {
    let encoded = jwk
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or(CryptoError::MissingJwkField(field))?;
    let bytes = Base64UrlUnpadded::decode_vec(encoded)
        .map_err(|e| CryptoError::InvalidJwk(format!("{}: {}", field, e)))?;
    if bytes.len() > 32 {
        return Err(CryptoError::InvalidJwk(format!("{}: coordinate too long", field)));
    }
    Ok(bytes)
}

/// Import a P-256 public key from JWK format.
pub fn import_public_key_jwk(jwk: &Value) -> Result<VerifyingKey, CryptoError> {
    if let Some(crv) = jwk.get("crv").and_then(|v| v.as_str()) {
        if crv != "P-256" {
            return Err(CryptoError::InvalidJwk(format!("unsupported curve {}", crv)));
        }
    }
    let x_bytes = decode_coordinate(jwk, "x")?;
    let y_bytes = decode_coordinate(jwk, "y")?;

    // SEC1 uncompressed point: 0x04 || x || y, coordinates left-padded to 32 bytes
    let mut uncompressed = Vec::with_capacity(1 + 32 + 32);
    uncompressed.push(0x04);
    uncompressed.extend(std::iter::repeat_n(0u8, 32 - x_bytes.len()));
    uncompressed.extend_from_slice(&x_bytes);
    uncompressed.extend(std::iter::repeat_n(0u8, 32 - y_bytes.len()));
    uncompressed.extend_from_slice(&y_bytes);

    VerifyingKey::from_sec1_bytes(&uncompressed)
        .map_err(|e| CryptoError::InvalidJwk(format!("P-256 point: {}", e)))
}

/// Export a P-256 verifying key to JWK format.
pub fn export_public_key_jwk(key: &VerifyingKey) -> Result<Value, CryptoError> {
    let point = key.to_encoded_point(false);
    let x = point.x().ok_or(CryptoError::MissingJwkField("x"))?;
    let y = point.y().ok_or(CryptoError::MissingJwkField("y"))?;

    Ok(serde_json::json!({
        "kty": "EC",
        "crv": "P-256",
        "x": Base64UrlUnpadded::encode_string(x.as_slice()),
        "y": Base64UrlUnpadded::encode_string(y.as_slice()),
    }))
}

/// Generate a new P-256 signing key pair.
pub fn generate_p256_keypair() -> SigningKey {
    SigningKey::random(&mut p256::elliptic_curve::rand_core::OsRng)
}
