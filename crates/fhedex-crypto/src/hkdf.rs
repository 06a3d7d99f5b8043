//! HKDF-SHA256 derivations for key fingerprints and ciphertext pads.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::CryptoError;
use crate::types::{KEY_ID_LENGTH, NONCE_LENGTH};

/// Fixed HKDF salt for key fingerprint derivation.
const KEY_ID_SALT: &[u8] = b"fhedex-key-id-salt-v1";

/// Info string for key fingerprint derivation.
const KEY_ID_INFO: &[u8] = b"fhedex:key-id:v1";

/// Info string for pad derivation; the nonce is the salt.
const PAD_INFO: &[u8] = b"fhedex:pad:v1";

/// Derive `N` bytes using HKDF-SHA256.
///
/// # Arguments
/// * `ikm` - Input keying material
/// * `salt` - Salt for domain separation
/// * `info` - Context and application-specific info
pub fn hkdf_expand<const N: usize>(
    ikm: &[u8],
    salt: &[u8],
    info: &[u8],
) -> Result<[u8; N], CryptoError> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = [0u8; N];
    hk.expand(info, &mut okm)
        .map_err(|e| CryptoError::KeyDerivation(format!("HKDF expand failed: {}", e)))?;
    Ok(okm)
}

/// Derive the public fingerprint of an encryption key.
///
/// One-way: the fingerprint identifies the issuing key without revealing it.
pub fn derive_key_id(secret: &[u8]) -> Result<[u8; KEY_ID_LENGTH], CryptoError> {
    hkdf_expand(secret, KEY_ID_SALT, KEY_ID_INFO)
}

/// Derive the additive pad for one ciphertext from the key and its nonce.
pub fn derive_pad(secret: &[u8], nonce: &[u8; NONCE_LENGTH]) -> Result<u128, CryptoError> {
    let okm: [u8; 16] = hkdf_expand(secret, nonce, PAD_INFO)?;
    Ok(u128::from_le_bytes(okm))
}
