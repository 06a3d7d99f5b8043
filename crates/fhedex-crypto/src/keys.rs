//! Encryption key handles.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;
use crate::hkdf::derive_key_id;
use crate::types::{KEY_ID_LENGTH, KEY_LENGTH};

/// A 256-bit symmetric key for the ciphertext codec.
///
/// The secret is zeroized on drop. The fingerprint (`id`) is public and is
/// embedded in every ciphertext issued under this key, so a decryption attempt
/// with the wrong key is detected before any arithmetic happens.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyHandle {
    secret: [u8; KEY_LENGTH],
    #[zeroize(skip)]
    id: [u8; KEY_ID_LENGTH],
}

impl KeyHandle {
    /// Generate a fresh random key.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut secret = [0u8; KEY_LENGTH];
        getrandom::getrandom(&mut secret).map_err(|e| CryptoError::RngFailed(e.to_string()))?;
        let handle = Self::from_bytes(&secret);
        secret.zeroize();
        handle
    }

    /// Build a handle from raw key material (must be 32 bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != KEY_LENGTH {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_LENGTH,
                got: bytes.len(),
            });
        }
        let mut secret = [0u8; KEY_LENGTH];
        secret.copy_from_slice(bytes);
        let id = derive_key_id(&secret)?;
        Ok(Self { secret, id })
    }

    /// Public fingerprint of this key.
    pub fn id(&self) -> &[u8; KEY_ID_LENGTH] {
        &self.id
    }

    /// Public fingerprint as lowercase hex.
    pub fn id_hex(&self) -> String {
        hex::encode(self.id)
    }

    pub(crate) fn secret(&self) -> &[u8] {
        &self.secret
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyHandle")
            .field("id", &self.id_hex())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_distinct() {
        let a = KeyHandle::generate().unwrap();
        let b = KeyHandle::generate().unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn same_bytes_same_fingerprint() {
        let a = KeyHandle::from_bytes(&[5u8; 32]).unwrap();
        let b = KeyHandle::from_bytes(&[5u8; 32]).unwrap();
        assert_eq!(a.id(), b.id());
        assert_eq!(a.id_hex().len(), 32);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(matches!(
            KeyHandle::from_bytes(&[0u8; 16]),
            Err(CryptoError::InvalidKeyLength { expected: 32, got: 16 })
        ));
    }

    #[test]
    fn debug_does_not_print_secret() {
        let key = KeyHandle::from_bytes(&[0xAB; 32]).unwrap();
        let printed = format!("{:?}", key);
        assert!(printed.contains(&key.id_hex()));
        assert!(!printed.contains("171, 171"));
    }
}
