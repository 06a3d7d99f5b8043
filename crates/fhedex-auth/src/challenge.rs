//! Nonce generation and challenge signing.

use fhedex_crypto::{sign, SigningKey};

use crate::error::AuthError;
use crate::types::{AuthorizationChallenge, NONCE_LENGTH};

/// Generate a cryptographically random challenge nonce.
pub fn generate_nonce() -> Result<[u8; NONCE_LENGTH], AuthError> {
    let mut nonce = [0u8; NONCE_LENGTH];
    getrandom::getrandom(&mut nonce).map_err(|e| AuthError::RngFailed(e.to_string()))?;
    Ok(nonce)
}

/// Bytes a requester signs to answer `challenge`: exactly the nonce.
pub fn signing_message(challenge: &AuthorizationChallenge) -> &[u8] {
    &challenge.nonce
}

/// Requester-side helper: sign a challenge with the subject's private key.
pub fn sign_challenge(
    signing_key: &SigningKey,
    challenge: &AuthorizationChallenge,
) -> Result<Vec<u8>, AuthError> {
    Ok(sign(signing_key, signing_message(challenge))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrincipalId;
    use fhedex_crypto::{generate_p256_keypair, verify};

    #[test]
    fn nonce_is_unique() {
        assert_ne!(generate_nonce().unwrap(), generate_nonce().unwrap());
    }

    #[test]
    fn signature_covers_nonce() {
        let key = generate_p256_keypair();
        let challenge = AuthorizationChallenge {
            id: "c1".to_string(),
            subject: PrincipalId::new("alice"),
            nonce: generate_nonce().unwrap(),
            issued_at: 0,
        };
        let signature = sign_challenge(&key, &challenge).unwrap();
        assert!(verify(key.verifying_key(), &challenge.nonce, &signature));

        let mut other = challenge.clone();
        other.nonce[0] ^= 0xFF;
        assert!(!verify(key.verifying_key(), signing_message(&other), &signature));
    }
}
