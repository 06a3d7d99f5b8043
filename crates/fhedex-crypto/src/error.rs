use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Value out of range: {0}")]
    Range(String),

    #[error("Malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    #[error("Key mismatch: ciphertext was issued under key {expected}, got key {got}")]
    KeyMismatch { expected: String, got: String },

    #[error("No rate quote for asset {symbol}")]
    UnknownPair { symbol: String },

    #[error("Invalid rate for asset {symbol}: quotes must be positive")]
    InvalidRate { symbol: String },

    #[error("Invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("JWK missing {0}")]
    MissingJwkField(&'static str),

    #[error("Invalid JWK: {0}")]
    InvalidJwk(String),

    #[error("Random number generation failed: {0}")]
    RngFailed(String),
}
