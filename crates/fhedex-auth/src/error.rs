use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0} expired")]
    Expired(&'static str),

    #[error("Challenge rejected: {0}")]
    Rejected(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Too many outstanding challenges (limit {0})")]
    Capacity(usize),

    #[error("Invalid credential for {subject}: {reason}")]
    InvalidCredential { subject: String, reason: String },

    #[error("Random number generation failed: {0}")]
    RngFailed(String),

    #[error("Crypto error: {0}")]
    Crypto(#[from] fhedex_crypto::CryptoError),
}
