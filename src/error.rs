use fhedex_auth::AuthError;
use fhedex_crypto::CryptoError;
use thiserror::Error;

use crate::types::SwapStage;

// ============================================================================
// StoreError
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record {0} not found")]
    NotFound(String),

    #[error("Record {0} is already finalized")]
    AlreadyFinalized(String),

    #[error("Conflicting write to record {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ============================================================================
// SwapError
// ============================================================================

#[derive(Debug, Error)]
pub enum SwapError {
    #[error("Invalid swap request: {0}")]
    InvalidRequest(String),

    #[error("Codec error: {0}")]
    Codec(CryptoError),

    #[error("No rate available for asset {symbol}")]
    UnknownPair { symbol: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Authorization expired: {0}")]
    ChallengeExpired(String),

    #[error("Swap record {0} is already finalized")]
    AlreadyFinalized(String),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SwapError {
    /// Whether resubmitting the same request can succeed without other changes
    /// beyond supplying missing data or waiting for the store.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SwapError::UnknownPair { .. } | SwapError::Store(StoreError::Unavailable(_))
        )
    }
}

impl From<CryptoError> for SwapError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::UnknownPair { symbol } => SwapError::UnknownPair { symbol },
            other => SwapError::Codec(other),
        }
    }
}

impl From<StoreError> for SwapError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyFinalized(id) => SwapError::AlreadyFinalized(id),
            other => SwapError::Store(other),
        }
    }
}

impl From<AuthError> for SwapError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Expired(what) => SwapError::ChallengeExpired(what.to_string()),
            AuthError::Rejected(reason) | AuthError::Unauthorized(reason) => {
                SwapError::Unauthorized(reason)
            }
            AuthError::Capacity(limit) => SwapError::Unauthorized(format!(
                "too many outstanding challenges (limit {})",
                limit
            )),
            AuthError::InvalidCredential { subject, reason } => {
                SwapError::Unauthorized(format!("invalid credential for {}: {}", subject, reason))
            }
            AuthError::RngFailed(msg) => SwapError::Codec(CryptoError::RngFailed(msg)),
            AuthError::Crypto(e) => e.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SwapError>;

// ============================================================================
// SwapFailure
// ============================================================================

/// Terminal failure of a swap, with the stage it reached and the record id
/// if one was assigned.
#[derive(Debug, Error)]
#[error("swap failed at {stage}: {error}")]
pub struct SwapFailure {
    pub stage: SwapStage,
    pub record_id: Option<String>,
    #[source]
    pub error: SwapError,
}

impl SwapFailure {
    pub fn new(stage: SwapStage, record_id: Option<String>, error: SwapError) -> Self {
        Self {
            stage,
            record_id,
            error,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }
}
