use std::fmt;

use serde::{Deserialize, Serialize};

/// Challenge nonce length in bytes.
pub const NONCE_LENGTH: usize = 32;

/// Default challenge validity window (5 minutes).
pub const DEFAULT_VALIDITY_WINDOW_SECS: i64 = 5 * 60;

/// Default lifetime of a decryption capability.
pub const DEFAULT_CAPABILITY_TTL_SECS: i64 = 60;

/// Default bound on challenges a gate tracks at once.
pub const DEFAULT_MAX_OUTSTANDING_CHALLENGES: usize = 10_000;

/// Identity of a party that may request decryption (e.g. a wallet address).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PrincipalId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A single-use signed-nonce challenge bound to one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationChallenge {
    pub id: String,
    pub subject: PrincipalId,
    pub nonce: [u8; NONCE_LENGTH],
    pub issued_at: i64,
}

/// Lifecycle of an issued challenge. Leaves `Issued` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    Issued,
    Verified,
    Expired,
    Rejected,
}

/// Proof that `subject` passed a challenge; redeemable for one decryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptCapability {
    pub id: String,
    pub subject: PrincipalId,
    pub issued_at: i64,
    pub expires_at: i64,
}
