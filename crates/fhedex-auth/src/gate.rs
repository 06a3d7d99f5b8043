//! Authorization gate: challenge issuance, verification and capability redemption.
//!
//! Per challenge: `Issued -> {Verified, Expired, Rejected}`, exactly once.
//! A verified challenge yields one `DecryptCapability`, consumed on redemption.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use fhedex_crypto::{import_public_key_jwk, verify, VerifyingKey};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::challenge::{generate_nonce, signing_message};
use crate::clock::{Clock, SystemClock};
use crate::error::AuthError;
use crate::types::{
    AuthorizationChallenge, ChallengeStatus, DecryptCapability, PrincipalId,
    DEFAULT_CAPABILITY_TTL_SECS, DEFAULT_MAX_OUTSTANDING_CHALLENGES, DEFAULT_VALIDITY_WINDOW_SECS,
};

/// Configuration for `AuthorizationGate`.
pub struct GateOptions {
    /// Seconds after issuance during which a challenge can be verified.
    pub validity_window_secs: i64,
    /// Seconds a capability stays redeemable after verification.
    pub capability_ttl_secs: i64,
    /// Challenges tracked at once. When full, settled and stale entries are
    /// pruned before a new challenge is refused.
    pub max_outstanding_challenges: usize,
    pub clock: Arc<dyn Clock>,
}

impl Default for GateOptions {
    fn default() -> Self {
        Self {
            validity_window_secs: DEFAULT_VALIDITY_WINDOW_SECS,
            capability_ttl_secs: DEFAULT_CAPABILITY_TTL_SECS,
            max_outstanding_challenges: DEFAULT_MAX_OUTSTANDING_CHALLENGES,
            clock: Arc::new(SystemClock),
        }
    }
}

struct ChallengeEntry {
    challenge: AuthorizationChallenge,
    status: ChallengeStatus,
}

/// Keep only challenges that can still be verified. Returns how many were dropped.
fn prune_challenges(challenges: &mut HashMap<String, ChallengeEntry>, now: i64, window: i64) -> usize {
    let before = challenges.len();
    challenges.retain(|_, e| {
        e.status == ChallengeStatus::Issued && now - e.challenge.issued_at <= window
    });
    before - challenges.len()
}

fn prune_capabilities(capabilities: &mut HashMap<String, DecryptCapability>, now: i64) -> usize {
    let before = capabilities.len();
    capabilities.retain(|_, c| now <= c.expires_at);
    before - capabilities.len()
}

/// Validates a requester's right to one decryption.
///
/// Interior mutability via `parking_lot` locks; locks are never held across
/// signature verification.
pub struct AuthorizationGate {
    credentials: RwLock<HashMap<PrincipalId, VerifyingKey>>,
    challenges: Mutex<HashMap<String, ChallengeEntry>>,
    capabilities: Mutex<HashMap<String, DecryptCapability>>,
    validity_window_secs: i64,
    capability_ttl_secs: i64,
    max_outstanding_challenges: usize,
    clock: Arc<dyn Clock>,
}

impl AuthorizationGate {
    pub fn new(options: GateOptions) -> Self {
        Self {
            credentials: RwLock::new(HashMap::new()),
            challenges: Mutex::new(HashMap::new()),
            capabilities: Mutex::new(HashMap::new()),
            validity_window_secs: options.validity_window_secs,
            capability_ttl_secs: options.capability_ttl_secs,
            max_outstanding_challenges: options.max_outstanding_challenges,
            clock: options.clock,
        }
    }

    /// Register (or replace) the public credential of `subject` from a P-256 JWK.
    pub fn register_principal(&self, subject: PrincipalId, public_key_jwk: &Value) -> Result<(), AuthError> {
        let key = import_public_key_jwk(public_key_jwk).map_err(|e| AuthError::InvalidCredential {
            subject: subject.to_string(),
            reason: e.to_string(),
        })?;
        debug!(subject = %subject, "registered principal credential");
        self.credentials.write().insert(subject, key);
        Ok(())
    }

    /// Issue a fresh challenge bound to `subject` and the current time.
    ///
    /// Issued even for unknown subjects; verification then rejects, so the
    /// gate does not reveal which principals are registered.
    ///
    /// Fails with `Capacity` when `max_outstanding_challenges` challenges are
    /// still open after settled and stale ones are pruned.
    pub fn issue_challenge(&self, subject: &PrincipalId) -> Result<AuthorizationChallenge, AuthError> {
        let now = self.clock.now_secs();
        let challenge = AuthorizationChallenge {
            id: Uuid::new_v4().to_string(),
            subject: subject.clone(),
            nonce: generate_nonce()?,
            issued_at: now,
        };

        let mut challenges = self.challenges.lock();
        if challenges.len() >= self.max_outstanding_challenges {
            let removed = prune_challenges(&mut challenges, now, self.validity_window_secs);
            debug!(removed, "pruned challenges at capacity");
            if challenges.len() >= self.max_outstanding_challenges {
                warn!(subject = %subject, limit = self.max_outstanding_challenges, "challenge capacity reached");
                return Err(AuthError::Capacity(self.max_outstanding_challenges));
            }
        }
        challenges.insert(
            challenge.id.clone(),
            ChallengeEntry {
                challenge: challenge.clone(),
                status: ChallengeStatus::Issued,
            },
        );
        drop(challenges);

        debug!(challenge_id = %challenge.id, subject = %subject, "issued challenge");
        Ok(challenge)
    }

    /// Current status of a challenge, if the gate still tracks it.
    pub fn challenge_status(&self, challenge_id: &str) -> Option<ChallengeStatus> {
        self.challenges.lock().get(challenge_id).map(|e| e.status)
    }

    /// Verify a signed challenge and mint a single-use decryption capability.
    pub fn verify(
        &self,
        challenge: &AuthorizationChallenge,
        signature: &[u8],
    ) -> Result<DecryptCapability, AuthError> {
        // Claim the challenge before verifying so a concurrent second
        // verification of the same challenge can never also succeed.
        let stored = {
            let mut challenges = self.challenges.lock();
            let entry = challenges
                .get_mut(&challenge.id)
                .ok_or_else(|| AuthError::Rejected("unknown challenge".to_string()))?;
            if entry.status != ChallengeStatus::Issued {
                return Err(AuthError::Rejected("challenge already used".to_string()));
            }
            entry.status = ChallengeStatus::Rejected;
            entry.challenge.clone()
        };

        let now = self.clock.now_secs();
        let outcome = self.evaluate(&stored, challenge, signature, now);

        let status = match &outcome {
            Ok(()) => ChallengeStatus::Verified,
            Err(AuthError::Expired(_)) => ChallengeStatus::Expired,
            Err(_) => ChallengeStatus::Rejected,
        };
        if let Some(entry) = self.challenges.lock().get_mut(&stored.id) {
            entry.status = status;
        }

        if let Err(e) = outcome {
            warn!(challenge_id = %stored.id, subject = %stored.subject, error = %e, "challenge verification failed");
            return Err(e);
        }

        let capability = DecryptCapability {
            id: Uuid::new_v4().to_string(),
            subject: stored.subject.clone(),
            issued_at: now,
            expires_at: now + self.capability_ttl_secs,
        };
        let mut capabilities = self.capabilities.lock();
        prune_capabilities(&mut capabilities, now);
        capabilities.insert(capability.id.clone(), capability.clone());
        drop(capabilities);
        debug!(challenge_id = %stored.id, subject = %stored.subject, "challenge verified");
        Ok(capability)
    }

    fn evaluate(
        &self,
        stored: &AuthorizationChallenge,
        presented: &AuthorizationChallenge,
        signature: &[u8],
        now: i64,
    ) -> Result<(), AuthError> {
        if stored != presented {
            return Err(AuthError::Rejected(
                "challenge does not match the issued challenge".to_string(),
            ));
        }
        if now - stored.issued_at > self.validity_window_secs {
            return Err(AuthError::Expired("challenge"));
        }
        let credentials = self.credentials.read();
        let key = credentials
            .get(&stored.subject)
            .ok_or_else(|| AuthError::Rejected("no credential for subject".to_string()))?;
        if !verify(key, signing_message(stored), signature) {
            return Err(AuthError::Rejected("signature does not verify".to_string()));
        }
        Ok(())
    }

    /// Consume a capability. Succeeds at most once per capability.
    ///
    /// A presentation naming the wrong subject is refused without consuming
    /// the stored capability.
    pub fn redeem(&self, capability: &DecryptCapability) -> Result<(), AuthError> {
        let stored = match self.capabilities.lock().entry(capability.id.clone()) {
            Entry::Occupied(e) if e.get().subject == capability.subject => e.remove(),
            Entry::Occupied(_) => {
                return Err(AuthError::Unauthorized(
                    "capability subject mismatch".to_string(),
                ))
            }
            Entry::Vacant(_) => {
                return Err(AuthError::Unauthorized(
                    "capability unknown or already redeemed".to_string(),
                ))
            }
        };
        if self.clock.now_secs() > stored.expires_at {
            return Err(AuthError::Expired("capability"));
        }
        debug!(capability_id = %stored.id, subject = %stored.subject, "capability redeemed");
        Ok(())
    }

    /// Drop settled challenges, stale issued challenges and expired capabilities.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_secs();
        let removed = prune_challenges(&mut self.challenges.lock(), now, self.validity_window_secs);
        removed + prune_capabilities(&mut self.capabilities.lock(), now)
    }
}

impl Default for AuthorizationGate {
    fn default() -> Self {
        Self::new(GateOptions::default())
    }
}
