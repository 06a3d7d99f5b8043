//! Authorization for decrypting swap outputs.
//!
//! A requester proves control of a registered P-256 credential by signing a
//! fresh nonce. A verified challenge yields a short-lived, single-use
//! [`DecryptCapability`].

pub mod challenge;
pub mod clock;
pub mod error;
pub mod gate;
pub mod types;

pub use challenge::{generate_nonce, sign_challenge, signing_message};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::AuthError;
pub use gate::{AuthorizationGate, GateOptions};
pub use types::{
    AuthorizationChallenge, ChallengeStatus, DecryptCapability, PrincipalId,
    DEFAULT_CAPABILITY_TTL_SECS, DEFAULT_MAX_OUTSTANDING_CHALLENGES, DEFAULT_VALIDITY_WINDOW_SECS,
    NONCE_LENGTH,
};
