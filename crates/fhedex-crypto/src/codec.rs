//! Ciphertext codec.
//!
//! Wire format (all schemes):
//! [1 byte: version][8 bytes: issued_at, i64 BE][N bytes: scheme payload]
//!
//! Persisted string form: `fhe:<version>:<base64url(issued_at || payload)>`.
//!
//! The shipped scheme (version 1) is an additive pad over `Z/2^128`:
//! `body = m + pad(key, nonce)`. Multiplying by a public plaintext scalar
//! multiplies both the message and the pad, so the scheme carries the
//! cumulative public `multiplier` (to strip the pad) and `divisor` (to apply
//! the rational rate at decryption), much like CKKS tracks its scale.

use std::fmt;
use std::sync::Arc;

use base64ct::{Base64UrlUnpadded, Encoding};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::CryptoError;
use crate::fixed_point::{div_round, from_fixed, to_fixed, Ratio};
use crate::hkdf::derive_pad;
use crate::keys::KeyHandle;
use crate::types::{
    CIPHERTEXT_PREFIX, KEY_ID_LENGTH, MAX_DIVISOR, MAX_MULTIPLIER, NONCE_LENGTH,
    PAD_PAYLOAD_LENGTH, PAD_SCHEME_VERSION,
};

// ============================================================================
// Ciphertext
// ============================================================================

/// Opaque encrypted value tagged with its scheme version and issuance time.
///
/// Only a codec holding the issuing key can recover the plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ciphertext {
    version: u8,
    issued_at: i64,
    payload: Vec<u8>,
}

impl Ciphertext {
    pub fn new(version: u8, issued_at: i64, payload: Vec<u8>) -> Self {
        Self {
            version,
            issued_at,
            payload,
        }
    }

    /// Scheme/version tag.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Unix timestamp (seconds) at which this ciphertext was produced.
    pub fn issued_at(&self) -> i64 {
        self.issued_at
    }

    /// Scheme-specific payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Binary form: [version][issued_at:8B BE][payload].
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 8 + self.payload.len());
        out.push(self.version);
        out.extend_from_slice(&self.issued_at.to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Parse the binary form. The version is not checked here.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < 1 + 8 {
            return Err(CryptoError::MalformedCiphertext(
                "ciphertext too short".to_string(),
            ));
        }
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&bytes[1..9]);
        Ok(Self {
            version: bytes[0],
            issued_at: i64::from_be_bytes(ts),
            payload: bytes[9..].to_vec(),
        })
    }

    /// Tagged string form used in persisted documents.
    pub fn to_encoded(&self) -> String {
        let mut body = Vec::with_capacity(8 + self.payload.len());
        body.extend_from_slice(&self.issued_at.to_be_bytes());
        body.extend_from_slice(&self.payload);
        format!(
            "{}:{}:{}",
            CIPHERTEXT_PREFIX,
            self.version,
            Base64UrlUnpadded::encode_string(&body)
        )
    }

    /// Parse the tagged string form.
    pub fn from_encoded(encoded: &str) -> Result<Self, CryptoError> {
        let malformed = |msg: &str| CryptoError::MalformedCiphertext(msg.to_string());

        let (prefix, rest) = encoded
            .split_once(':')
            .ok_or_else(|| malformed("missing scheme tag"))?;
        if prefix != CIPHERTEXT_PREFIX {
            return Err(malformed("unrecognized scheme prefix"));
        }
        let (version, body) = rest
            .split_once(':')
            .ok_or_else(|| malformed("missing version tag"))?;
        let version: u8 = version
            .parse()
            .map_err(|_| malformed("version tag is not a number"))?;
        let body = Base64UrlUnpadded::decode_vec(body).map_err(|_| malformed("invalid base64url"))?;

        let mut bytes = Vec::with_capacity(1 + body.len());
        bytes.push(version);
        bytes.extend_from_slice(&body);
        Self::from_bytes(&bytes)
    }

    /// SHA-256 of the binary form, hex encoded. Safe to log.
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.to_bytes()))
    }
}

impl fmt::Display for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_encoded())
    }
}

impl Serialize for Ciphertext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_encoded())
    }
}

impl<'de> Deserialize<'de> for Ciphertext {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Ciphertext::from_encoded(&encoded).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// HomomorphicScheme
// ============================================================================

/// A ciphertext scheme supporting multiplication by a public plaintext ratio.
///
/// Implementations must guarantee `decrypt(encrypt(v, k), k) == v` for every
/// representable `v`, and `decrypt(scale(c, r), k) == round(decrypt(c, k) * r)`.
pub trait HomomorphicScheme: Send + Sync {
    /// Version tag written into every ciphertext this scheme issues.
    fn version(&self) -> u8;

    fn encrypt(&self, value: Decimal, key: &KeyHandle) -> Result<Ciphertext, CryptoError>;

    fn decrypt(&self, ciphertext: &Ciphertext, key: &KeyHandle) -> Result<Decimal, CryptoError>;

    /// Multiply the encrypted value by `ratio` without the key.
    fn scale(&self, ciphertext: &Ciphertext, ratio: Ratio) -> Result<Ciphertext, CryptoError>;
}

// ============================================================================
// PadScheme (version 1)
// ============================================================================

/// Additive pad scheme over `Z/2^128` keyed by HKDF-SHA256.
pub struct PadScheme;

struct PadPayload {
    key_id: [u8; KEY_ID_LENGTH],
    nonce: [u8; NONCE_LENGTH],
    body: u128,
    multiplier: u128,
    divisor: u128,
}

impl PadPayload {
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PAD_PAYLOAD_LENGTH);
        out.extend_from_slice(&self.key_id);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.body.to_le_bytes());
        out.extend_from_slice(&self.multiplier.to_le_bytes());
        out.extend_from_slice(&self.divisor.to_le_bytes());
        out
    }

    fn decode(payload: &[u8]) -> Result<Self, CryptoError> {
        if payload.len() != PAD_PAYLOAD_LENGTH {
            return Err(CryptoError::MalformedCiphertext(format!(
                "expected {} payload bytes, got {}",
                PAD_PAYLOAD_LENGTH,
                payload.len()
            )));
        }
        let (key_id, rest) = payload.split_at(KEY_ID_LENGTH);
        let (nonce, rest) = rest.split_at(NONCE_LENGTH);
        let (body, rest) = rest.split_at(16);
        let (multiplier, divisor) = rest.split_at(16);

        let parsed = Self {
            key_id: key_id.try_into().map_err(|_| malformed_layout())?,
            nonce: nonce.try_into().map_err(|_| malformed_layout())?,
            body: u128::from_le_bytes(body.try_into().map_err(|_| malformed_layout())?),
            multiplier: u128::from_le_bytes(multiplier.try_into().map_err(|_| malformed_layout())?),
            divisor: u128::from_le_bytes(divisor.try_into().map_err(|_| malformed_layout())?),
        };

        if parsed.multiplier == 0 || parsed.multiplier > MAX_MULTIPLIER {
            return Err(CryptoError::MalformedCiphertext(
                "multiplier out of range".to_string(),
            ));
        }
        if parsed.divisor == 0 || parsed.divisor > MAX_DIVISOR {
            return Err(CryptoError::MalformedCiphertext(
                "divisor out of range".to_string(),
            ));
        }
        Ok(parsed)
    }
}

fn malformed_layout() -> CryptoError {
    CryptoError::MalformedCiphertext("payload layout".to_string())
}

fn generate_nonce() -> Result<[u8; NONCE_LENGTH], CryptoError> {
    let mut nonce = [0u8; NONCE_LENGTH];
    getrandom::getrandom(&mut nonce).map_err(|e| CryptoError::RngFailed(e.to_string()))?;
    Ok(nonce)
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

impl PadScheme {
    fn open(&self, ciphertext: &Ciphertext) -> Result<PadPayload, CryptoError> {
        if ciphertext.version() != PAD_SCHEME_VERSION {
            return Err(CryptoError::MalformedCiphertext(format!(
                "unsupported version {}",
                ciphertext.version()
            )));
        }
        PadPayload::decode(ciphertext.payload())
    }
}

impl HomomorphicScheme for PadScheme {
    fn version(&self) -> u8 {
        PAD_SCHEME_VERSION
    }

    fn encrypt(&self, value: Decimal, key: &KeyHandle) -> Result<Ciphertext, CryptoError> {
        let mantissa = to_fixed(value)?;
        let nonce = generate_nonce()?;
        let pad = derive_pad(key.secret(), &nonce)?;

        let payload = PadPayload {
            key_id: *key.id(),
            nonce,
            // two's complement keeps negative mantissas exact mod 2^128
            body: (mantissa as u128).wrapping_add(pad),
            multiplier: 1,
            divisor: 1,
        };
        Ok(Ciphertext::new(
            PAD_SCHEME_VERSION,
            now_secs(),
            payload.encode(),
        ))
    }

    fn decrypt(&self, ciphertext: &Ciphertext, key: &KeyHandle) -> Result<Decimal, CryptoError> {
        let payload = self.open(ciphertext)?;
        if &payload.key_id != key.id() {
            return Err(CryptoError::KeyMismatch {
                expected: hex::encode(payload.key_id),
                got: key.id_hex(),
            });
        }

        let pad = derive_pad(key.secret(), &payload.nonce)?;
        let scaled = payload
            .body
            .wrapping_sub(pad.wrapping_mul(payload.multiplier)) as i128;
        from_fixed(div_round(scaled, payload.divisor)?)
    }

    fn scale(&self, ciphertext: &Ciphertext, ratio: Ratio) -> Result<Ciphertext, CryptoError> {
        let payload = self.open(ciphertext)?;

        let multiplier = payload
            .multiplier
            .checked_mul(ratio.numerator())
            .filter(|m| *m <= MAX_MULTIPLIER)
            .ok_or_else(|| CryptoError::Range("cumulative rate multiplier too large".to_string()))?;
        let divisor = payload
            .divisor
            .checked_mul(ratio.denominator())
            .filter(|d| *d <= MAX_DIVISOR)
            .ok_or_else(|| CryptoError::Range("cumulative rate divisor too large".to_string()))?;

        let scaled = PadPayload {
            key_id: payload.key_id,
            nonce: payload.nonce,
            body: payload.body.wrapping_mul(ratio.numerator()),
            multiplier,
            divisor,
        };
        Ok(Ciphertext::new(
            PAD_SCHEME_VERSION,
            now_secs(),
            scaled.encode(),
        ))
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Version-dispatching codec.
///
/// New ciphertexts are issued by the first (current) scheme; decryption and
/// scaling dispatch on the ciphertext's version tag, so older versions stay
/// readable once a newer scheme is registered in front of them.
#[derive(Clone)]
pub struct Codec {
    schemes: Vec<Arc<dyn HomomorphicScheme>>,
}

impl Codec {
    /// Codec issuing with `current`; add readers with [`Codec::with_reader`].
    pub fn new(current: Arc<dyn HomomorphicScheme>) -> Self {
        Self {
            schemes: vec![current],
        }
    }

    /// Register an additional scheme accepted for decryption and scaling.
    pub fn with_reader(mut self, scheme: Arc<dyn HomomorphicScheme>) -> Self {
        self.schemes.push(scheme);
        self
    }

    /// Version tag of newly issued ciphertexts.
    pub fn current_version(&self) -> u8 {
        self.schemes[0].version()
    }

    fn scheme_for(&self, version: u8) -> Result<&dyn HomomorphicScheme, CryptoError> {
        self.schemes
            .iter()
            .find(|s| s.version() == version)
            .map(|s| s.as_ref())
            .ok_or_else(|| {
                CryptoError::MalformedCiphertext(format!("unrecognized version {}", version))
            })
    }

    pub fn encrypt(&self, value: Decimal, key: &KeyHandle) -> Result<Ciphertext, CryptoError> {
        self.schemes[0].encrypt(value, key)
    }

    pub fn decrypt(&self, ciphertext: &Ciphertext, key: &KeyHandle) -> Result<Decimal, CryptoError> {
        self.scheme_for(ciphertext.version())?
            .decrypt(ciphertext, key)
    }

    pub fn scale(&self, ciphertext: &Ciphertext, ratio: Ratio) -> Result<Ciphertext, CryptoError> {
        self.scheme_for(ciphertext.version())?
            .scale(ciphertext, ratio)
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(Arc::new(PadScheme))
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let versions: Vec<u8> = self.schemes.iter().map(|s| s.version()).collect();
        f.debug_struct("Codec").field("versions", &versions).finish()
    }
}
