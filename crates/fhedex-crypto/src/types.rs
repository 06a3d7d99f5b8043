/// Version tag of the additive pad scheme.
///
/// Payload: [key_id:16B][nonce:16B][body:16B][multiplier:16B][divisor:16B]
/// All integers little-endian.
pub const PAD_SCHEME_VERSION: u8 = 1;

/// Prefix of the persisted string form: `fhe:<version>:<base64url>`.
pub const CIPHERTEXT_PREFIX: &str = "fhe";

/// Fractional decimal digits carried by every plaintext.
pub const FRACTIONAL_DIGITS: u32 = 9;

/// Largest fixed-point magnitude accepted by `encrypt`.
pub const MAX_MANTISSA: i128 = i64::MAX as i128;

/// Largest cumulative plaintext multiplier a ciphertext may carry.
///
/// `MAX_MANTISSA * MAX_MULTIPLIER < 2^127`, so the decrypted product never wraps.
pub const MAX_MULTIPLIER: u128 = 1 << 63;

/// Largest cumulative divisor a ciphertext may carry.
pub const MAX_DIVISOR: u128 = i128::MAX as u128;

/// Encryption key length in bytes (256 bits).
pub const KEY_LENGTH: usize = 32;

/// Public key fingerprint length in bytes.
pub const KEY_ID_LENGTH: usize = 16;

/// Per-ciphertext nonce length in bytes.
pub const NONCE_LENGTH: usize = 16;

/// Pad scheme payload length in bytes.
pub const PAD_PAYLOAD_LENGTH: usize = KEY_ID_LENGTH + NONCE_LENGTH + 16 * 3;
