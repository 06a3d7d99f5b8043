//! Ciphertext codec and homomorphic rate engine for encrypted swaps.

pub mod codec;
pub mod error;
pub mod fixed_point;
pub mod hkdf;
pub mod homomorphic;
pub mod keys;
pub mod signing;
pub mod types;

pub use codec::{Ciphertext, Codec, HomomorphicScheme, PadScheme};
pub use error::CryptoError;
pub use fixed_point::Ratio;
pub use homomorphic::{RateEngine, RateProvider, UnknownSymbolPolicy};
pub use keys::KeyHandle;
pub use signing::{
    export_public_key_jwk, generate_p256_keypair, import_public_key_jwk, sign, verify,
};
pub use types::{FRACTIONAL_DIGITS, PAD_SCHEME_VERSION};

pub use p256::ecdsa::{SigningKey, VerifyingKey};
pub use rust_decimal::Decimal;
