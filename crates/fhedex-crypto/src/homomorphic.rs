//! Rate computation over ciphertext.
//!
//! `output = input * rate(in) / rate(out)` is applied as a public rational
//! scale on the encrypted input. The engine never holds a key.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::codec::{Ciphertext, Codec};
use crate::error::CryptoError;
use crate::fixed_point::{from_fixed, to_fixed, Ratio};

/// Source of per-asset quotes (price in a common unit).
///
/// Quotes may be stale; freshness is the provider's concern.
pub trait RateProvider: Send + Sync {
    /// Quote for `symbol`, or `None` when the provider has no price for it.
    fn quote(&self, symbol: &str) -> Option<Decimal>;
}

/// What to do when an asset has no quote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownSymbolPolicy {
    /// Fail with `CryptoError::UnknownPair`.
    #[default]
    Strict,
    /// Use an implied rate of 1.
    TreatAsOne,
}

/// Applies asset conversion rates to encrypted amounts.
#[derive(Debug, Clone, Default)]
pub struct RateEngine {
    codec: Codec,
    policy: UnknownSymbolPolicy,
}

impl RateEngine {
    pub fn new(codec: Codec, policy: UnknownSymbolPolicy) -> Self {
        Self { codec, policy }
    }

    pub fn policy(&self) -> UnknownSymbolPolicy {
        self.policy
    }

    fn rate_for(&self, symbol: &str, rates: &dyn RateProvider) -> Result<Decimal, CryptoError> {
        match rates.quote(symbol) {
            Some(rate) if rate > Decimal::ZERO => Ok(rate),
            Some(_) => Err(CryptoError::InvalidRate {
                symbol: symbol.to_string(),
            }),
            None => match self.policy {
                UnknownSymbolPolicy::Strict => Err(CryptoError::UnknownPair {
                    symbol: symbol.to_string(),
                }),
                UnknownSymbolPolicy::TreatAsOne => Ok(Decimal::ONE),
            },
        }
    }

    /// Resolve the reduced conversion ratio between two assets.
    pub fn resolve_ratio(
        &self,
        input_token: &str,
        output_token: &str,
        rates: &dyn RateProvider,
    ) -> Result<Ratio, CryptoError> {
        let input_rate = self.rate_for(input_token, rates)?;
        let output_rate = self.rate_for(output_token, rates)?;
        Ratio::of_rates(input_rate, output_rate)
    }

    /// Convert an encrypted amount of `input_token` into `output_token`.
    ///
    /// The result decrypts under the same key as `ct_in`.
    pub fn compute_rate(
        &self,
        ct_in: &Ciphertext,
        input_token: &str,
        output_token: &str,
        rates: &dyn RateProvider,
    ) -> Result<Ciphertext, CryptoError> {
        let ratio = self.resolve_ratio(input_token, output_token, rates)?;
        self.codec.scale(ct_in, ratio)
    }

    /// Plaintext counterpart of [`RateEngine::compute_rate`].
    ///
    /// Uses the same rational arithmetic and rounding, so the preview always
    /// equals the decrypted output of the encrypted computation.
    pub fn preview(
        &self,
        amount: Decimal,
        input_token: &str,
        output_token: &str,
        rates: &dyn RateProvider,
    ) -> Result<Decimal, CryptoError> {
        let ratio = self.resolve_ratio(input_token, output_token, rates)?;
        from_fixed(ratio.apply(to_fixed(amount)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyHandle;
    use std::collections::HashMap;

    struct Table(HashMap<&'static str, Decimal>);

    impl RateProvider for Table {
        fn quote(&self, symbol: &str) -> Option<Decimal> {
            self.0.get(symbol).copied()
        }
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn table() -> Table {
        Table(HashMap::from([
            ("ETH", dec("3500")),
            ("BTC", dec("65000")),
            ("ZAMA", dec("2.5")),
            ("USDC", dec("1")),
            ("DUST", dec("0")),
        ]))
    }

    #[test]
    fn eth_to_usdc() {
        let engine = RateEngine::default();
        let key = KeyHandle::generate().unwrap();
        let codec = Codec::default();

        let ct_in = codec.encrypt(dec("2"), &key).unwrap();
        let ct_out = engine.compute_rate(&ct_in, "ETH", "USDC", &table()).unwrap();
        assert_eq!(codec.decrypt(&ct_out, &key).unwrap(), dec("7000"));
    }

    #[test]
    fn matches_plaintext_formula() {
        let engine = RateEngine::default();
        let key = KeyHandle::generate().unwrap();
        let codec = Codec::default();
        let rates = table();

        for (amount, from, to) in [
            ("1", "BTC", "ETH"),
            ("0.75", "ZAMA", "USDC"),
            ("1234.5", "USDC", "BTC"),
            ("3", "ETH", "ZAMA"),
        ] {
            let v = dec(amount);
            let expected = (v * rates.quote(from).unwrap() / rates.quote(to).unwrap()).round_dp(9);
            let ct_out = engine
                .compute_rate(&codec.encrypt(v, &key).unwrap(), from, to, &rates)
                .unwrap();
            assert_eq!(codec.decrypt(&ct_out, &key).unwrap(), expected, "{} {}->{}", amount, from, to);
            assert_eq!(engine.preview(v, from, to, &rates).unwrap(), expected);
        }
    }

    #[test]
    fn repeating_decimal_quote_is_usable() {
        let engine = RateEngine::default();
        let key = KeyHandle::generate().unwrap();
        let codec = Codec::default();
        // 0.6666666666666666666666666667, rounded to 0.666666667
        let rates = Table(HashMap::from([
            ("ETH", dec("3500")),
            ("ZAMA", dec("2") / dec("3")),
        ]));

        let ct_out = engine
            .compute_rate(&codec.encrypt(dec("2"), &key).unwrap(), "ETH", "ZAMA", &rates)
            .unwrap();
        let decrypted = codec.decrypt(&ct_out, &key).unwrap();
        assert_eq!(decrypted, dec("10499.99999475"));
        assert_eq!(engine.preview(dec("2"), "ETH", "ZAMA", &rates).unwrap(), decrypted);
    }

    #[test]
    fn output_stays_bound_to_input_key() {
        let engine = RateEngine::default();
        let codec = Codec::default();
        let key = KeyHandle::generate().unwrap();
        let ct_out = engine
            .compute_rate(&codec.encrypt(dec("1"), &key).unwrap(), "ETH", "USDC", &table())
            .unwrap();
        let other = KeyHandle::generate().unwrap();
        assert!(matches!(
            codec.decrypt(&ct_out, &other),
            Err(CryptoError::KeyMismatch { .. })
        ));
    }

    #[test]
    fn strict_policy_rejects_unknown_symbol() {
        let engine = RateEngine::default();
        let codec = Codec::default();
        let key = KeyHandle::generate().unwrap();
        let ct = codec.encrypt(dec("1"), &key).unwrap();
        match engine.compute_rate(&ct, "ETH", "DOGE", &table()) {
            Err(CryptoError::UnknownPair { symbol }) => assert_eq!(symbol, "DOGE"),
            other => panic!("expected UnknownPair, got {:?}", other),
        }
    }

    #[test]
    fn treat_as_one_policy_uses_unit_rate() {
        let engine = RateEngine::new(Codec::default(), UnknownSymbolPolicy::TreatAsOne);
        let codec = Codec::default();
        let key = KeyHandle::generate().unwrap();
        let ct = codec.encrypt(dec("2"), &key).unwrap();
        let out = engine.compute_rate(&ct, "ETH", "DOGE", &table()).unwrap();
        assert_eq!(codec.decrypt(&out, &key).unwrap(), dec("7000"));
    }

    #[test]
    fn non_positive_quote_is_invalid() {
        let engine = RateEngine::new(Codec::default(), UnknownSymbolPolicy::TreatAsOne);
        assert!(matches!(
            engine.preview(dec("1"), "DUST", "USDC", &table()),
            Err(CryptoError::InvalidRate { .. })
        ));
    }

    #[test]
    fn policy_serializes_snake_case() {
        let json = serde_json::to_string(&UnknownSymbolPolicy::TreatAsOne).unwrap();
        assert_eq!(json, "\"treat_as_one\"");
    }
}
