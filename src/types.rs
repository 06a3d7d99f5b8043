//! Swap data model: requests, records, stages and progress events.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use fhedex_auth::PrincipalId;
use fhedex_crypto::{Ciphertext, Decimal, FRACTIONAL_DIGITS};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StoreError, SwapError};

/// Default slippage tolerance (0.5%).
pub const DEFAULT_SLIPPAGE_BPS: u32 = 50;

/// 100% in basis points.
pub const MAX_SLIPPAGE_BPS: u32 = 10_000;

// ============================================================================
// AssetSymbol
// ============================================================================

const SYMBOL_PATTERN: &str = r"^[A-Z0-9]{2,10}$";

fn symbol_regex() -> Result<&'static Regex, SwapError> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(SYMBOL_PATTERN))
        .as_ref()
        .map_err(|e| SwapError::Config(format!("asset symbol pattern: {}", e)))
}

/// Ticker of a tradable asset, normalized to upper case (`"eth"` → `"ETH"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetSymbol(String);

impl AssetSymbol {
    pub fn new(symbol: &str) -> Result<Self, SwapError> {
        let normalized = symbol.trim().to_ascii_uppercase();
        if !symbol_regex()?.is_match(&normalized) {
            return Err(SwapError::InvalidRequest(format!(
                "invalid asset symbol {:?}",
                symbol
            )));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AssetSymbol {
    type Err = SwapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for AssetSymbol {
    type Error = SwapError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<AssetSymbol> for String {
    fn from(symbol: AssetSymbol) -> Self {
        symbol.0
    }
}

// ============================================================================
// SwapRequest
// ============================================================================

/// A plaintext trade request. Transient; never persisted as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapRequest {
    pub input_token: AssetSymbol,
    pub output_token: AssetSymbol,
    pub input_amount: Decimal,
    pub slippage_bps: u32,
    /// Principal allowed to decrypt the resulting record, if restricted.
    pub owner: Option<PrincipalId>,
}

impl SwapRequest {
    pub fn new(input_token: AssetSymbol, output_token: AssetSymbol, input_amount: Decimal) -> Self {
        Self {
            input_token,
            output_token,
            input_amount,
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            owner: None,
        }
    }

    /// Parse both symbols and build a request.
    pub fn parse(input_token: &str, output_token: &str, input_amount: Decimal) -> Result<Self, SwapError> {
        Ok(Self::new(
            AssetSymbol::new(input_token)?,
            AssetSymbol::new(output_token)?,
            input_amount,
        ))
    }

    pub fn with_slippage_bps(mut self, slippage_bps: u32) -> Self {
        self.slippage_bps = slippage_bps;
        self
    }

    pub fn with_owner(mut self, owner: PrincipalId) -> Self {
        self.owner = Some(owner);
        self
    }
}

/// Minimum acceptable output after slippage, at codec precision.
pub fn min_output_amount(output_amount: Decimal, slippage_bps: u32) -> Decimal {
    let kept = MAX_SLIPPAGE_BPS.saturating_sub(slippage_bps);
    (output_amount * Decimal::from(kept) / Decimal::from(MAX_SLIPPAGE_BPS))
        .round_dp(FRACTIONAL_DIGITS)
        .normalize()
}

// ============================================================================
// SwapStatus / SwapStage
// ============================================================================

/// Persisted status of a swap record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapStatus {
    Pending,
    Completed,
    Failed,
}

impl SwapStatus {
    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SwapStatus::Completed | SwapStatus::Failed)
    }
}

/// Pipeline stage of a swap in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapStage {
    Draft,
    Encrypting,
    Computing,
    Persisting,
    Completed,
    Failed,
}

impl SwapStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SwapStage::Completed | SwapStage::Failed)
    }
}

impl fmt::Display for SwapStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SwapStage::Draft => "draft",
            SwapStage::Encrypting => "encrypting",
            SwapStage::Computing => "computing",
            SwapStage::Persisting => "persisting",
            SwapStage::Completed => "completed",
            SwapStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// SwapRecord
// ============================================================================

/// Which ciphertext of a record to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiphertextField {
    Input,
    Output,
}

/// Durable record of one swap.
///
/// `output_amount` and `min_output_amount` are plaintext display values; the
/// ciphertexts are the authoritative encrypted amounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRecord {
    pub id: String,
    pub input_token: AssetSymbol,
    pub output_token: AssetSymbol,
    pub input_amount: Decimal,
    pub output_amount: Decimal,
    pub min_output_amount: Decimal,
    pub slippage_bps: u32,
    pub encrypted_input: Ciphertext,
    pub encrypted_output: Ciphertext,
    /// Unix seconds.
    pub created_at: i64,
    pub status: SwapStatus,
    pub tx_ref: Option<String>,
    pub owner: Option<PrincipalId>,
}

impl SwapRecord {
    pub fn ciphertext(&self, field: CiphertextField) -> &Ciphertext {
        match field {
            CiphertextField::Input => &self.encrypted_input,
            CiphertextField::Output => &self.encrypted_output,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Self-describing JSON document holding every field.
    pub fn to_document(&self) -> Result<Value, StoreError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_document(doc: &Value) -> Result<Self, StoreError> {
        Ok(Self::deserialize(doc)?)
    }
}

// ============================================================================
// Progress / Quote / Ack
// ============================================================================

/// Stage transition reported to the progress callback.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapProgress {
    pub swap_id: String,
    pub stage: SwapStage,
    /// Failure reason, set only for `SwapStage::Failed`.
    pub error: Option<String>,
}

/// Plaintext preview of a swap's outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapQuote {
    pub input_token: AssetSymbol,
    pub output_token: AssetSymbol,
    pub input_amount: Decimal,
    pub output_amount: Decimal,
    pub min_output_amount: Decimal,
    /// Output units per one input unit.
    pub rate: Decimal,
}

/// Store acknowledgement of a persisted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub tx_ref: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhedex_crypto::{Codec, KeyHandle};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn symbols_normalize_to_upper_case() {
        assert_eq!(AssetSymbol::new(" eth ").unwrap().as_str(), "ETH");
        assert_eq!("usdc".parse::<AssetSymbol>().unwrap().as_str(), "USDC");
    }

    #[test]
    fn malformed_symbols_are_invalid_requests() {
        for bad in ["", "E", "TOOLONGSYMBOL", "ET-H", "ÉTH"] {
            assert!(
                matches!(AssetSymbol::new(bad), Err(SwapError::InvalidRequest(_))),
                "{:?}",
                bad
            );
        }
    }

    #[test]
    fn symbol_deserialization_validates() {
        let ok: AssetSymbol = serde_json::from_str("\"btc\"").unwrap();
        assert_eq!(ok.as_str(), "BTC");
        assert!(serde_json::from_str::<AssetSymbol>("\"b\"").is_err());
    }

    #[test]
    fn request_defaults() {
        let request = SwapRequest::parse("eth", "usdc", dec("2")).unwrap();
        assert_eq!(request.slippage_bps, DEFAULT_SLIPPAGE_BPS);
        assert!(request.owner.is_none());
        let request = request.with_slippage_bps(100).with_owner(PrincipalId::new("alice"));
        assert_eq!(request.slippage_bps, 100);
        assert_eq!(request.owner, Some(PrincipalId::new("alice")));
    }

    #[test]
    fn min_output_applies_slippage() {
        assert_eq!(min_output_amount(dec("7000"), 50), dec("6965"));
        assert_eq!(min_output_amount(dec("7000"), 0), dec("7000"));
        assert_eq!(min_output_amount(dec("7000"), 10_000), Decimal::ZERO);
    }

    #[test]
    fn status_terminality() {
        assert!(!SwapStatus::Pending.is_terminal());
        assert!(SwapStatus::Completed.is_terminal());
        assert!(SwapStatus::Failed.is_terminal());
        assert!(SwapStage::Failed.is_terminal());
        assert!(!SwapStage::Persisting.is_terminal());
    }

    #[test]
    fn record_document_carries_every_field() {
        let codec = Codec::default();
        let key = KeyHandle::generate().unwrap();
        let record = SwapRecord {
            id: "swap_1_abcdefghi".to_string(),
            input_token: AssetSymbol::new("ETH").unwrap(),
            output_token: AssetSymbol::new("USDC").unwrap(),
            input_amount: dec("2"),
            output_amount: dec("7000"),
            min_output_amount: dec("6965"),
            slippage_bps: 50,
            encrypted_input: codec.encrypt(dec("2"), &key).unwrap(),
            encrypted_output: codec.encrypt(dec("7000"), &key).unwrap(),
            created_at: 1_700_000_000,
            status: SwapStatus::Pending,
            tx_ref: None,
            owner: Some(PrincipalId::new("alice")),
        };

        let doc = record.to_document().unwrap();
        assert_eq!(doc["inputToken"], "ETH");
        assert_eq!(doc["status"], "pending");
        assert!(doc["encryptedOutput"].as_str().unwrap().starts_with("fhe:1:"));
        assert!(doc["txRef"].is_null());

        let back = SwapRecord::from_document(&doc).unwrap();
        assert_eq!(back, record);
        assert_eq!(codec.decrypt(back.ciphertext(CiphertextField::Output), &key).unwrap(), dec("7000"));
    }
}
