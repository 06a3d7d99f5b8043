//! Swap pipeline configuration.

use std::collections::BTreeSet;

use fhedex_auth::{
    DEFAULT_CAPABILITY_TTL_SECS, DEFAULT_MAX_OUTSTANDING_CHALLENGES, DEFAULT_VALIDITY_WINDOW_SECS,
};
use fhedex_crypto::UnknownSymbolPolicy;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SwapError};
use crate::types::AssetSymbol;

/// Default number of swaps allowed in flight at once.
pub const DEFAULT_MAX_CONCURRENT_SWAPS: usize = 64;

fn default_assets() -> BTreeSet<AssetSymbol> {
    ["ETH", "BTC", "ZAMA", "USDC"]
        .into_iter()
        .filter_map(|s| AssetSymbol::new(s).ok())
        .collect()
}

/// Configuration for `SwapOrchestrator`.
///
/// Every field has a default, so a partial JSON document is valid input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapConfig {
    /// Assets accepted in `Draft` validation.
    pub supported_assets: BTreeSet<AssetSymbol>,
    pub unknown_symbol_policy: UnknownSymbolPolicy,
    pub challenge_validity_secs: i64,
    pub capability_ttl_secs: i64,
    /// Open decryption challenges the default gate tracks at once.
    pub max_outstanding_challenges: usize,
    pub max_concurrent_swaps: usize,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            supported_assets: default_assets(),
            unknown_symbol_policy: UnknownSymbolPolicy::default(),
            challenge_validity_secs: DEFAULT_VALIDITY_WINDOW_SECS,
            capability_ttl_secs: DEFAULT_CAPABILITY_TTL_SECS,
            max_outstanding_challenges: DEFAULT_MAX_OUTSTANDING_CHALLENGES,
            max_concurrent_swaps: DEFAULT_MAX_CONCURRENT_SWAPS,
        }
    }
}

impl SwapConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SwapConfig =
            serde_json::from_str(json).map_err(|e| SwapError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.supported_assets.is_empty() {
            return Err(SwapError::Config("supported_assets is empty".to_string()));
        }
        if self.challenge_validity_secs <= 0 {
            return Err(SwapError::Config(
                "challenge_validity_secs must be positive".to_string(),
            ));
        }
        if self.capability_ttl_secs <= 0 {
            return Err(SwapError::Config(
                "capability_ttl_secs must be positive".to_string(),
            ));
        }
        if self.max_outstanding_challenges == 0 {
            return Err(SwapError::Config(
                "max_outstanding_challenges must be positive".to_string(),
            ));
        }
        if self.max_concurrent_swaps == 0 {
            return Err(SwapError::Config(
                "max_concurrent_swaps must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn supports(&self, symbol: &AssetSymbol) -> bool {
        self.supported_assets.contains(symbol)
    }

    /// Builder-style override of the supported asset set.
    pub fn with_assets<'a>(mut self, symbols: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        self.supported_assets = symbols
            .into_iter()
            .map(AssetSymbol::new)
            .collect::<Result<_>>()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SwapConfig::default();
        assert_eq!(config.supported_assets.len(), 4);
        assert!(config.supports(&AssetSymbol::new("ZAMA").unwrap()));
        assert_eq!(config.unknown_symbol_policy, UnknownSymbolPolicy::Strict);
        assert_eq!(config.challenge_validity_secs, 300);
        assert_eq!(config.capability_ttl_secs, 60);
        assert_eq!(config.max_outstanding_challenges, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = SwapConfig::from_json_str(
            r#"{"unknown_symbol_policy": "treat_as_one", "supported_assets": ["eth", "doge"]}"#,
        )
        .unwrap();
        assert_eq!(config.unknown_symbol_policy, UnknownSymbolPolicy::TreatAsOne);
        assert!(config.supports(&AssetSymbol::new("DOGE").unwrap()));
        assert!(!config.supports(&AssetSymbol::new("BTC").unwrap()));
        assert_eq!(config.capability_ttl_secs, 60);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        assert!(matches!(
            SwapConfig::from_json_str(r#"{"supported_assets": []}"#),
            Err(SwapError::Config(_))
        ));
        assert!(matches!(
            SwapConfig::from_json_str(r#"{"capability_ttl_secs": 0}"#),
            Err(SwapError::Config(_))
        ));
        assert!(matches!(
            SwapConfig::from_json_str(r#"{"max_concurrent_swaps": 0}"#),
            Err(SwapError::Config(_))
        ));
        assert!(matches!(
            SwapConfig::from_json_str(r#"{"max_outstanding_challenges": 0}"#),
            Err(SwapError::Config(_))
        ));
        assert!(matches!(
            SwapConfig::from_json_str(r#"{"supported_assets": ["x"]}"#),
            Err(SwapError::Config(_))
        ));
        assert!(SwapConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn with_assets_validates_symbols() {
        let config = SwapConfig::default().with_assets(["eth", "sol"]).unwrap();
        assert_eq!(config.supported_assets.len(), 2);
        assert!(SwapConfig::default().with_assets(["?"]).is_err());
    }
}
