//! In-process rate table implementing `RateProvider`.

use std::collections::HashMap;

use fhedex_crypto::{Decimal, RateProvider};
use parking_lot::RwLock;

use crate::types::AssetSymbol;

/// Mutable table of per-asset quotes in a common unit.
#[derive(Debug, Default)]
pub struct RateTable {
    quotes: RwLock<HashMap<AssetSymbol, Decimal>>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reference quotes: ETH=3500, BTC=65000, ZAMA=2.5, USDC=1.
    pub fn reference() -> Self {
        let table = Self::new();
        for (symbol, price) in [
            ("ETH", Decimal::new(3500, 0)),
            ("BTC", Decimal::new(65000, 0)),
            ("ZAMA", Decimal::new(25, 1)),
            ("USDC", Decimal::ONE),
        ] {
            if let Ok(symbol) = AssetSymbol::new(symbol) {
                table.set_quote(symbol, price);
            }
        }
        table
    }

    pub fn with_quote(self, symbol: AssetSymbol, price: Decimal) -> Self {
        self.set_quote(symbol, price);
        self
    }

    pub fn set_quote(&self, symbol: AssetSymbol, price: Decimal) {
        self.quotes.write().insert(symbol, price);
    }

    pub fn remove_quote(&self, symbol: &AssetSymbol) -> Option<Decimal> {
        self.quotes.write().remove(symbol)
    }

    pub fn len(&self) -> usize {
        self.quotes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.read().is_empty()
    }
}

impl RateProvider for RateTable {
    fn quote(&self, symbol: &str) -> Option<Decimal> {
        // Unparseable symbols have no quote.
        let symbol = AssetSymbol::new(symbol).ok()?;
        self.quotes.read().get(&symbol).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_quotes() {
        let table = RateTable::reference();
        assert_eq!(table.len(), 4);
        assert_eq!(table.quote("ETH"), Some(Decimal::new(3500, 0)));
        assert_eq!(table.quote("zama"), Some("2.5".parse().unwrap()));
        assert_eq!(table.quote("DOGE"), None);
        assert_eq!(table.quote("?"), None);
    }

    #[test]
    fn quotes_are_mutable() {
        let table = RateTable::new();
        assert!(table.is_empty());
        let sol = AssetSymbol::new("SOL").unwrap();
        table.set_quote(sol.clone(), Decimal::new(150, 0));
        assert_eq!(table.quote("SOL"), Some(Decimal::new(150, 0)));
        assert_eq!(table.remove_quote(&sol), Some(Decimal::new(150, 0)));
        assert_eq!(table.quote("SOL"), None);
    }
}
