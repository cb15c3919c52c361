use std::collections::HashMap;

use crate::error::RejectReason;

/// Default USD → EUR multiplier.
pub const DEFAULT_USD_RATE: f64 = 0.85;

/// Multipliers that convert an amount in a given currency to EUR.
#[derive(Debug, Clone)]
pub struct CurrencyTable {
    rates: HashMap<String, f64>,
}

impl Default for CurrencyTable {
    fn default() -> Self {
        Self::new(None)
    }
}

impl CurrencyTable {
    /// Build the default table (EUR and USD), with optional per-currency
    /// overrides layered on top.
    pub fn new(overrides: Option<HashMap<String, f64>>) -> Self {
        let mut rates = HashMap::new();
        rates.insert("EUR".to_string(), 1.0);
        rates.insert("USD".to_string(), DEFAULT_USD_RATE);
        if let Some(overrides) = overrides {
            for (code, rate) in overrides {
                rates.insert(code.to_uppercase(), rate);
            }
        }
        Self { rates }
    }

    /// Table with a custom USD rate.
    pub fn with_usd_rate(rate: f64) -> Self {
        Self::new(Some(HashMap::from([("USD".to_string(), rate)])))
    }

    /// Multiplier for `code`; an unknown currency rejects the record.
    pub fn rate(&self, code: &str) -> Result<f64, RejectReason> {
        self.rates
            .get(&code.to_uppercase())
            .copied()
            .ok_or_else(|| RejectReason::UnknownCurrency(code.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rates() {
        let table = CurrencyTable::default();
        assert_eq!(table.rate("EUR").unwrap(), 1.0);
        assert_eq!(table.rate("USD").unwrap(), 0.85);
        assert_eq!(table.rate("usd").unwrap(), 0.85);
    }

    #[test]
    fn test_unknown_currency_rejects() {
        let table = CurrencyTable::default();
        assert_eq!(
            table.rate("GBP").unwrap_err(),
            RejectReason::UnknownCurrency("GBP".to_string())
        );
    }

    #[test]
    fn test_overrides() {
        let table = CurrencyTable::with_usd_rate(0.9);
        assert_eq!(table.rate("USD").unwrap(), 0.9);
        let table = CurrencyTable::new(Some(HashMap::from([("gbp".to_string(), 1.15)])));
        assert_eq!(table.rate("GBP").unwrap(), 1.15);
        assert_eq!(table.rate("EUR").unwrap(), 1.0);
    }
}
