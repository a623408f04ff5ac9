//! Market listing model.

use serde::{Deserialize, Serialize};

use super::Symbol;

/// Quote currency prefix of the markets the dashboard trades.
pub const KRW_PREFIX: &str = "KRW-";

/// One entry of `GET /v1/market/all`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketInfo {
    pub market: Symbol,
    pub korean_name: String,
    pub english_name: String,
}

impl MarketInfo {
    pub fn is_krw(&self) -> bool {
        self.market.starts_with(KRW_PREFIX)
    }
}

/// Returns `true` if `code` looks like `KRW-` followed by uppercase
/// letters or digits.
pub fn is_krw_market_code(code: &str) -> bool {
    code.strip_prefix(KRW_PREFIX).is_some_and(|base| {
        !base.is_empty()
            && base
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_krw_codes() {
        assert!(is_krw_market_code("KRW-BTC"));
        assert!(is_krw_market_code("KRW-1INCH"));
        assert!(!is_krw_market_code("KRW-"));
        assert!(!is_krw_market_code("KRW-btc"));
        assert!(!is_krw_market_code("BTC-ETH"));
    }
}
