//! Account balance models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Holding of a single currency from the authenticated account store.
///
/// Quantities arrive as decimal strings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Balance {
    /// Currency code (e.g., "KRW", "BTC").
    pub currency: String,
    /// Quantity available to order.
    pub balance: Decimal,
    /// Quantity locked in open orders.
    pub locked: Decimal,
    /// Average buy price.
    pub avg_buy_price: Decimal,
    #[serde(default)]
    pub avg_buy_price_modified: bool,
    /// Currency the average buy price is quoted in.
    pub unit_currency: String,
}

impl Balance {
    /// Available plus locked quantity.
    pub fn total(&self) -> Decimal {
        self.balance + self.locked
    }

    /// Market code this holding trades on, or `None` for the quote currency itself.
    pub fn market(&self) -> Option<String> {
        (self.currency != self.unit_currency)
            .then(|| format!("{}-{}", self.unit_currency, self.currency))
    }
}
