//! Order records read from the authenticated account store.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Symbol;

/// Order side: `bid` buys, `ask` sells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid,
    Ask,
}

/// Lifecycle state of an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderState {
    Wait,
    Watch,
    Done,
    Cancel,
}

/// A single order as listed by the account store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub uuid: String,
    pub side: Side,
    /// `limit`, `price` (market buy) or `market` (market sell).
    pub ord_type: String,
    pub price: Option<Decimal>,
    pub state: OrderState,
    pub market: Symbol,
    pub created_at: String,
    pub volume: Option<Decimal>,
    pub remaining_volume: Option<Decimal>,
    pub executed_volume: Decimal,
    pub trades_count: u32,
    pub paid_fee: Decimal,
    pub locked: Decimal,
}

/// Filter identifying one cached order list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct OrderFilter {
    pub state: Option<OrderState>,
    pub market: Option<Symbol>,
}
