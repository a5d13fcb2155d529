// Core type definitions for the trading system
//
// Every primitive carries a reserved sentinel equal to its maximum
// representable value, meaning invalid/absent. Sentinels cross the wire
// unchanged; consumers must treat them as absent.

/// Exchange- or client-assigned order identifier.
pub type OrderId = u64;
/// Index into the per-instrument book array.
pub type TickerId = u32;
/// Index into the per-client order map.
pub type ClientId = u32;
/// Fixed-point price. Signed: negative prices are legal and order correctly.
pub type Price = i64;
/// Remaining quantity; zero means fully consumed.
pub type Qty = u32;
/// FIFO position at a price level; lower = earlier.
pub type Priority = u64;
/// Per-ticker market-data sequence number.
pub type SeqNum = u64;

pub const INVALID_ORDER_ID: OrderId = OrderId::MAX;
pub const INVALID_TICKER_ID: TickerId = TickerId::MAX;
pub const INVALID_CLIENT_ID: ClientId = ClientId::MAX;
pub const INVALID_PRICE: Price = Price::MAX;
pub const INVALID_QTY: Qty = Qty::MAX;
pub const INVALID_PRIORITY: Priority = Priority::MAX;

// Default capacity constants. Sized for a demonstration exchange; every
// runtime structure is sized through `Limits`, so operators can scale these
// up without touching code.
pub const MAX_TICKERS: usize = 8;
pub const MAX_NUM_CLIENTS: usize = 256;
pub const MAX_ORDER_IDS: usize = 64 * 1024;
pub const MAX_PRICE_LEVELS: usize = 256;
pub const MAX_CLIENT_UPDATES: usize = 256 * 1024;
pub const MAX_MARKET_UPDATES: usize = 256 * 1024;

/// Represents the side of an order.
///
/// Numeric values are chosen so that `sign()` can feed position accounting
/// directly: BUY=+1, SELL=-1.
#[repr(i8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Side {
    #[default]
    Invalid = 0,
    Buy = 1,
    Sell = -1,
}

impl Side {
    /// Returns the opposite side; `Invalid` maps to itself.
    #[inline]
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
            Side::Invalid => Side::Invalid,
        }
    }

    /// Returns the side as a sign value (+1 for Buy, -1 for Sell).
    #[inline]
    pub fn sign(&self) -> i64 {
        *self as i8 as i64
    }

    /// Dense index for side-keyed arrays: SELL=0, INVALID=1, BUY=2.
    #[inline]
    pub fn to_index(&self) -> usize {
        (*self as i8 + 1) as usize
    }

    /// Parses the wire representation; anything but +1/-1 is invalid.
    #[inline]
    pub fn from_i8(value: i8) -> Side {
        match value {
            1 => Side::Buy,
            -1 => Side::Sell,
            _ => Side::Invalid,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        !matches!(self, Side::Invalid)
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
            Side::Invalid => "INVALID",
        })
    }
}

/// Number of slots in a `Side::to_index()`-keyed array.
pub const SIDE_SLOTS: usize = 3;

// Sentinel-aware render helpers for log and dump lines.

pub fn order_id_str(order_id: OrderId) -> String {
    if order_id == INVALID_ORDER_ID {
        "INVALID".to_string()
    } else {
        order_id.to_string()
    }
}

pub fn price_str(price: Price) -> String {
    if price == INVALID_PRICE {
        "INVALID".to_string()
    } else {
        price.to_string()
    }
}

pub fn qty_str(qty: Qty) -> String {
    if qty == INVALID_QTY {
        "INVALID".to_string()
    } else {
        qty.to_string()
    }
}

pub fn priority_str(priority: Priority) -> String {
    if priority == INVALID_PRIORITY {
        "INVALID".to_string()
    } else {
        priority.to_string()
    }
}

/// Startup sizing for every pool and index in the system.
/// Immutable after construction.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_tickers: usize,
    pub max_clients: usize,
    /// Order-id space per client (client order ids must be < this).
    pub max_order_ids: usize,
    pub max_price_levels: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_tickers: MAX_TICKERS,
            max_clients: MAX_NUM_CLIENTS,
            max_order_ids: MAX_ORDER_IDS,
            max_price_levels: MAX_PRICE_LEVELS,
        }
    }
}

impl Limits {
    /// Small limits for tests that exercise exhaustion boundaries.
    pub fn small(max_orders: usize, max_levels: usize) -> Self {
        Self {
            max_tickers: 2,
            max_clients: 8,
            max_order_ids: max_orders,
            max_price_levels: max_levels,
        }
    }
}

/// Pre-trade risk limits, configured per (ticker, client).
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskCfg {
    /// Maximum quantity per single order.
    pub max_order_size: Qty,
    /// Maximum absolute net position after a worst-case full fill.
    pub max_position: Qty,
    /// Maximum realized loss before new orders are refused.
    pub max_loss: f64,
}

impl RiskCfg {
    /// Limits wide enough to never trigger; the startup default until real
    /// limits are configured.
    pub fn unlimited() -> Self {
        Self {
            max_order_size: Qty::MAX,
            max_position: Qty::MAX,
            max_loss: f64::MAX,
        }
    }
}

impl std::fmt::Display for RiskCfg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RiskCfg{{max-order-size:{} max-position:{} max-loss:{}}}",
            qty_str(self.max_order_size),
            qty_str(self.max_position),
            self.max_loss
        )
    }
}

/// Per-ticker strategy configuration. Opaque to the matching core; passed
/// through to strategies unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct TradeEngineCfg {
    pub clip: Qty,
    pub threshold: f64,
    pub risk: RiskCfg,
}

impl std::fmt::Display for TradeEngineCfg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TradeEngineCfg{{clip:{} thresh:{} risk:{}}}",
            qty_str(self.clip),
            self.threshold,
            self.risk
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
        assert_eq!(Side::Invalid.opposite(), Side::Invalid);
    }

    #[test]
    fn test_side_sign() {
        assert_eq!(Side::Buy.sign(), 1);
        assert_eq!(Side::Sell.sign(), -1);
        assert_eq!(Side::Invalid.sign(), 0);
    }

    #[test]
    fn test_side_index_is_dense() {
        assert_eq!(Side::Sell.to_index(), 0);
        assert_eq!(Side::Invalid.to_index(), 1);
        assert_eq!(Side::Buy.to_index(), 2);
        assert!(Side::Buy.to_index() < SIDE_SLOTS);
    }

    #[test]
    fn test_side_from_wire() {
        assert_eq!(Side::from_i8(1), Side::Buy);
        assert_eq!(Side::from_i8(-1), Side::Sell);
        assert_eq!(Side::from_i8(0), Side::Invalid);
        assert_eq!(Side::from_i8(7), Side::Invalid);
    }

    #[test]
    fn test_sentinels_are_max() {
        assert_eq!(INVALID_ORDER_ID, u64::MAX);
        assert_eq!(INVALID_TICKER_ID, u32::MAX);
        assert_eq!(INVALID_CLIENT_ID, u32::MAX);
        assert_eq!(INVALID_PRICE, i64::MAX);
        assert_eq!(INVALID_QTY, u32::MAX);
        assert_eq!(INVALID_PRIORITY, u64::MAX);
    }

    #[test]
    fn test_sentinel_render() {
        assert_eq!(price_str(INVALID_PRICE), "INVALID");
        assert_eq!(price_str(-250), "-250");
        assert_eq!(qty_str(INVALID_QTY), "INVALID");
        assert_eq!(qty_str(10), "10");
        assert_eq!(order_id_str(INVALID_ORDER_ID), "INVALID");
        assert_eq!(priority_str(3), "3");
    }

    #[test]
    fn test_limits_default() {
        let limits = Limits::default();
        assert_eq!(limits.max_tickers, MAX_TICKERS);
        assert_eq!(limits.max_clients, MAX_NUM_CLIENTS);
        assert_eq!(limits.max_order_ids, MAX_ORDER_IDS);
        assert_eq!(limits.max_price_levels, MAX_PRICE_LEVELS);
    }
}
