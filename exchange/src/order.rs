//! Order and price-level records for the matching book.
//!
//! Both record types are intrusive nodes: an order carries the links of the
//! FIFO queue at its price level, a level carries the links of the per-side
//! price-level list. Links are pool handles, not pointers; a single-element
//! circular list links to itself.

use common::mem_pool::Handle;
use common::types::{
    order_id_str, price_str, priority_str, qty_str, ClientId, OrderId, Price, Priority, Qty, Side,
    TickerId, INVALID_CLIENT_ID, INVALID_ORDER_ID, INVALID_PRICE, INVALID_PRIORITY, INVALID_QTY,
    INVALID_TICKER_ID,
};

/// A resting limit order.
///
/// `prev_order`/`next_order` run through the circular FIFO of peers at the
/// same price level, head earliest. `qty` is the remaining quantity and is
/// strictly positive while the order rests.
#[derive(Debug, Clone)]
pub struct Order {
    pub ticker_id: TickerId,
    pub client_id: ClientId,
    pub client_order_id: OrderId,
    pub market_order_id: OrderId,
    pub side: Side,
    pub price: Price,
    pub qty: Qty,
    pub priority: Priority,
    pub prev_order: Handle,
    pub next_order: Handle,
}

impl Default for Order {
    fn default() -> Self {
        Self {
            ticker_id: INVALID_TICKER_ID,
            client_id: INVALID_CLIENT_ID,
            client_order_id: INVALID_ORDER_ID,
            market_order_id: INVALID_ORDER_ID,
            side: Side::Invalid,
            price: INVALID_PRICE,
            qty: INVALID_QTY,
            priority: INVALID_PRIORITY,
            prev_order: Handle::INVALID,
            next_order: Handle::INVALID,
        }
    }
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Order[oid:{} coid:{} client:{} side:{} price:{} qty:{} prio:{} prev:{} next:{}]",
            order_id_str(self.market_order_id),
            order_id_str(self.client_order_id),
            self.client_id,
            self.side,
            price_str(self.price),
            qty_str(self.qty),
            priority_str(self.priority),
            self.prev_order,
            self.next_order,
        )
    }
}

/// A price level: the set of orders resting at one exact price on one side.
///
/// `first_order` heads the circular FIFO. `prev_level`/`next_level` run
/// through all active levels of the same side, ordered by aggressiveness
/// (descending price for bids, ascending for asks), also circular.
#[derive(Debug, Clone)]
pub struct PriceLevel {
    pub side: Side,
    pub price: Price,
    pub first_order: Handle,
    pub prev_level: Handle,
    pub next_level: Handle,
}

impl Default for PriceLevel {
    fn default() -> Self {
        Self {
            side: Side::Invalid,
            price: INVALID_PRICE,
            first_order: Handle::INVALID,
            prev_level: Handle::INVALID,
            next_level: Handle::INVALID,
        }
    }
}

impl std::fmt::Display for PriceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PriceLevel[side:{} price:{} first:{} prev:{} next:{}]",
            self.side,
            price_str(self.price),
            self.first_order,
            self.prev_level,
            self.next_level,
        )
    }
}

/// True when `a` is a more aggressive price than `b` on `side`: a higher bid
/// or a lower ask.
#[inline]
pub fn more_aggressive(side: Side, a: Price, b: Price) -> bool {
    match side {
        Side::Buy => a > b,
        Side::Sell => a < b,
        Side::Invalid => false,
    }
}

/// True when an incoming order at `limit` crosses a resting opposite-side
/// level at `opposite`: a buy reaching down to the ask, or a sell reaching up
/// to the bid.
#[inline]
pub fn crosses(side: Side, limit: Price, opposite: Price) -> bool {
    match side {
        Side::Buy => opposite <= limit,
        Side::Sell => opposite >= limit,
        Side::Invalid => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order_is_all_sentinels() {
        let order = Order::default();
        assert_eq!(order.ticker_id, INVALID_TICKER_ID);
        assert_eq!(order.market_order_id, INVALID_ORDER_ID);
        assert_eq!(order.side, Side::Invalid);
        assert_eq!(order.price, INVALID_PRICE);
        assert_eq!(order.qty, INVALID_QTY);
        assert!(!order.prev_order.is_valid());
        assert!(!order.next_order.is_valid());
    }

    #[test]
    fn test_default_level_is_all_sentinels() {
        let level = PriceLevel::default();
        assert_eq!(level.side, Side::Invalid);
        assert_eq!(level.price, INVALID_PRICE);
        assert!(!level.first_order.is_valid());
    }

    #[test]
    fn test_aggressiveness() {
        assert!(more_aggressive(Side::Buy, 101, 100));
        assert!(!more_aggressive(Side::Buy, 100, 101));
        assert!(more_aggressive(Side::Sell, 99, 100));
        assert!(!more_aggressive(Side::Sell, 100, 99));
        // Equal prices are never more aggressive on either side
        assert!(!more_aggressive(Side::Buy, 100, 100));
        assert!(!more_aggressive(Side::Sell, 100, 100));
    }

    #[test]
    fn test_crossing() {
        assert!(crosses(Side::Buy, 100, 100));
        assert!(crosses(Side::Buy, 100, 99));
        assert!(!crosses(Side::Buy, 100, 101));
        assert!(crosses(Side::Sell, 100, 100));
        assert!(crosses(Side::Sell, 100, 101));
        assert!(!crosses(Side::Sell, 100, 99));
    }

    #[test]
    fn test_negative_prices_order_correctly() {
        assert!(more_aggressive(Side::Buy, -1, -5));
        assert!(more_aggressive(Side::Sell, -5, -1));
        assert!(crosses(Side::Buy, -1, -3));
        assert!(!crosses(Side::Sell, -1, -3));
    }

    #[test]
    fn test_render() {
        let order = Order::default();
        let rendered = format!("{}", order);
        assert!(rendered.contains("oid:INVALID"));
        assert!(rendered.contains("side:INVALID"));
    }
}
