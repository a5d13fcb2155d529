//! Order book records for the participant side.
//!
//! The mirror book tracks every resting order the public stream describes,
//! so the records carry no client identity, only what the stream publishes:
//! the exchange order id, side, price, remaining qty and FIFO priority.
//! Link discipline is the same as exchange-side: circular FIFO per level,
//! circular aggressiveness-ordered level list per side.

use common::mem_pool::Handle;
use common::types::{
    order_id_str, price_str, priority_str, qty_str, OrderId, Price, Priority, Qty, Side,
    INVALID_ORDER_ID, INVALID_PRICE, INVALID_PRIORITY, INVALID_QTY,
};

/// A resting order reconstructed from the public stream.
#[derive(Debug, Clone)]
pub struct MarketOrder {
    pub order_id: OrderId,
    pub side: Side,
    pub price: Price,
    pub qty: Qty,
    pub priority: Priority,
    pub prev_order: Handle,
    pub next_order: Handle,
}

impl Default for MarketOrder {
    fn default() -> Self {
        Self {
            order_id: INVALID_ORDER_ID,
            side: Side::Invalid,
            price: INVALID_PRICE,
            qty: INVALID_QTY,
            priority: INVALID_PRIORITY,
            prev_order: Handle::INVALID,
            next_order: Handle::INVALID,
        }
    }
}

impl std::fmt::Display for MarketOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MarketOrder[oid:{} side:{} price:{} qty:{} prio:{} prev:{} next:{}]",
            order_id_str(self.order_id),
            self.side,
            price_str(self.price),
            qty_str(self.qty),
            priority_str(self.priority),
            self.prev_order,
            self.next_order,
        )
    }
}

/// A price level of the mirror book.
#[derive(Debug, Clone)]
pub struct MarketLevel {
    pub side: Side,
    pub price: Price,
    pub first_order: Handle,
    pub prev_level: Handle,
    pub next_level: Handle,
}

impl Default for MarketLevel {
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

impl std::fmt::Display for MarketLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MarketLevel[side:{} price:{} first:{} prev:{} next:{}]",
            self.side,
            price_str(self.price),
            self.first_order,
            self.prev_level,
            self.next_level,
        )
    }
}

/// Best bid and offer: the head price of each side with the aggregate qty
/// resting at it. An empty side shows the invalid sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bbo {
    pub bid_price: Price,
    pub bid_qty: Qty,
    pub ask_price: Price,
    pub ask_qty: Qty,
}

impl Default for Bbo {
    fn default() -> Self {
        Self {
            bid_price: INVALID_PRICE,
            bid_qty: INVALID_QTY,
            ask_price: INVALID_PRICE,
            ask_qty: INVALID_QTY,
        }
    }
}

impl Bbo {
    #[inline]
    pub fn has_bid(&self) -> bool {
        self.bid_price != INVALID_PRICE
    }

    #[inline]
    pub fn has_ask(&self) -> bool {
        self.ask_price != INVALID_PRICE
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.has_bid() && self.has_ask()
    }

    /// Ask minus bid when both sides are live.
    #[inline]
    pub fn spread(&self) -> Option<Price> {
        if self.is_valid() {
            Some(self.ask_price - self.bid_price)
        } else {
            None
        }
    }

    #[inline]
    pub fn mid_price(&self) -> Option<Price> {
        if self.is_valid() {
            Some((self.bid_price + self.ask_price) / 2)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Bbo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BBO{{{}@{}X{}@{}}}",
            qty_str(self.bid_qty),
            price_str(self.bid_price),
            price_str(self.ask_price),
            qty_str(self.ask_qty),
        )
    }
}
