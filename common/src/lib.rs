//! Shared building blocks for the trading system.
//!
//! Leaf components used by both the exchange and the participant side:
//! typed primitives with invalid sentinels, the fixed-capacity object pool,
//! the SPSC ring buffer, the deferred logger and timing utilities.

pub mod lf_queue;
pub mod logging;
pub mod mem_pool;
pub mod time;
pub mod types;

pub use types::{
    order_id_str, price_str, priority_str, qty_str, ClientId, Limits, OrderId, Price, Priority,
    Qty, RiskCfg, SeqNum, Side, TickerId, TradeEngineCfg, INVALID_CLIENT_ID, INVALID_ORDER_ID,
    INVALID_PRICE, INVALID_PRIORITY, INVALID_QTY, INVALID_TICKER_ID, MAX_CLIENT_UPDATES,
    MAX_MARKET_UPDATES, MAX_NUM_CLIENTS, MAX_ORDER_IDS, MAX_PRICE_LEVELS, MAX_TICKERS, SIDE_SLOTS,
};
