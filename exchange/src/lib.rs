//! Exchange side of the trading system.
//!
//! The matching core: wire message definitions, the intrusive order and
//! price-level records, direct-addressed indices, the per-instrument
//! price-time priority order book, the pre-trade risk gate and the request
//! router. Each engine instance is owned by a single thread; rings carry
//! requests in and responses plus the public market-data stream out.

pub mod error;
pub mod index;
pub mod matching_engine;
pub mod order;
pub mod order_book;
pub mod protocol;
pub mod risk;

pub use error::{OrderBookError, RiskRejectReason};
pub use matching_engine::MatchingEngine;
pub use order_book::OrderBook;
