//! Participant side of the trading system.
//!
//! Rebuilds the exchange's per-instrument order books from the public
//! market-data stream: mirror records, the market-by-order book with BBO
//! maintenance, and the consumer that enforces sequence continuity and
//! drives snapshot resyncs.

pub mod error;
pub mod market_book;
pub mod market_data;
pub mod market_order;

pub use error::MarketBookError;
pub use market_book::MarketOrderBook;
pub use market_data::MarketDataConsumer;
pub use market_order::Bbo;
