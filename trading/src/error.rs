//! Failure modes of the mirror book and its feed.
//!
//! Mirror-book updates are all-or-nothing like their exchange-side
//! counterparts: an `Err` leaves the book unchanged. A sequence gap poisons
//! the whole ticker until a CLEAR plus snapshot resynchronizes it.

use common::types::SeqNum;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MarketBookError {
    /// The per-ticker stream skipped ahead; a snapshot resync is required.
    #[error("sequence gap: expected {expected}, got {got}")]
    SequenceGap { expected: SeqNum, got: SeqNum },

    /// The update references an order the mirror does not hold.
    #[error("unknown order")]
    UnknownOrder,

    /// An ADD arrived for an order id the mirror already holds.
    #[error("duplicate order")]
    DuplicateOrder,

    /// A record pool has no free slot.
    #[error("object pool exhausted")]
    PoolExhausted,

    /// The price table slot is occupied by a different price.
    #[error("price index collision")]
    PriceIndexCollision,

    /// The order table slot is occupied by a different order id.
    #[error("order index collision")]
    OrderIndexCollision,

    /// Malformed update (bad type or side for the operation).
    #[error("invalid update")]
    InvalidUpdate,
}
