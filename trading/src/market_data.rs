//! Market data consumer for the trading side.
//!
//! Owns one mirror book per ticker and enforces the stream contract: per
//! ticker the sequence numbers must be contiguous. A gap marks the ticker
//! stale; from then on updates are dropped until the producer's CLEAR
//! arrives, after which the snapshot stream (SNAPSHOT_START through
//! SNAPSHOT_END, contiguous) rebuilds the book and the ticker goes live
//! again.
//!
//! Subscribers are notified whenever a live ticker's exposed BBO tuple
//! actually changes, and never while the ticker is stale or resyncing.

use crate::error::MarketBookError;
use crate::market_book::MarketOrderBook;
use crate::market_order::Bbo;
use common::types::{Limits, SeqNum, TickerId};
use exchange::protocol::{MarketUpdate, MarketUpdateType};

/// Callback invoked with the ticker and its new BBO.
pub type BboCallback = Box<dyn FnMut(TickerId, &Bbo) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncState {
    /// In sequence; updates apply and BBO changes publish.
    Live,
    /// A gap was observed; drop everything until the producer's CLEAR.
    Stale,
    /// Between CLEAR and SNAPSHOT_END of a resync.
    Syncing,
}

/// Applies the public stream to per-ticker mirror books.
pub struct MarketDataConsumer {
    books: Vec<MarketOrderBook>,
    expected_seq: Vec<SeqNum>,
    state: Vec<SyncState>,
    resync_needed: Vec<bool>,
    last_published: Vec<Bbo>,
    callbacks: Vec<BboCallback>,
}

impl MarketDataConsumer {
    pub fn new(limits: &Limits) -> Self {
        let books = (0..limits.max_tickers)
            .map(|ticker_id| MarketOrderBook::new(ticker_id as TickerId, limits))
            .collect();
        Self {
            books,
            expected_seq: vec![1; limits.max_tickers],
            state: vec![SyncState::Live; limits.max_tickers],
            resync_needed: vec![false; limits.max_tickers],
            last_published: vec![Bbo::default(); limits.max_tickers],
            callbacks: Vec::new(),
        }
    }

    /// Registers a BBO-change subscriber.
    pub fn subscribe(&mut self, callback: BboCallback) {
        self.callbacks.push(callback);
    }

    #[inline]
    pub fn book(&self, ticker_id: TickerId) -> Option<&MarketOrderBook> {
        self.books.get(ticker_id as usize)
    }

    #[inline]
    pub fn is_stale(&self, ticker_id: TickerId) -> bool {
        self.state
            .get(ticker_id as usize)
            .map(|s| *s != SyncState::Live)
            .unwrap_or(true)
    }

    /// Tickers that hit a gap since the last call. The application forwards
    /// these to the producer as snapshot requests.
    pub fn take_resync_requests(&mut self) -> Vec<TickerId> {
        let mut requests = Vec::new();
        for (ticker_id, needed) in self.resync_needed.iter_mut().enumerate() {
            if *needed {
                *needed = false;
                requests.push(ticker_id as TickerId);
            }
        }
        requests
    }

    /// Applies one update from the public stream.
    pub fn on_update(&mut self, update: &MarketUpdate) -> Result<(), MarketBookError> {
        let ticker_id = update.ticker_id;
        let seq_num = update.seq_num;
        let update_type = update.update_type().ok_or(MarketBookError::InvalidUpdate)?;

        let t = ticker_id as usize;
        if t >= self.books.len() {
            return Err(MarketBookError::InvalidUpdate);
        }

        match self.state[t] {
            SyncState::Stale => {
                // Only the resync CLEAR re-arms the sequence; everything
                // else from the broken stream is dropped.
                if update_type == MarketUpdateType::Clear {
                    self.books[t].apply(update)?;
                    self.expected_seq[t] = seq_num + 1;
                    self.state[t] = SyncState::Syncing;
                }
                Ok(())
            }
            SyncState::Live | SyncState::Syncing => {
                if seq_num != self.expected_seq[t] {
                    self.state[t] = SyncState::Stale;
                    self.resync_needed[t] = true;
                    return Err(MarketBookError::SequenceGap {
                        expected: self.expected_seq[t],
                        got: seq_num,
                    });
                }

                let applied = self.books[t].apply(update);
                self.expected_seq[t] = seq_num + 1;
                applied?;

                if self.state[t] == SyncState::Syncing
                    && update_type == MarketUpdateType::SnapshotEnd
                {
                    self.state[t] = SyncState::Live;
                }
                if self.state[t] == SyncState::Live {
                    self.publish_if_changed(t);
                }
                Ok(())
            }
        }
    }

    fn publish_if_changed(&mut self, t: usize) {
        let bbo = *self.books[t].bbo();
        if bbo != self.last_published[t] {
            self.last_published[t] = bbo;
            for callback in &mut self.callbacks {
                callback(t as TickerId, &bbo);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::{Price, Qty, Side};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn limits() -> Limits {
        Limits::small(64, 16)
    }

    fn update(
        ty: MarketUpdateType,
        seq: u64,
        oid: u64,
        side: Side,
        price: Price,
        qty: Qty,
        priority: u64,
    ) -> MarketUpdate {
        let mut u = MarketUpdate::new(ty, 0, oid, side as i8, price, qty, priority);
        u.seq_num = seq;
        u
    }

    #[test]
    fn test_in_sequence_stream_applies() {
        let mut consumer = MarketDataConsumer::new(&limits());

        consumer
            .on_update(&update(MarketUpdateType::Add, 1, 1, Side::Buy, 100, 10, 1))
            .unwrap();
        consumer
            .on_update(&update(MarketUpdateType::Add, 2, 2, Side::Sell, 105, 5, 1))
            .unwrap();

        let book = consumer.book(0).unwrap();
        assert_eq!(book.bbo().bid_price, 100);
        assert_eq!(book.bbo().ask_price, 105);
        assert!(!consumer.is_stale(0));
    }

    #[test]
    fn test_bbo_callbacks_fire_only_on_change() {
        let mut consumer = MarketDataConsumer::new(&limits());
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        consumer.subscribe(Box::new(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        // Top of book forms: one notification.
        consumer
            .on_update(&update(MarketUpdateType::Add, 1, 1, Side::Buy, 100, 10, 1))
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // A worse bid does not move the tuple: no notification.
        consumer
            .on_update(&update(MarketUpdateType::Add, 2, 2, Side::Buy, 99, 10, 1))
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Qty at the top changes: notification.
        consumer
            .on_update(&update(MarketUpdateType::Add, 3, 3, Side::Buy, 100, 5, 2))
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_gap_marks_stale_and_requests_resync() {
        let mut consumer = MarketDataConsumer::new(&limits());

        consumer
            .on_update(&update(MarketUpdateType::Add, 1, 1, Side::Buy, 100, 10, 1))
            .unwrap();

        // seq 2 lost; seq 3 arrives.
        let err = consumer
            .on_update(&update(MarketUpdateType::Add, 3, 3, Side::Buy, 101, 10, 1))
            .unwrap_err();
        assert_eq!(err, MarketBookError::SequenceGap { expected: 2, got: 3 });
        assert!(consumer.is_stale(0));
        assert_eq!(consumer.take_resync_requests(), vec![0]);
        assert!(consumer.take_resync_requests().is_empty());

        // While stale, ordinary updates are dropped on the floor.
        consumer
            .on_update(&update(MarketUpdateType::Add, 4, 4, Side::Buy, 102, 10, 1))
            .unwrap();
        assert_eq!(consumer.book(0).unwrap().order_count(), 1);
    }

    #[test]
    fn test_snapshot_resync_restores_live() {
        let mut consumer = MarketDataConsumer::new(&limits());

        consumer
            .on_update(&update(MarketUpdateType::Add, 1, 1, Side::Buy, 100, 10, 1))
            .unwrap();
        // Gap.
        let _ = consumer.on_update(&update(MarketUpdateType::Add, 5, 9, Side::Buy, 101, 1, 1));
        assert!(consumer.is_stale(0));

        // Producer answers with CLEAR + snapshot at seq 7..10.
        consumer
            .on_update(&update(
                MarketUpdateType::Clear,
                7,
                common::types::INVALID_ORDER_ID,
                Side::Invalid,
                common::types::INVALID_PRICE,
                0,
                0,
            ))
            .unwrap();
        assert!(consumer.is_stale(0));
        consumer
            .on_update(&update(
                MarketUpdateType::SnapshotStart,
                8,
                common::types::INVALID_ORDER_ID,
                Side::Invalid,
                common::types::INVALID_PRICE,
                0,
                0,
            ))
            .unwrap();
        consumer
            .on_update(&update(MarketUpdateType::Add, 9, 2, Side::Buy, 102, 7, 1))
            .unwrap();
        consumer
            .on_update(&update(
                MarketUpdateType::SnapshotEnd,
                10,
                common::types::INVALID_ORDER_ID,
                Side::Invalid,
                common::types::INVALID_PRICE,
                0,
                0,
            ))
            .unwrap();

        assert!(!consumer.is_stale(0));
        let book = consumer.book(0).unwrap();
        assert_eq!(book.order_count(), 1);
        assert_eq!(book.bbo().bid_price, 102);

        // Stream continues from the snapshot's sequence.
        consumer
            .on_update(&update(MarketUpdateType::Add, 11, 3, Side::Sell, 105, 2, 1))
            .unwrap();
        assert_eq!(consumer.book(0).unwrap().bbo().ask_price, 105);
    }

    #[test]
    fn test_gap_during_resync_goes_stale_again() {
        let mut consumer = MarketDataConsumer::new(&limits());

        let _ = consumer.on_update(&update(MarketUpdateType::Add, 9, 1, Side::Buy, 100, 1, 1));
        assert!(consumer.is_stale(0));
        consumer.take_resync_requests();

        consumer
            .on_update(&update(
                MarketUpdateType::Clear,
                12,
                common::types::INVALID_ORDER_ID,
                Side::Invalid,
                common::types::INVALID_PRICE,
                0,
                0,
            ))
            .unwrap();

        // The snapshot stream itself gaps: back to stale.
        let err = consumer
            .on_update(&update(MarketUpdateType::Add, 15, 2, Side::Buy, 100, 1, 1))
            .unwrap_err();
        assert!(matches!(err, MarketBookError::SequenceGap { .. }));
        assert!(consumer.is_stale(0));
        assert_eq!(consumer.take_resync_requests(), vec![0]);
    }
}
