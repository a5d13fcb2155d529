//! Property tests for the matching book.
//!
//! Random legal request sequences drive the book, and after every request
//! the full invariant sweep must pass: circular link consistency, strict
//! side-list monotonicity, increasing FIFO priorities, index round trips.
//! Separate properties check mass balance and price-time priority.

use common::types::{Limits, Price, Qty, Side};
use exchange::order_book::OrderBook;
use exchange::protocol::{ClientResponse, MarketUpdate, MarketUpdateType};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    Add {
        client: u32,
        coid: u64,
        side: Side,
        price: Price,
        qty: Qty,
    },
    Cancel {
        client: u32,
        coid: u64,
    },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    // Prices stay inside one run of the 16-slot price table so the only
    // rejects exercised here are duplicates, unknown cancels and pool
    // exhaustion.
    let add = (0u32..4, 0u64..32, any::<bool>(), 100i64..116, 1u32..50).prop_map(
        |(client, coid, is_buy, price, qty)| Op::Add {
            client,
            coid,
            side: if is_buy { Side::Buy } else { Side::Sell },
            price,
            qty,
        },
    );
    let cancel = (0u32..4, 0u64..32).prop_map(|(client, coid)| Op::Cancel { client, coid });
    prop_oneof![4 => add, 1 => cancel]
}

fn apply(book: &mut OrderBook, op: &Op) -> (Vec<ClientResponse>, Vec<MarketUpdate>) {
    let mut responses = Vec::new();
    let mut updates = Vec::new();
    match *op {
        Op::Add {
            client,
            coid,
            side,
            price,
            qty,
        } => {
            let moid = book.allocate_market_order_id();
            let _ = book.add(
                moid,
                client,
                coid,
                side,
                price,
                qty,
                &mut responses,
                &mut updates,
            );
        }
        Op::Cancel { client, coid } => {
            let _ = book.cancel(client, coid, &mut responses, &mut updates);
        }
    }
    (responses, updates)
}

fn resting_qty(book: &OrderBook, side: Side) -> u64 {
    book.side_levels(side)
        .iter()
        .flat_map(|(_, fifo)| fifo.iter())
        .map(|(_, qty, _)| *qty as u64)
        .sum()
}

proptest! {
    #[test]
    fn invariants_hold_after_every_request(ops in prop::collection::vec(op_strategy(), 1..200)) {
        let mut book = OrderBook::new(0, &Limits::small(64, 16));
        for op in &ops {
            let _ = apply(&mut book, op);
            if let Err(violation) = book.check_invariants() {
                prop_assert!(false, "invariant violated after {:?}: {}", op, violation);
            }
        }
    }

    #[test]
    fn mass_balance_without_cancels(ops in prop::collection::vec(op_strategy(), 1..150)) {
        let mut book = OrderBook::new(0, &Limits::small(256, 16));
        let mut submitted = 0u64;
        let mut matched = 0u64;

        for op in &ops {
            if let Op::Add { qty, .. } = op {
                let (responses, updates) = apply(&mut book, op);
                // Count only accepted submissions.
                let accepted = responses
                    .first()
                    .map(|r| r.response_type() == Some(exchange::protocol::ClientResponseType::Accepted))
                    .unwrap_or(false);
                if accepted {
                    submitted += *qty as u64;
                }
                for update in &updates {
                    if update.update_type() == Some(MarketUpdateType::Trade) {
                        let fill = update.qty;
                        // Each trade consumes the fill qty on both sides.
                        matched += 2 * fill as u64;
                    }
                }
            }
        }

        let resting = resting_qty(&book, Side::Buy) + resting_qty(&book, Side::Sell);
        prop_assert_eq!(matched + resting, submitted);
    }

    #[test]
    fn price_time_priority_at_one_level(
        quantities in prop::collection::vec(1u32..20, 2..8),
        crossing_extra in 0u32..10,
    ) {
        let mut book = OrderBook::new(0, &Limits::small(64, 16));
        let mut responses = Vec::new();
        let mut updates = Vec::new();

        let mut moids = Vec::new();
        for (i, qty) in quantities.iter().enumerate() {
            let moid = book.allocate_market_order_id();
            book.add(moid, 1, i as u64, Side::Buy, 100, *qty, &mut responses, &mut updates)
                .unwrap();
            moids.push(moid);
        }

        // Cross with enough to consume the first order fully plus part of
        // the second, never the whole level.
        let crossing = quantities[0] + crossing_extra % quantities[1];
        responses.clear();
        updates.clear();
        let moid = book.allocate_market_order_id();
        book.add(moid, 3, 40, Side::Sell, 100, crossing, &mut responses, &mut updates)
            .unwrap();

        // The earliest order is gone; no later order was touched before it.
        let fifo: Vec<u64> = book.side_levels(Side::Buy)
            .first()
            .map(|(_, fifo)| fifo.iter().map(|(moid, _, _)| *moid).collect())
            .unwrap_or_default();
        prop_assert!(!fifo.contains(&moids[0]));
        for later in &moids[2..] {
            prop_assert!(fifo.contains(later));
        }
        book.check_invariants().unwrap();
    }

    #[test]
    fn add_then_cancel_restores_state(
        setup in prop::collection::vec(op_strategy(), 0..40),
        price in 100i64..116,
        qty in 1u32..50,
    ) {
        let mut book = OrderBook::new(0, &Limits::small(64, 16));
        for op in &setup {
            let _ = apply(&mut book, op);
        }

        let bids_before = book.side_levels(Side::Buy);
        let asks_before = book.side_levels(Side::Sell);

        // A non-crossing add followed by its cancel is a no-op on the book.
        let best_ask = book.best_price(Side::Sell);
        prop_assume!(best_ask == common::types::INVALID_PRICE || price < best_ask);

        let mut responses = Vec::new();
        let mut updates = Vec::new();
        let moid = book.allocate_market_order_id();
        let added = book.add(moid, 7, 63, Side::Buy, price, qty, &mut responses, &mut updates);
        prop_assume!(added.is_ok());
        book.cancel(7, 63, &mut responses, &mut updates).unwrap();

        prop_assert_eq!(book.side_levels(Side::Buy), bids_before);
        prop_assert_eq!(book.side_levels(Side::Sell), asks_before);
        book.check_invariants().unwrap();
    }
}
