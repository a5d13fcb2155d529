// Price-time priority matching book
//
// Owns all per-instrument state: the order and price-level arenas, the two
// circular level lists (bids descending, asks ascending), the price index
// and the per-client order index. Matching walks the opposite side's level
// list head-first and fills against FIFO heads until the incoming price no
// longer crosses.
//
// Every operation is all-or-nothing: slot headroom and index slots are
// checked (and slots acquired) before the first observable mutation, so a
// rejected request leaves the book untouched. Emitted updates are stamped
// with the per-ticker sequence number at publication, after the structures
// already reflect the new state.

use crate::error::OrderBookError;
use crate::index::{ClientOrderIndex, PriceIndex};
use crate::order::{crosses, more_aggressive, Order, PriceLevel};
use crate::protocol::{
    ClientResponse, ClientResponseType, MarketUpdate, MarketUpdateType, RejectReason,
};
use common::mem_pool::{Handle, MemPool};
use common::types::{
    ClientId, Limits, OrderId, Price, Priority, Qty, SeqNum, Side, TickerId, INVALID_ORDER_ID,
    INVALID_PRICE, INVALID_PRIORITY, INVALID_QTY,
};

/// Per-instrument limit order book with price-time priority matching.
pub struct OrderBook {
    ticker_id: TickerId,
    orders: MemPool<Order>,
    levels: MemPool<PriceLevel>,
    /// Head of the bid level list (highest price) or INVALID.
    best_bid: Handle,
    /// Head of the ask level list (lowest price) or INVALID.
    best_ask: Handle,
    price_index: PriceIndex,
    client_index: ClientOrderIndex,
    next_market_order_id: OrderId,
    next_seq_num: SeqNum,
}

impl OrderBook {
    pub fn new(ticker_id: TickerId, limits: &Limits) -> Self {
        Self {
            ticker_id,
            // One order slot per id in the book-wide id space; levels sized
            // to the price table so the index can always hold every level.
            orders: MemPool::new(limits.max_order_ids),
            levels: MemPool::new(limits.max_price_levels),
            best_bid: Handle::INVALID,
            best_ask: Handle::INVALID,
            price_index: PriceIndex::new(limits.max_price_levels),
            client_index: ClientOrderIndex::new(limits.max_clients, limits.max_order_ids),
            next_market_order_id: 1,
            next_seq_num: 1,
        }
    }

    #[inline]
    pub fn ticker_id(&self) -> TickerId {
        self.ticker_id
    }

    /// Hands out the next market order id (monotone, never reused).
    #[inline]
    pub fn allocate_market_order_id(&mut self) -> OrderId {
        let id = self.next_market_order_id;
        self.next_market_order_id += 1;
        id
    }

    // ------------------------------------------------------------------
    // Public operations
    // ------------------------------------------------------------------

    /// Adds a new order: matches against the opposite side, rests any
    /// remainder. Appends the acknowledgement, per-fill executions and
    /// public updates to the caller's buffers.
    ///
    /// On `Err` nothing was emitted and the book is unchanged.
    #[allow(clippy::too_many_arguments)]
    pub fn add(
        &mut self,
        market_order_id: OrderId,
        client_id: ClientId,
        client_order_id: OrderId,
        side: Side,
        price: Price,
        qty: Qty,
        responses: &mut Vec<ClientResponse>,
        updates: &mut Vec<MarketUpdate>,
    ) -> Result<(), OrderBookError> {
        if !side.is_valid() || price == INVALID_PRICE || qty == 0 || qty == INVALID_QTY {
            return Err(OrderBookError::InvalidOrder);
        }
        if !self.client_index.in_range(client_id, client_order_id) {
            return Err(OrderBookError::InvalidOrder);
        }
        if self.client_index.at(client_id, client_order_id).is_valid() {
            return Err(OrderBookError::DuplicateOrderId);
        }

        // Pre-flight the arenas and the price-index slot so nothing below
        // can fail. A same-side level survives matching untouched; a level
        // found on the opposite side is fully consumed before any remainder
        // can rest, so it counts as "level missing" for headroom purposes.
        let probe = self.find_level(price)?;
        let same_side_level = probe.is_valid() && self.levels.get(probe).side == side;

        let order_h = match self.orders.acquire(Order::default()) {
            Some(h) => h,
            None => return Err(OrderBookError::PoolExhausted),
        };
        let new_level_h = if same_side_level {
            Handle::INVALID
        } else {
            match self.levels.acquire(PriceLevel::default()) {
                Some(h) => h,
                None => {
                    self.orders.release(order_h);
                    return Err(OrderBookError::PoolExhausted);
                }
            }
        };

        responses.push(ClientResponse::new(
            ClientResponseType::Accepted,
            RejectReason::None,
            client_id,
            self.ticker_id,
            client_order_id,
            market_order_id,
            side as i8,
            price,
            0,
            qty,
        ));

        let leaves = self.match_incoming(
            market_order_id,
            client_id,
            client_order_id,
            side,
            price,
            qty,
            responses,
            updates,
        );

        if leaves > 0 {
            let level_h = if same_side_level { probe } else { new_level_h };
            self.rest_order(
                order_h,
                level_h,
                same_side_level,
                market_order_id,
                client_id,
                client_order_id,
                side,
                price,
                leaves,
                updates,
            );
        } else {
            // Fully matched; hand the reserved slots back.
            self.orders.release(order_h);
            if new_level_h.is_valid() {
                self.levels.release(new_level_h);
            }
        }

        Ok(())
    }

    /// Cancels a resting order looked up through the per-client index.
    ///
    /// On `Err` nothing was emitted and the book is unchanged.
    pub fn cancel(
        &mut self,
        client_id: ClientId,
        client_order_id: OrderId,
        responses: &mut Vec<ClientResponse>,
        updates: &mut Vec<MarketUpdate>,
    ) -> Result<(), OrderBookError> {
        if !self.client_index.in_range(client_id, client_order_id) {
            return Err(OrderBookError::UnknownOrder);
        }
        let order_h = self.client_index.at(client_id, client_order_id);
        if !order_h.is_valid() {
            return Err(OrderBookError::UnknownOrder);
        }

        let order = self.orders.get(order_h).clone();
        self.client_index.remove(client_id, client_order_id);
        self.unlink_order(order_h);

        responses.push(ClientResponse::new(
            ClientResponseType::Canceled,
            RejectReason::None,
            client_id,
            self.ticker_id,
            client_order_id,
            order.market_order_id,
            order.side as i8,
            order.price,
            0,
            order.qty,
        ));
        self.publish(
            MarketUpdate::new(
                MarketUpdateType::Cancel,
                self.ticker_id,
                order.market_order_id,
                order.side as i8,
                order.price,
                order.qty,
                order.priority,
            ),
            updates,
        );

        Ok(())
    }

    /// Empties the book and tells the stream about it.
    pub fn clear(&mut self, updates: &mut Vec<MarketUpdate>) {
        self.orders.clear();
        self.levels.clear();
        self.price_index.clear();
        self.client_index.clear();
        self.best_bid = Handle::INVALID;
        self.best_ask = Handle::INVALID;

        self.publish(
            MarketUpdate::new(
                MarketUpdateType::Clear,
                self.ticker_id,
                INVALID_ORDER_ID,
                Side::Invalid as i8,
                INVALID_PRICE,
                0,
                INVALID_PRIORITY,
            ),
            updates,
        );
    }

    /// Emits a recovery snapshot into the stream: CLEAR, SNAPSHOT_START, one
    /// ADD per resting order (best level outward, FIFO order, true priority
    /// and remaining qty), SNAPSHOT_END. The book itself is not modified;
    /// replaying the emitted slice into an empty mirror reproduces this
    /// book's state.
    pub fn snapshot(&mut self, updates: &mut Vec<MarketUpdate>) {
        self.publish(
            MarketUpdate::new(
                MarketUpdateType::Clear,
                self.ticker_id,
                INVALID_ORDER_ID,
                Side::Invalid as i8,
                INVALID_PRICE,
                0,
                INVALID_PRIORITY,
            ),
            updates,
        );
        self.publish(
            MarketUpdate::new(
                MarketUpdateType::SnapshotStart,
                self.ticker_id,
                INVALID_ORDER_ID,
                Side::Invalid as i8,
                INVALID_PRICE,
                0,
                INVALID_PRIORITY,
            ),
            updates,
        );

        for side in [Side::Buy, Side::Sell] {
            let head = self.head_of(side);
            let mut level_h = head;
            while level_h.is_valid() {
                let level = self.levels.get(level_h);
                let (price, first, next_level) = (level.price, level.first_order, level.next_level);

                let mut order_h = first;
                loop {
                    let order = self.orders.get(order_h);
                    let update = MarketUpdate::new(
                        MarketUpdateType::Add,
                        self.ticker_id,
                        order.market_order_id,
                        side as i8,
                        price,
                        order.qty,
                        order.priority,
                    );
                    let next_order = order.next_order;
                    self.publish(update, updates);
                    order_h = next_order;
                    if order_h == first {
                        break;
                    }
                }

                level_h = if next_level == head {
                    Handle::INVALID
                } else {
                    next_level
                };
            }
        }

        self.publish(
            MarketUpdate::new(
                MarketUpdateType::SnapshotEnd,
                self.ticker_id,
                INVALID_ORDER_ID,
                Side::Invalid as i8,
                INVALID_PRICE,
                0,
                INVALID_PRIORITY,
            ),
            updates,
        );
    }

    // ------------------------------------------------------------------
    // Matching
    // ------------------------------------------------------------------

    /// Fills the incoming order against opposite-side FIFO heads while its
    /// limit crosses the best level. Returns the unmatched remainder.
    #[allow(clippy::too_many_arguments)]
    fn match_incoming(
        &mut self,
        market_order_id: OrderId,
        client_id: ClientId,
        client_order_id: OrderId,
        side: Side,
        price: Price,
        qty: Qty,
        responses: &mut Vec<ClientResponse>,
        updates: &mut Vec<MarketUpdate>,
    ) -> Qty {
        let mut leaves = qty;
        let opposite = side.opposite();

        while leaves > 0 {
            let best_h = self.head_of(opposite);
            if !best_h.is_valid() {
                break;
            }
            let best_price = self.levels.get(best_h).price;
            if !crosses(side, price, best_price) {
                break;
            }

            let head_h = self.levels.get(best_h).first_order;
            let resting = self.orders.get(head_h);
            let (r_moid, r_client, r_coid, r_qty, r_priority) = (
                resting.market_order_id,
                resting.client_id,
                resting.client_order_id,
                resting.qty,
                resting.priority,
            );

            let fill = leaves.min(r_qty);
            leaves -= fill;
            let r_remaining = r_qty - fill;

            // One execution per participant; the trade prints at the
            // resting order's price.
            responses.push(ClientResponse::new(
                ClientResponseType::Filled,
                RejectReason::None,
                client_id,
                self.ticker_id,
                client_order_id,
                market_order_id,
                side as i8,
                best_price,
                fill,
                leaves,
            ));
            responses.push(ClientResponse::new(
                ClientResponseType::Filled,
                RejectReason::None,
                r_client,
                self.ticker_id,
                r_coid,
                r_moid,
                opposite as i8,
                best_price,
                fill,
                r_remaining,
            ));
            self.publish(
                MarketUpdate::new(
                    MarketUpdateType::Trade,
                    self.ticker_id,
                    r_moid,
                    opposite as i8,
                    best_price,
                    fill,
                    r_priority,
                ),
                updates,
            );

            if r_remaining == 0 {
                self.client_index.remove(r_client, r_coid);
                self.unlink_order(head_h);
            } else {
                // The head absorbs the rest of the incoming order; restate
                // its remaining qty so the stream alone rebuilds the book.
                self.orders.get_mut(head_h).qty = r_remaining;
                self.publish(
                    MarketUpdate::new(
                        MarketUpdateType::Modify,
                        self.ticker_id,
                        r_moid,
                        opposite as i8,
                        best_price,
                        r_remaining,
                        r_priority,
                    ),
                    updates,
                );
                break;
            }
        }

        leaves
    }

    // ------------------------------------------------------------------
    // Resting
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn rest_order(
        &mut self,
        order_h: Handle,
        level_h: Handle,
        level_exists: bool,
        market_order_id: OrderId,
        client_id: ClientId,
        client_order_id: OrderId,
        side: Side,
        price: Price,
        qty: Qty,
        updates: &mut Vec<MarketUpdate>,
    ) {
        if !level_exists {
            // Any opposite-side level at this price was consumed while
            // matching, so the index slot is free again.
            debug_assert!(!self.price_index.at(price).is_valid());
            *self.levels.get_mut(level_h) = PriceLevel {
                side,
                price,
                first_order: Handle::INVALID,
                prev_level: Handle::INVALID,
                next_level: Handle::INVALID,
            };
            self.insert_level(level_h);
            self.price_index.set(price, level_h);
        }

        let priority = self.next_priority(level_h);
        *self.orders.get_mut(order_h) = Order {
            ticker_id: self.ticker_id,
            client_id,
            client_order_id,
            market_order_id,
            side,
            price,
            qty,
            priority,
            prev_order: Handle::INVALID,
            next_order: Handle::INVALID,
        };
        self.append_order(level_h, order_h);
        self.client_index.set(client_id, client_order_id, order_h);

        self.publish(
            MarketUpdate::new(
                MarketUpdateType::Add,
                self.ticker_id,
                market_order_id,
                side as i8,
                price,
                qty,
                priority,
            ),
            updates,
        );
    }

    /// Priority for the next order at a level: one past the tail, restarting
    /// at 1 when the level is empty or freshly created.
    fn next_priority(&self, level_h: Handle) -> Priority {
        let first = self.levels.get(level_h).first_order;
        if !first.is_valid() {
            return 1;
        }
        let tail = self.orders.get(first).prev_order;
        self.orders.get(tail).priority + 1
    }

    // ------------------------------------------------------------------
    // Intrusive list plumbing
    // ------------------------------------------------------------------

    #[inline]
    fn head_of(&self, side: Side) -> Handle {
        match side {
            Side::Buy => self.best_bid,
            Side::Sell => self.best_ask,
            Side::Invalid => Handle::INVALID,
        }
    }

    #[inline]
    fn set_head(&mut self, side: Side, handle: Handle) {
        match side {
            Side::Buy => self.best_bid = handle,
            Side::Sell => self.best_ask = handle,
            Side::Invalid => {}
        }
    }

    /// Level at `price`, INVALID when absent, error when the table slot is
    /// occupied by a different price.
    fn find_level(&self, price: Price) -> Result<Handle, OrderBookError> {
        let h = self.price_index.at(price);
        if !h.is_valid() {
            return Ok(Handle::INVALID);
        }
        if self.levels.get(h).price != price {
            return Err(OrderBookError::PriceIndexCollision);
        }
        Ok(h)
    }

    /// Links an initialized level into its side list, keeping the list
    /// ordered by aggressiveness and the head pointing at the best price.
    fn insert_level(&mut self, new_h: Handle) {
        let (side, price) = {
            let level = self.levels.get(new_h);
            (level.side, level.price)
        };

        let head = self.head_of(side);
        if !head.is_valid() {
            let level = self.levels.get_mut(new_h);
            level.prev_level = new_h;
            level.next_level = new_h;
            self.set_head(side, new_h);
            return;
        }

        // Walk until the first level the new price beats; wrapping back to
        // the head means the new level is the least aggressive.
        let mut cur = head;
        let mut becomes_head = false;
        loop {
            if more_aggressive(side, price, self.levels.get(cur).price) {
                becomes_head = cur == head;
                break;
            }
            cur = self.levels.get(cur).next_level;
            if cur == head {
                break;
            }
        }

        // Insert before `cur`.
        let prev = self.levels.get(cur).prev_level;
        self.levels.get_mut(prev).next_level = new_h;
        {
            let level = self.levels.get_mut(new_h);
            level.prev_level = prev;
            level.next_level = cur;
        }
        self.levels.get_mut(cur).prev_level = new_h;
        if becomes_head {
            self.set_head(side, new_h);
        }
    }

    /// Unlinks a level from its side list, clears its index slot and frees
    /// its record. The level must already have an empty FIFO.
    fn remove_level(&mut self, level_h: Handle) {
        let (side, price, prev, next) = {
            let level = self.levels.get(level_h);
            debug_assert!(!level.first_order.is_valid());
            (level.side, level.price, level.prev_level, level.next_level)
        };

        if next == level_h {
            self.set_head(side, Handle::INVALID);
        } else {
            self.levels.get_mut(prev).next_level = next;
            self.levels.get_mut(next).prev_level = prev;
            if self.head_of(side) == level_h {
                self.set_head(side, next);
            }
        }

        self.price_index.remove(price);
        self.levels.release(level_h);
    }

    /// Appends an order at the tail of a level's FIFO.
    fn append_order(&mut self, level_h: Handle, order_h: Handle) {
        let first = self.levels.get(level_h).first_order;
        if !first.is_valid() {
            self.levels.get_mut(level_h).first_order = order_h;
            let order = self.orders.get_mut(order_h);
            order.prev_order = order_h;
            order.next_order = order_h;
        } else {
            let tail = self.orders.get(first).prev_order;
            {
                let order = self.orders.get_mut(order_h);
                order.prev_order = tail;
                order.next_order = first;
            }
            self.orders.get_mut(tail).next_order = order_h;
            self.orders.get_mut(first).prev_order = order_h;
        }
    }

    /// Unlinks an order from its level's FIFO and frees its record; removes
    /// the level when the FIFO becomes empty. The per-client index entry is
    /// the caller's responsibility.
    fn unlink_order(&mut self, order_h: Handle) {
        let (price, prev, next) = {
            let order = self.orders.get(order_h);
            (order.price, order.prev_order, order.next_order)
        };

        let level_h = self.price_index.at(price);
        debug_assert!(level_h.is_valid());
        debug_assert_eq!(self.levels.get(level_h).price, price);

        if next == order_h {
            self.levels.get_mut(level_h).first_order = Handle::INVALID;
            self.orders.release(order_h);
            self.remove_level(level_h);
            return;
        }

        self.orders.get_mut(prev).next_order = next;
        self.orders.get_mut(next).prev_order = prev;
        if self.levels.get(level_h).first_order == order_h {
            self.levels.get_mut(level_h).first_order = next;
        }
        self.orders.release(order_h);
    }

    /// Stamps the per-ticker sequence number and appends to the stream.
    #[inline]
    fn publish(&mut self, mut update: MarketUpdate, updates: &mut Vec<MarketUpdate>) {
        update.seq_num = self.next_seq_num;
        self.next_seq_num += 1;
        updates.push(update);
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Best price on a side, or the invalid sentinel.
    pub fn best_price(&self, side: Side) -> Price {
        let head = self.head_of(side);
        if head.is_valid() {
            self.levels.get(head).price
        } else {
            INVALID_PRICE
        }
    }

    /// Number of currently resting orders.
    pub fn resting_order_count(&self) -> usize {
        self.orders.capacity() - self.orders.available()
    }

    /// Number of live price levels on both sides.
    pub fn level_count(&self) -> usize {
        self.levels.capacity() - self.levels.available()
    }

    /// All levels on a side, best first, each with its FIFO as
    /// (market order id, qty, priority) head first. Test and dump helper.
    pub fn side_levels(&self, side: Side) -> Vec<(Price, Vec<(OrderId, Qty, Priority)>)> {
        let mut result = Vec::new();
        let head = self.head_of(side);
        let mut level_h = head;
        while level_h.is_valid() {
            let level = self.levels.get(level_h);
            let mut fifo = Vec::new();
            let first = level.first_order;
            let mut order_h = first;
            loop {
                let order = self.orders.get(order_h);
                fifo.push((order.market_order_id, order.qty, order.priority));
                order_h = order.next_order;
                if order_h == first {
                    break;
                }
            }
            result.push((level.price, fifo));
            level_h = if level.next_level == head {
                Handle::INVALID
            } else {
                level.next_level
            };
        }
        result
    }

    /// Multi-line human dump of both sides. No stability contract.
    pub fn render(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        let _ = writeln!(out, "OrderBook[ticker:{}]", self.ticker_id);
        for (label, side) in [("ASKS", Side::Sell), ("BIDS", Side::Buy)] {
            let _ = writeln!(out, "  {}:", label);
            let head = self.head_of(side);
            let mut level_h = head;
            while level_h.is_valid() {
                let level = self.levels.get(level_h);
                let _ = writeln!(out, "    {}", level);
                let first = level.first_order;
                let mut order_h = first;
                loop {
                    let order = self.orders.get(order_h);
                    let _ = writeln!(out, "      {}", order);
                    order_h = order.next_order;
                    if order_h == first {
                        break;
                    }
                }
                level_h = if level.next_level == head {
                    Handle::INVALID
                } else {
                    level.next_level
                };
            }
        }
        out
    }

    // ------------------------------------------------------------------
    // Integrity validation (test/debug)
    // ------------------------------------------------------------------

    /// Walks every structure and verifies the book invariants: circular link
    /// consistency, strict price monotonicity per side, strictly increasing
    /// FIFO priorities, index round trips, positive resting quantities, and
    /// that nothing acquired from the pools is unreachable.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut orders_seen = 0usize;
        let mut levels_seen = 0usize;

        for side in [Side::Buy, Side::Sell] {
            let head = self.head_of(side);
            if !head.is_valid() {
                continue;
            }

            let mut level_h = head;
            let mut prev_price = None;
            loop {
                if !self.levels.in_use(level_h) {
                    return Err(format!("side {} references a freed level", side));
                }
                let level = self.levels.get(level_h);
                levels_seen += 1;

                if level.side != side {
                    return Err(format!(
                        "level {} on {} list has side {}",
                        level, side, level.side
                    ));
                }
                if let Some(prev) = prev_price {
                    if !more_aggressive(side, prev, level.price) {
                        return Err(format!(
                            "side {} list not strictly monotonic at price {}",
                            side, level.price
                        ));
                    }
                }
                prev_price = Some(level.price);

                if self.price_index.at(level.price) != level_h {
                    return Err(format!("price index does not resolve {}", level));
                }

                let prev_l = level.prev_level;
                let next_l = level.next_level;
                if self.levels.get(prev_l).next_level != level_h
                    || self.levels.get(next_l).prev_level != level_h
                {
                    return Err(format!("level list links broken at {}", level));
                }

                // FIFO walk.
                let first = level.first_order;
                if !first.is_valid() {
                    return Err(format!("live level {} has an empty FIFO", level));
                }
                let mut order_h = first;
                let mut prev_priority: Option<Priority> = None;
                loop {
                    if !self.orders.in_use(order_h) {
                        return Err(format!("FIFO of {} references a freed order", level));
                    }
                    let order = self.orders.get(order_h);
                    orders_seen += 1;

                    if order.side != side || order.price != level.price {
                        return Err(format!(
                            "order {} disagrees with its level {}",
                            order, level
                        ));
                    }
                    if order.qty == 0 || order.qty == INVALID_QTY {
                        return Err(format!("resting order {} has no quantity", order));
                    }
                    if let Some(prev) = prev_priority {
                        if order.priority <= prev {
                            return Err(format!("FIFO priorities not increasing at {}", order));
                        }
                    }
                    prev_priority = Some(order.priority);

                    if self.orders.get(order.prev_order).next_order != order_h
                        || self.orders.get(order.next_order).prev_order != order_h
                    {
                        return Err(format!("FIFO links broken at {}", order));
                    }

                    if self.client_index.at(order.client_id, order.client_order_id) != order_h {
                        return Err(format!("client index does not resolve {}", order));
                    }

                    order_h = order.next_order;
                    if order_h == first {
                        break;
                    }
                }

                level_h = next_l;
                if level_h == head {
                    break;
                }
            }
        }

        let orders_live = self.orders.capacity() - self.orders.available();
        if orders_seen != orders_live {
            return Err(format!(
                "order pool has {} live records but {} are reachable",
                orders_live, orders_seen
            ));
        }
        let levels_live = self.levels.capacity() - self.levels.available();
        if levels_seen != levels_live {
            return Err(format!(
                "level pool has {} live records but {} are reachable",
                levels_live, levels_seen
            ));
        }

        Ok(())
    }
}
