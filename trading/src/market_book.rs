// Participant-side market-by-order book
//
// Rebuilds the exchange book from the public update stream: every resting
// order with its price, remaining qty and FIFO priority. Uses the same
// arena-and-handle structures as the matcher, so the reconstruction is
// exact down to FIFO order within each level.
//
// Updates are all-or-nothing: a refused update leaves the book unchanged.
// The BBO is recomputed only for the sides an update touched, and callers
// learn whether the exposed (price, aggregate qty) tuple actually moved.

use crate::error::MarketBookError;
use crate::market_order::{Bbo, MarketLevel, MarketOrder};
use common::mem_pool::{Handle, MemPool};
use common::types::{
    Limits, OrderId, Price, Priority, Qty, Side, TickerId, INVALID_PRICE, INVALID_QTY,
};
use exchange::index::PriceIndex;
use exchange::order::more_aggressive;
use exchange::protocol::{MarketUpdate, MarketUpdateType};

/// Order-id → handle map, slot = `order_id mod capacity`.
///
/// Ids grow without bound while the table is fixed, so two live orders can
/// alias a slot; the book verifies the stored record's id on every probe and
/// refuses the update rather than corrupt the mirror.
struct OrderIdIndex {
    slots: Box<[Handle]>,
}

impl OrderIdIndex {
    fn new(capacity: usize) -> Self {
        assert!(capacity > 0);
        Self {
            slots: vec![Handle::INVALID; capacity].into_boxed_slice(),
        }
    }

    #[inline]
    fn slot_of(&self, order_id: OrderId) -> usize {
        (order_id % self.slots.len() as u64) as usize
    }

    #[inline]
    fn at(&self, order_id: OrderId) -> Handle {
        self.slots[self.slot_of(order_id)]
    }

    #[inline]
    fn set(&mut self, order_id: OrderId, handle: Handle) {
        let slot = self.slot_of(order_id);
        self.slots[slot] = handle;
    }

    #[inline]
    fn remove(&mut self, order_id: OrderId) {
        let slot = self.slot_of(order_id);
        self.slots[slot] = Handle::INVALID;
    }

    fn clear(&mut self) {
        self.slots.fill(Handle::INVALID);
    }
}

/// Mirror order book for one instrument.
pub struct MarketOrderBook {
    ticker_id: TickerId,
    orders: MemPool<MarketOrder>,
    levels: MemPool<MarketLevel>,
    best_bid: Handle,
    best_ask: Handle,
    price_index: PriceIndex,
    oid_index: OrderIdIndex,
    bbo: Bbo,
}

impl MarketOrderBook {
    pub fn new(ticker_id: TickerId, limits: &Limits) -> Self {
        Self {
            ticker_id,
            orders: MemPool::new(limits.max_order_ids),
            levels: MemPool::new(limits.max_price_levels),
            best_bid: Handle::INVALID,
            best_ask: Handle::INVALID,
            price_index: PriceIndex::new(limits.max_price_levels),
            oid_index: OrderIdIndex::new(limits.max_order_ids),
            bbo: Bbo::default(),
        }
    }

    #[inline]
    pub fn ticker_id(&self) -> TickerId {
        self.ticker_id
    }

    #[inline]
    pub fn bbo(&self) -> &Bbo {
        &self.bbo
    }

    /// Applies one public update. Returns whether the BBO tuple changed.
    pub fn apply(&mut self, update: &MarketUpdate) -> Result<bool, MarketBookError> {
        let order_id = update.order_id;
        let side = Side::from_i8(update.side);
        let price = update.price;
        let qty = update.qty;
        let priority = update.priority;

        match update.update_type() {
            Some(MarketUpdateType::Add) => {
                self.on_add(order_id, side, price, qty, priority)?;
                Ok(self.update_bbo(side == Side::Buy, side == Side::Sell))
            }
            Some(MarketUpdateType::Modify) => {
                let side = self.on_modify(order_id, qty)?;
                Ok(self.update_bbo(side == Side::Buy, side == Side::Sell))
            }
            Some(MarketUpdateType::Cancel) => {
                let side = self.on_cancel(order_id)?;
                Ok(self.update_bbo(side == Side::Buy, side == Side::Sell))
            }
            Some(MarketUpdateType::Trade) => {
                let side = self.on_trade(order_id, qty)?;
                Ok(self.update_bbo(side == Side::Buy, side == Side::Sell))
            }
            Some(MarketUpdateType::Clear) => {
                self.on_clear();
                Ok(self.update_bbo(true, true))
            }
            Some(MarketUpdateType::SnapshotStart) | Some(MarketUpdateType::SnapshotEnd) => {
                Ok(false)
            }
            None => Err(MarketBookError::InvalidUpdate),
        }
    }

    fn on_add(
        &mut self,
        order_id: OrderId,
        side: Side,
        price: Price,
        qty: Qty,
        priority: Priority,
    ) -> Result<(), MarketBookError> {
        if !side.is_valid() || price == INVALID_PRICE || qty == 0 || qty == INVALID_QTY {
            return Err(MarketBookError::InvalidUpdate);
        }

        let existing = self.oid_index.at(order_id);
        if existing.is_valid() {
            if self.orders.get(existing).order_id == order_id {
                return Err(MarketBookError::DuplicateOrder);
            }
            return Err(MarketBookError::OrderIndexCollision);
        }

        let level_probe = self.find_level(price)?;
        if level_probe.is_valid() && self.levels.get(level_probe).side != side {
            return Err(MarketBookError::InvalidUpdate);
        }

        let order_h = match self.orders.acquire(MarketOrder {
            order_id,
            side,
            price,
            qty,
            priority,
            prev_order: Handle::INVALID,
            next_order: Handle::INVALID,
        }) {
            Some(h) => h,
            None => return Err(MarketBookError::PoolExhausted),
        };

        let level_h = if level_probe.is_valid() {
            level_probe
        } else {
            let level_h = match self.levels.acquire(MarketLevel {
                side,
                price,
                first_order: Handle::INVALID,
                prev_level: Handle::INVALID,
                next_level: Handle::INVALID,
            }) {
                Some(h) => h,
                None => {
                    self.orders.release(order_h);
                    return Err(MarketBookError::PoolExhausted);
                }
            };
            self.insert_level(level_h);
            self.price_index.set(price, level_h);
            level_h
        };

        self.append_order(level_h, order_h);
        self.oid_index.set(order_id, order_h);
        Ok(())
    }

    /// Restates an order's remaining qty; zero removes it. Returns the side
    /// the change happened on.
    fn on_modify(&mut self, order_id: OrderId, qty: Qty) -> Result<Side, MarketBookError> {
        let order_h = self.lookup(order_id)?;
        let side = self.orders.get(order_h).side;
        if qty == 0 {
            self.remove_order(order_h);
        } else {
            self.orders.get_mut(order_h).qty = qty;
        }
        Ok(side)
    }

    fn on_cancel(&mut self, order_id: OrderId) -> Result<Side, MarketBookError> {
        let order_h = self.lookup(order_id)?;
        let side = self.orders.get(order_h).side;
        self.remove_order(order_h);
        Ok(side)
    }

    /// Applies an execution against the referenced resting order, removing
    /// it when fully consumed. Mirrors what the matcher did exchange-side.
    fn on_trade(&mut self, order_id: OrderId, qty: Qty) -> Result<Side, MarketBookError> {
        let order_h = self.lookup(order_id)?;
        let (side, remaining) = {
            let order = self.orders.get(order_h);
            (order.side, order.qty.saturating_sub(qty))
        };
        if remaining == 0 {
            self.remove_order(order_h);
        } else {
            self.orders.get_mut(order_h).qty = remaining;
        }
        Ok(side)
    }

    fn on_clear(&mut self) {
        self.orders.clear();
        self.levels.clear();
        self.price_index.clear();
        self.oid_index.clear();
        self.best_bid = Handle::INVALID;
        self.best_ask = Handle::INVALID;
    }

    fn lookup(&self, order_id: OrderId) -> Result<Handle, MarketBookError> {
        let h = self.oid_index.at(order_id);
        if !h.is_valid() || self.orders.get(h).order_id != order_id {
            return Err(MarketBookError::UnknownOrder);
        }
        Ok(h)
    }

    fn find_level(&self, price: Price) -> Result<Handle, MarketBookError> {
        let h = self.price_index.at(price);
        if !h.is_valid() {
            return Ok(Handle::INVALID);
        }
        if self.levels.get(h).price != price {
            return Err(MarketBookError::PriceIndexCollision);
        }
        Ok(h)
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

    fn remove_order(&mut self, order_h: Handle) {
        let (order_id, price, prev, next) = {
            let order = self.orders.get(order_h);
            (order.order_id, order.price, order.prev_order, order.next_order)
        };

        self.oid_index.remove(order_id);

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

    // ------------------------------------------------------------------
    // BBO maintenance
    // ------------------------------------------------------------------

    /// Head price and aggregate head-level qty of a side, sentinels when
    /// the side is empty.
    fn side_top(&self, side: Side) -> (Price, Qty) {
        let head = self.head_of(side);
        if !head.is_valid() {
            return (INVALID_PRICE, INVALID_QTY);
        }
        let level = self.levels.get(head);
        let first = level.first_order;
        let mut total: Qty = 0;
        let mut order_h = first;
        loop {
            let order = self.orders.get(order_h);
            total += order.qty;
            order_h = order.next_order;
            if order_h == first {
                break;
            }
        }
        (level.price, total)
    }

    /// Recomputes the requested sides; true when the exposed tuple moved.
    fn update_bbo(&mut self, update_bid: bool, update_ask: bool) -> bool {
        let mut changed = false;

        if update_bid {
            let (price, qty) = self.side_top(Side::Buy);
            if price != self.bbo.bid_price || qty != self.bbo.bid_qty {
                self.bbo.bid_price = price;
                self.bbo.bid_qty = qty;
                changed = true;
            }
        }
        if update_ask {
            let (price, qty) = self.side_top(Side::Sell);
            if price != self.bbo.ask_price || qty != self.bbo.ask_qty {
                self.bbo.ask_price = price;
                self.bbo.ask_qty = qty;
                changed = true;
            }
        }

        changed
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn order_count(&self) -> usize {
        self.orders.capacity() - self.orders.available()
    }

    pub fn level_count(&self) -> usize {
        self.levels.capacity() - self.levels.available()
    }

    /// Same shape as the exchange book's dump so mirrors can be compared
    /// directly in tests.
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
                fifo.push((order.order_id, order.qty, order.priority));
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

    /// Multi-line human dump. No stability contract.
    pub fn render(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        let _ = writeln!(out, "MarketOrderBook[ticker:{} {}]", self.ticker_id, self.bbo);
        for (label, side) in [("ASKS", Side::Sell), ("BIDS", Side::Buy)] {
            let _ = writeln!(out, "  {}:", label);
            for (price, fifo) in self.side_levels(side) {
                let _ = writeln!(out, "    price:{} orders:{}", price, fifo.len());
                for (order_id, qty, priority) in fifo {
                    let _ = writeln!(
                        out,
                        "      oid:{} qty:{} prio:{}",
                        order_id, qty, priority
                    );
                }
            }
        }
        out
    }

    /// Structural invariant sweep; mirrors the exchange-side checker.
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
                let level = self.levels.get(level_h);
                levels_seen += 1;

                if level.side != side {
                    return Err(format!("level {} is on the wrong side list", level));
                }
                if let Some(prev) = prev_price {
                    if !more_aggressive(side, prev, level.price) {
                        return Err(format!(
                            "side {} list not strictly monotonic at {}",
                            side, level.price
                        ));
                    }
                }
                prev_price = Some(level.price);

                if self.price_index.at(level.price) != level_h {
                    return Err(format!("price index does not resolve {}", level));
                }
                if self.levels.get(level.prev_level).next_level != level_h
                    || self.levels.get(level.next_level).prev_level != level_h
                {
                    return Err(format!("level list links broken at {}", level));
                }

                let first = level.first_order;
                if !first.is_valid() {
                    return Err(format!("live level {} has an empty FIFO", level));
                }
                let mut order_h = first;
                let mut prev_priority: Option<Priority> = None;
                loop {
                    let order = self.orders.get(order_h);
                    orders_seen += 1;

                    if order.side != side || order.price != level.price {
                        return Err(format!("order {} disagrees with level {}", order, level));
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
                    if self.oid_index.at(order.order_id) != order_h {
                        return Err(format!("order index does not resolve {}", order));
                    }

                    order_h = order.next_order;
                    if order_h == first {
                        break;
                    }
                }

                level_h = level.next_level;
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
