//! Direct-addressed lookup tables for the matching book.
//!
//! Both indices trade memory for deterministic O(1) probes: no hashing
//! beyond a modulo, no heap allocation after construction, no collision
//! chains. The price index can collide by construction (the table is sized
//! far beyond the concurrent breadth of the book); collisions are detected
//! by the caller comparing the stored level's price and rejected, never
//! resolved by probing.

use common::mem_pool::Handle;
use common::types::{ClientId, OrderId, Price};

/// Price → price-level-handle map, slot = `price mod capacity`.
///
/// Stores handles only; the caller verifies the level behind an occupied
/// slot actually carries the probe price before trusting it.
pub struct PriceIndex {
    slots: Box<[Handle]>,
}

impl PriceIndex {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "PriceIndex capacity must be greater than 0");
        Self {
            slots: vec![Handle::INVALID; capacity].into_boxed_slice(),
        }
    }

    /// Table slot for a price. Negative prices cast through two's complement
    /// before the modulo, which keeps the mapping total and stable.
    #[inline]
    pub fn slot_of(&self, price: Price) -> usize {
        (price as u64 % self.slots.len() as u64) as usize
    }

    #[inline]
    pub fn at(&self, price: Price) -> Handle {
        self.slots[self.slot_of(price)]
    }

    #[inline]
    pub fn set(&mut self, price: Price, handle: Handle) {
        let slot = self.slot_of(price);
        self.slots[slot] = handle;
    }

    #[inline]
    pub fn remove(&mut self, price: Price) {
        let slot = self.slot_of(price);
        self.slots[slot] = Handle::INVALID;
    }

    pub fn clear(&mut self) {
        self.slots.fill(Handle::INVALID);
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// (client, client-order-id) → order-handle map.
///
/// Two-level direct addressing sized max_clients × max_order_ids. An entry
/// is set when an order rests and cleared on cancel or full fill, so a valid
/// handle here always refers to a live resting order.
pub struct ClientOrderIndex {
    per_client: Box<[Box<[Handle]>]>,
    max_order_ids: usize,
}

impl ClientOrderIndex {
    pub fn new(max_clients: usize, max_order_ids: usize) -> Self {
        assert!(max_clients > 0 && max_order_ids > 0);
        let per_client = (0..max_clients)
            .map(|_| vec![Handle::INVALID; max_order_ids].into_boxed_slice())
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            per_client,
            max_order_ids,
        }
    }

    /// Whether (client, order id) is inside the configured id space.
    #[inline]
    pub fn in_range(&self, client_id: ClientId, client_order_id: OrderId) -> bool {
        (client_id as usize) < self.per_client.len()
            && (client_order_id as usize) < self.max_order_ids
    }

    /// Handle of the resting order, or `Handle::INVALID`. Caller must have
    /// range-checked the ids.
    #[inline]
    pub fn at(&self, client_id: ClientId, client_order_id: OrderId) -> Handle {
        self.per_client[client_id as usize][client_order_id as usize]
    }

    #[inline]
    pub fn set(&mut self, client_id: ClientId, client_order_id: OrderId, handle: Handle) {
        self.per_client[client_id as usize][client_order_id as usize] = handle;
    }

    #[inline]
    pub fn remove(&mut self, client_id: ClientId, client_order_id: OrderId) {
        self.per_client[client_id as usize][client_order_id as usize] = Handle::INVALID;
    }

    pub fn clear(&mut self) {
        for client_slots in self.per_client.iter_mut() {
            client_slots.fill(Handle::INVALID);
        }
    }

    #[inline]
    pub fn max_clients(&self) -> usize {
        self.per_client.len()
    }

    #[inline]
    pub fn max_order_ids(&self) -> usize {
        self.max_order_ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_index_set_get_remove() {
        let mut index = PriceIndex::new(256);
        assert!(!index.at(100).is_valid());

        index.set(100, Handle::from_index(7));
        assert_eq!(index.at(100), Handle::from_index(7));

        index.remove(100);
        assert!(!index.at(100).is_valid());
    }

    #[test]
    fn test_price_index_modulo_aliasing() {
        // Prices 100 and 356 share slot 100 in a 256-entry table. The index
        // itself just reports what lives in the slot; the book detects the
        // mismatch by comparing level prices.
        let mut index = PriceIndex::new(256);
        index.set(100, Handle::from_index(1));
        assert_eq!(index.slot_of(100), index.slot_of(356));
        assert_eq!(index.at(356), Handle::from_index(1));
    }

    #[test]
    fn test_price_index_negative_prices() {
        let mut index = PriceIndex::new(256);
        index.set(-50, Handle::from_index(3));
        assert_eq!(index.at(-50), Handle::from_index(3));
        index.remove(-50);
        assert!(!index.at(-50).is_valid());
    }

    #[test]
    fn test_price_index_clear() {
        let mut index = PriceIndex::new(16);
        index.set(1, Handle::from_index(1));
        index.set(2, Handle::from_index(2));
        index.clear();
        assert!(!index.at(1).is_valid());
        assert!(!index.at(2).is_valid());
    }

    #[test]
    fn test_client_index_roundtrip() {
        let mut index = ClientOrderIndex::new(4, 16);

        assert!(index.in_range(3, 15));
        assert!(!index.in_range(4, 0));
        assert!(!index.in_range(0, 16));

        assert!(!index.at(2, 5).is_valid());
        index.set(2, 5, Handle::from_index(9));
        assert_eq!(index.at(2, 5), Handle::from_index(9));

        // Same order id under a different client is a separate entry.
        assert!(!index.at(1, 5).is_valid());

        index.remove(2, 5);
        assert!(!index.at(2, 5).is_valid());
    }

    #[test]
    fn test_client_index_clear() {
        let mut index = ClientOrderIndex::new(2, 4);
        index.set(0, 0, Handle::from_index(1));
        index.set(1, 3, Handle::from_index(2));
        index.clear();
        assert!(!index.at(0, 0).is_valid());
        assert!(!index.at(1, 3).is_valid());
    }
}
