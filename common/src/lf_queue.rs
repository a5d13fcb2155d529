// Lock-free SPSC queue implementation
//
// Single-producer single-consumer ring buffer used as the transport between
// pipeline stages (order flow into the matcher, responses and market data out
// of it). Atomic head/tail with acquire/release pairing; no locks.
//
// Capacity is fixed at construction (a power of two, so masking replaces
// modulo) and comes from startup configuration. The matcher itself never
// blocks: a full ring surfaces as backpressure to the producer.

use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A bounded lock-free single-producer single-consumer queue.
///
/// # Memory Ordering
/// - Producer uses Release when publishing tail, Acquire when reading head
/// - Consumer uses Release when publishing head, Acquire when reading tail
///
/// # Safety
/// - Only one thread may call `push` (the producer)
/// - Only one thread may call `pop` (the consumer)
/// - `len`, `is_empty`, `is_full`, `capacity` are safe from any thread
pub struct LFQueue<T> {
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    /// Producer index. Cache-padded so producer and consumer never share a
    /// cache line.
    tail: CachePadded<AtomicUsize>,
    /// Consumer index.
    head: CachePadded<AtomicUsize>,
}

// SAFETY: values of T are handed over between the producer and the consumer
// exactly once; the atomic indices provide the synchronization.
unsafe impl<T: Send> Send for LFQueue<T> {}
unsafe impl<T: Send> Sync for LFQueue<T> {}

impl<T> LFQueue<T> {
    /// Creates an empty queue with the given capacity.
    ///
    /// # Panics
    /// Panics if `capacity` is not a power of two or is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity > 0 && capacity.is_power_of_two(),
            "Capacity must be a power of 2"
        );

        let buffer = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            buffer,
            mask: capacity - 1,
            tail: CachePadded::new(AtomicUsize::new(0)),
            head: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Attempts to push an item onto the queue.
    ///
    /// Returns `Err(item)` when the ring is full, handing the item back to
    /// the producer (backpressure).
    ///
    /// Must only be called from the producer thread.
    #[inline]
    pub fn push(&self, item: T) -> Result<(), T> {
        // Only the producer writes tail, so a relaxed load is enough.
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);

        if tail.wrapping_sub(head) >= self.buffer.len() {
            return Err(item);
        }

        let index = tail & self.mask;

        // SAFETY: slots in [head, tail) are owned by the consumer, the slot at
        // tail is unpublished and therefore exclusively ours; we verified the
        // ring is not full.
        unsafe {
            (*self.buffer[index].get()).write(item);
        }

        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Attempts to pop an item from the queue. Returns `None` when empty.
    ///
    /// Must only be called from the consumer thread.
    #[inline]
    pub fn pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);

        if head == tail {
            return None;
        }

        let index = head & self.mask;

        // SAFETY: the producer published this slot via the Release store to
        // tail; it will not touch it again until head passes it.
        let item = unsafe { (*self.buffer[index].get()).assume_init_read() };

        self.head.store(head.wrapping_add(1), Ordering::Release);
        Some(item)
    }

    /// Current number of items. Approximate under concurrency.
    #[inline]
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        tail.wrapping_sub(head)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() >= self.buffer.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }
}

impl<T> Drop for LFQueue<T> {
    fn drop(&mut self) {
        // Drop any items still in flight.
        while self.pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_queue_is_empty() {
        let queue: LFQueue<u32> = LFQueue::new(8);
        assert!(queue.is_empty());
        assert!(!queue.is_full());
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.capacity(), 8);
    }

    #[test]
    fn test_push_pop_fifo() {
        let queue: LFQueue<u32> = LFQueue::new(8);

        for i in 0..5 {
            assert!(queue.push(i).is_ok());
        }
        assert_eq!(queue.len(), 5);

        for i in 0..5 {
            assert_eq!(queue.pop(), Some(i));
        }
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_full_queue_returns_item() {
        let queue: LFQueue<u32> = LFQueue::new(4);

        for i in 0..4 {
            assert!(queue.push(i).is_ok());
        }
        assert!(queue.is_full());

        let rejected = queue.push(100);
        assert_eq!(rejected.unwrap_err(), 100);
        assert!(queue.is_full());
    }

    #[test]
    fn test_wraparound() {
        let queue: LFQueue<u32> = LFQueue::new(4);

        for round in 0..10 {
            let base = round * 4;
            for i in 0..4 {
                assert!(queue.push(base + i).is_ok());
            }
            for i in 0..4 {
                assert_eq!(queue.pop(), Some(base + i));
            }
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_interleaved_push_pop() {
        let queue: LFQueue<u32> = LFQueue::new(4);

        queue.push(1).unwrap();
        queue.push(2).unwrap();
        assert_eq!(queue.pop(), Some(1));
        queue.push(3).unwrap();
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_cross_thread_handoff() {
        use std::sync::Arc;

        let queue: Arc<LFQueue<u64>> = Arc::new(LFQueue::new(1024));
        let producer_queue = Arc::clone(&queue);

        let producer = std::thread::spawn(move || {
            for i in 0..100_000u64 {
                loop {
                    if producer_queue.push(i).is_ok() {
                        break;
                    }
                    std::hint::spin_loop();
                }
            }
        });

        let mut expected = 0u64;
        while expected < 100_000 {
            if let Some(item) = queue.pop() {
                assert_eq!(item, expected);
                expected += 1;
            } else {
                std::hint::spin_loop();
            }
        }

        producer.join().unwrap();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drop_cleans_up() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static DROP_COUNT: AtomicUsize = AtomicUsize::new(0);

        #[derive(Debug)]
        struct DropCounter;
        impl Drop for DropCounter {
            fn drop(&mut self) {
                DROP_COUNT.fetch_add(1, Ordering::SeqCst);
            }
        }

        DROP_COUNT.store(0, Ordering::SeqCst);
        {
            let queue: LFQueue<DropCounter> = LFQueue::new(4);
            queue.push(DropCounter).unwrap();
            queue.push(DropCounter).unwrap();
            queue.push(DropCounter).unwrap();
        }
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 3);
    }

    #[test]
    #[should_panic(expected = "Capacity must be a power of 2")]
    fn test_non_power_of_two_panics() {
        let _queue: LFQueue<u32> = LFQueue::new(5);
    }
}
