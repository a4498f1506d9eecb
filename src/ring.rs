//! Lock-free SPSC ring - bounded hand-off of execution reports.
//!
//! One producer (the engine thread), one consumer (the reporter). The
//! ring is the only shared-memory boundary in the system: the producer
//! publishes with Release, the consumer reads the opposite cursor with
//! Acquire, and neither side ever blocks, locks, or retries. Items are
//! copied by value.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

struct Shared<T> {
    /// Producer cursor: next slot to write
    head: CachePadded<AtomicUsize>,
    /// Consumer cursor: next slot to read
    tail: CachePadded<AtomicUsize>,
    mask: usize,
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

// The cursors are the synchronization protocol: a slot is only written
// between head-claim and head-publish, and only read between tail-claim
// and tail-publish, so the two sides never touch the same slot at once.
unsafe impl<T: Send> Send for Shared<T> {}
unsafe impl<T: Send> Sync for Shared<T> {}

/// Create a ring with the given capacity and split it into halves.
///
/// One slot is sacrificed to distinguish full from empty, so a ring of
/// capacity `n` holds at most `n - 1` items.
///
/// # Panics
/// Panics if `capacity` is not a power of two.
pub fn channel<T: Copy>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    assert!(
        capacity.is_power_of_two() && capacity > 1,
        "ring capacity must be a power of two"
    );

    let buffer = (0..capacity)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect::<Vec<_>>()
        .into_boxed_slice();

    let shared = Arc::new(Shared {
        head: CachePadded::new(AtomicUsize::new(0)),
        tail: CachePadded::new(AtomicUsize::new(0)),
        mask: capacity - 1,
        buffer,
    });

    (
        Producer {
            shared: Arc::clone(&shared),
        },
        Consumer { shared },
    )
}

/// Producer half of the ring. Single-threaded by construction: it is not
/// `Clone`, so only one thread can ever hold it.
pub struct Producer<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Copy> Producer<T> {
    /// Push an item; returns `false` when the ring is full.
    #[inline]
    pub fn push(&mut self, item: T) -> bool {
        let head = self.shared.head.load(Ordering::Relaxed);
        let next = (head + 1) & self.shared.mask;

        if next == self.shared.tail.load(Ordering::Acquire) {
            return false;
        }

        unsafe {
            (*self.shared.buffer[head].get()).write(item);
        }
        self.shared.head.store(next, Ordering::Release);
        true
    }
}

/// Consumer half of the ring.
pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Copy> Consumer<T> {
    /// Pop the oldest item; returns `None` when the ring is empty.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        let tail = self.shared.tail.load(Ordering::Relaxed);

        if tail == self.shared.head.load(Ordering::Acquire) {
            return None;
        }

        let item = unsafe { (*self.shared.buffer[tail].get()).assume_init() };
        self.shared
            .tail
            .store((tail + 1) & self.shared.mask, Ordering::Release);
        Some(item)
    }

    /// True when there is nothing to pop.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shared.tail.load(Ordering::Acquire) == self.shared.head.load(Ordering::Acquire)
    }

    /// Number of items currently buffered.
    pub fn len(&self) -> usize {
        let head = self.shared.head.load(Ordering::Acquire);
        let tail = self.shared.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail) & self.shared.mask
    }
}
