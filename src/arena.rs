//! Order arena - pre-allocated, cache-line aligned order storage.
//!
//! The arena grabs one contiguous block at engine construction and hands
//! out slots by bumping an index. There is no reclamation: cancelled and
//! filled orders leave their slot behind, and exhaustion surfaces to the
//! caller as an allocation failure rather than a crash. Slot indices stay
//! valid for the arena's lifetime, so the book can link orders by index
//! instead of by pointer.

use std::fmt;

use crate::types::{OrderType, Side};

/// Sentinel value representing a null/invalid index
pub const NULL_IDX: u32 = u32::MAX;

/// Arena slot index - a compressed pointer.
/// Half the width of a real pointer, which doubles how many FIFO links
/// fit in a cache line.
pub type OrderIdx = u32;

/// A single order - exactly 64 bytes (one cache line).
///
/// The `next`/`prev` links thread the order into its price level's FIFO;
/// both are `NULL_IDX` while the order is not resting.
#[repr(C)]
#[repr(align(64))]
#[derive(Clone, Copy)]
pub struct Order {
    /// External order id (monotonically unique in the feed)
    pub order_id: u64,

    /// Originator timestamp, nanoseconds
    pub timestamp: u64,

    /// Price in integer ticks (4 implied decimals for display)
    pub price: u32,

    /// Original quantity
    pub quantity: u32,

    /// Quantity still open; invariant: 0 <= remaining <= quantity
    pub remaining: u32,

    /// Next order at the same price level (toward the tail)
    pub next: OrderIdx,

    /// Previous order at the same price level (toward the head)
    pub prev: OrderIdx,

    pub side: Side,
    pub order_type: OrderType,
}

const _: () = assert!(
    std::mem::size_of::<Order>() == 64,
    "Order must be exactly 64 bytes (one cache line)"
);

const _: () = assert!(
    std::mem::align_of::<Order>() == 64,
    "Order must be 64-byte aligned"
);

impl Order {
    /// Create a new order with the given attributes; `remaining` starts
    /// at the full quantity and the FIFO links start null.
    #[inline]
    pub fn new(
        order_id: u64,
        timestamp: u64,
        price: u32,
        quantity: u32,
        side: Side,
        order_type: OrderType,
    ) -> Self {
        Self {
            order_id,
            timestamp,
            price,
            quantity,
            remaining: quantity,
            next: NULL_IDX,
            prev: NULL_IDX,
            side,
            order_type,
        }
    }

    /// An uninitialized slot
    #[inline]
    pub const fn empty() -> Self {
        Self {
            order_id: 0,
            timestamp: 0,
            price: 0,
            quantity: 0,
            remaining: 0,
            next: NULL_IDX,
            prev: NULL_IDX,
            side: Side::Buy,
            order_type: OrderType::Limit,
        }
    }

    /// True once the order has been fully consumed by matching
    #[inline]
    pub const fn is_filled(&self) -> bool {
        self.remaining == 0
    }
}

impl fmt::Debug for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Order")
            .field("order_id", &self.order_id)
            .field("side", &self.side)
            .field("price", &self.price)
            .field("quantity", &self.quantity)
            .field("remaining", &self.remaining)
            .field("prev", &self.prev)
            .field("next", &self.next)
            .finish()
    }
}

/// Pre-allocated order pool with bump allocation.
///
/// `alloc` is O(1) and never touches the system allocator after
/// construction. Slots are write-once: there is no free list, so the
/// arena must be sized for the whole session.
pub struct Arena {
    /// Contiguous block of pre-allocated slots
    slots: Vec<Order>,

    /// Next slot to hand out
    next: u32,

    /// Total capacity
    capacity: u32,
}

impl Arena {
    /// Create an arena holding `capacity` orders.
    ///
    /// # Panics
    /// Panics if capacity equals `NULL_IDX` (reserved as the null link).
    pub fn new(capacity: u32) -> Self {
        assert!(capacity < NULL_IDX, "capacity must be less than NULL_IDX");

        Self {
            slots: vec![Order::empty(); capacity as usize],
            next: 0,
            capacity,
        }
    }

    /// Take the next slot, or `None` once the arena is exhausted.
    ///
    /// # Complexity
    /// O(1) - index bump
    #[inline]
    pub fn alloc(&mut self) -> Option<OrderIdx> {
        if self.next >= self.capacity {
            return None;
        }

        let idx = self.next;
        self.next += 1;
        Some(idx)
    }

    /// Get an immutable reference to a slot.
    #[inline]
    pub fn get(&self, idx: OrderIdx) -> &Order {
        debug_assert!(idx < self.next, "index past allocation watermark");
        &self.slots[idx as usize]
    }

    /// Get a mutable reference to a slot.
    #[inline]
    pub fn get_mut(&mut self, idx: OrderIdx) -> &mut Order {
        debug_assert!(idx < self.next, "index past allocation watermark");
        &mut self.slots[idx as usize]
    }

    /// Number of slots handed out so far.
    #[inline]
    pub fn allocated(&self) -> u32 {
        self.next
    }

    /// Total capacity of the arena.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// True once every slot has been handed out.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.next >= self.capacity
    }

    /// Pre-fault all pages backing the arena.
    ///
    /// Touches every slot so the OS maps physical memory up front instead
    /// of page-faulting in the matching path.
    pub fn warm_up(&mut self) {
        for slot in &mut self.slots {
            unsafe {
                std::ptr::write_volatile(&mut slot.remaining, 0);
            }
        }
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("capacity", &self.capacity)
            .field("allocated", &self.next)
            .finish()
    }
}
