//! Price level - a FIFO queue of orders at a single price.
//!
//! Implements a doubly-linked list threaded through the order arena for
//! O(1) append at the tail and O(1) detach from any position. Ordering
//! within a level is strict arrival order; the level knows nothing about
//! the book's tree.

use crate::arena::{Arena, OrderIdx, NULL_IDX};

/// All resting orders at one exact price on one side.
///
/// Invariants: `total_volume` equals the sum of the members' remaining
/// quantities and `order_count` equals the list length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PriceLevel {
    /// Price of every order in this level, in ticks
    pub price: u32,
    /// Oldest order (highest priority, first to match)
    pub head: OrderIdx,
    /// Newest order (last to match)
    pub tail: OrderIdx,
    /// Sum of remaining quantity across members
    pub total_volume: u64,
    /// Number of members
    pub order_count: u32,
}

impl PriceLevel {
    /// Create an empty level at the given price
    #[inline]
    pub const fn new(price: u32) -> Self {
        Self {
            price,
            head: NULL_IDX,
            tail: NULL_IDX,
            total_volume: 0,
            order_count: 0,
        }
    }

    /// True when the level holds no orders
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.order_count == 0
    }

    /// Splice an order onto the tail of the queue.
    ///
    /// The order must carry this level's price and must not currently be
    /// linked into any level.
    ///
    /// # Complexity
    /// O(1)
    #[inline]
    pub fn append(&mut self, arena: &mut Arena, idx: OrderIdx) {
        let order = arena.get(idx);
        debug_assert_eq!(order.price, self.price, "order price must match level");
        debug_assert!(
            order.next == NULL_IDX && order.prev == NULL_IDX,
            "order is already linked"
        );
        let qty = order.remaining;

        if self.tail == NULL_IDX {
            debug_assert!(self.head == NULL_IDX);
            self.head = idx;
            self.tail = idx;
        } else {
            arena.get_mut(self.tail).next = idx;
            arena.get_mut(idx).prev = self.tail;
            self.tail = idx;
        }

        self.order_count += 1;
        self.total_volume += qty as u64;
    }

    /// Unlink an order from anywhere in the queue, clearing its links.
    ///
    /// Handles head, tail, middle, and only-member positions. The slot is
    /// not returned to the arena (the arena has no reclamation).
    ///
    /// # Returns
    /// `true` if the level is now empty.
    ///
    /// # Complexity
    /// O(1)
    #[inline]
    pub fn detach(&mut self, arena: &mut Arena, idx: OrderIdx) -> bool {
        let order = arena.get(idx);
        let prev = order.prev;
        let next = order.next;
        let qty = order.remaining;

        debug_assert!(self.order_count > 0, "detach from empty level");
        debug_assert!(self.total_volume >= qty as u64, "volume underflow");

        if prev == NULL_IDX {
            debug_assert_eq!(self.head, idx, "headless order claims head position");
            self.head = next;
        } else {
            arena.get_mut(prev).next = next;
        }

        if next == NULL_IDX {
            debug_assert_eq!(self.tail, idx, "tailless order claims tail position");
            self.tail = prev;
        } else {
            arena.get_mut(next).prev = prev;
        }

        self.order_count -= 1;
        self.total_volume -= qty as u64;

        let order = arena.get_mut(idx);
        order.prev = NULL_IDX;
        order.next = NULL_IDX;

        self.order_count == 0
    }

    /// Account for an in-place fill or quantity reduction of a member.
    #[inline]
    pub fn reduce(&mut self, qty: u32) {
        debug_assert!(self.total_volume >= qty as u64, "volume underflow");
        self.total_volume -= qty as u64;
    }

    /// Account for an in-place quantity increase of a member.
    #[inline]
    pub fn extend(&mut self, qty: u32) {
        self.total_volume += qty as u64;
    }
}
