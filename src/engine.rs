//! Engine - multi-symbol front end over the per-symbol books.
//!
//! Owns the order arena and every book, classifies incoming orders as
//! aggressive or passive, and publishes execution reports through the
//! SPSC ring. All mutations happen on one designated thread (typically
//! pinned); the ring is the only cross-thread boundary.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::arena::{Arena, Order};
use crate::order_book::OrderBook;
use crate::ring::{self, Consumer, Producer};
use crate::types::{ExecutionReport, OrderType, Side, Symbol};

/// Engine construction knobs.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Arena capacity: the total number of orders one session may submit
    pub order_pool_size: u32,
    /// Execution report ring capacity; must be a power of two
    pub report_queue_capacity: usize,
    /// CPU core to pin the engine thread to
    pub cpu_core: Option<usize>,
    /// NUMA node preference; binding is delegated to deployment tooling
    pub numa_node: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            order_pool_size: 1_000_000,
            report_queue_capacity: 65_536,
            cpu_core: None,
            numa_node: None,
        }
    }
}

/// Errors surfaced by order submission.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The arena has handed out every slot; the submit was dropped.
    #[error("order arena exhausted (capacity {capacity})")]
    ArenaExhausted { capacity: u32 },
}

/// Pin the calling thread to a CPU core by index.
pub fn pin_to_core(core: usize) -> bool {
    core_affinity::get_core_ids()
        .and_then(|ids| ids.into_iter().find(|c| c.id == core))
        .map(core_affinity::set_for_current)
        .unwrap_or(false)
}

/// The matching engine: per-symbol books, one arena, one report ring.
pub struct Engine {
    config: EngineConfig,
    arena: Arena,
    /// Books in creation order; stable indices for the routing maps
    books: Vec<OrderBook>,
    /// symbol -> index into `books`, created lazily on first use
    symbols: FxHashMap<Symbol, u32>,
    /// order id -> index into `books`, so cancels that arrive without a
    /// symbol can still find the right book
    routes: FxHashMap<u64, u32>,
    /// Producer half of the execution report ring
    reports: Producer<ExecutionReport>,
    total_orders: AtomicU64,
    total_matches: AtomicU64,
    /// Submits dropped to arena exhaustion
    dropped_orders: u64,
    ring_full_warned: bool,
    running: AtomicBool,
}

impl Engine {
    /// Create an engine and hand back the consumer half of its report
    /// ring for the reporter thread.
    pub fn new(config: EngineConfig) -> (Self, Consumer<ExecutionReport>) {
        if let Some(core) = config.cpu_core {
            if pin_to_core(core) {
                info!(core, "pinned engine thread");
            } else {
                warn!(core, "failed to pin engine thread");
            }
        }
        if let Some(node) = config.numa_node {
            info!(node, "NUMA node requested; bind memory via numactl or cpuset");
        }

        let (tx, rx) = ring::channel(config.report_queue_capacity);
        let arena = Arena::new(config.order_pool_size);
        info!(
            order_pool_size = config.order_pool_size,
            report_queue_capacity = config.report_queue_capacity,
            "matching engine initialized"
        );

        (
            Self {
                config,
                arena,
                books: Vec::new(),
                symbols: FxHashMap::default(),
                routes: FxHashMap::default(),
                reports: tx,
                total_orders: AtomicU64::new(0),
                total_matches: AtomicU64::new(0),
                dropped_orders: 0,
                ring_full_warned: false,
                running: AtomicBool::new(false),
            },
            rx,
        )
    }

    // ========================================================================
    // Order Submission
    // ========================================================================

    /// Submit an order for a symbol.
    ///
    /// Looks up or creates the book, takes an arena slot (exhaustion is a
    /// counted drop, returned as an error), matches when the order is
    /// aggressive, publishes the resulting reports, and rests any limit
    /// residual.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_order(
        &mut self,
        symbol: Symbol,
        order_id: u64,
        timestamp: u64,
        price: u32,
        quantity: u32,
        side: Side,
        order_type: OrderType,
    ) -> Result<(), EngineError> {
        let book_idx = self.book_index(symbol);
        self.submit_to_book(book_idx, order_id, timestamp, price, quantity, side, order_type)
    }

    #[allow(clippy::too_many_arguments)]
    fn submit_to_book(
        &mut self,
        book_idx: u32,
        order_id: u64,
        timestamp: u64,
        price: u32,
        quantity: u32,
        side: Side,
        order_type: OrderType,
    ) -> Result<(), EngineError> {
        let Self {
            arena,
            books,
            routes,
            reports,
            total_orders,
            total_matches,
            dropped_orders,
            ring_full_warned,
            ..
        } = self;
        let book = &mut books[book_idx as usize];

        let Some(slot) = arena.alloc() else {
            if *dropped_orders % 100_000 == 0 {
                error!(
                    order_id,
                    dropped = *dropped_orders + 1,
                    "order arena exhausted; dropping submit"
                );
            }
            *dropped_orders += 1;
            return Err(EngineError::ArenaExhausted {
                capacity: arena.capacity(),
            });
        };
        *arena.get_mut(slot) = Order::new(order_id, timestamp, price, quantity, side, order_type);

        // Aggressor test: market orders always, limits only when they
        // cross the contra best on arrival.
        let aggressive = match order_type {
            OrderType::Market => true,
            OrderType::Limit => match side {
                Side::Buy => book.best_ask().map_or(false, |ask| price >= ask),
                Side::Sell => book.best_bid().map_or(false, |bid| price <= bid),
            },
            OrderType::Cancel => false,
        };

        if aggressive {
            for report in book.match_order(arena, slot) {
                if !reports.push(report) {
                    // Reports are lossy under backpressure; the book
                    // stays authoritative.
                    if !*ring_full_warned {
                        warn!("execution report ring full; dropping reports");
                        *ring_full_warned = true;
                    }
                    break;
                }
                total_matches.fetch_add(1, Ordering::Relaxed);
            }
        }

        if order_type == OrderType::Limit && arena.get(slot).remaining > 0 {
            book.add(arena, slot);
            routes.insert(order_id, book_idx);
        }
        // Market residuals and fully-filled limits are abandoned; the
        // slot stays behind (write-once arena).

        total_orders.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    // ========================================================================
    // Cancel / Modify
    // ========================================================================

    /// Cancel a resting order. Unknown symbols or ids are silent no-ops.
    pub fn cancel_order(&mut self, symbol: Symbol, order_id: u64) {
        let Some(&book_idx) = self.symbols.get(&symbol) else {
            return;
        };
        self.books[book_idx as usize].cancel(&mut self.arena, order_id);
        self.routes.remove(&order_id);
    }

    /// Set a resting order's remaining quantity in place, keeping its
    /// time priority. A zero quantity degrades to a full cancel.
    pub fn modify_order(&mut self, symbol: Symbol, order_id: u64, new_quantity: u32) {
        if new_quantity == 0 {
            self.cancel_order(symbol, order_id);
            return;
        }
        let Some(&book_idx) = self.symbols.get(&symbol) else {
            return;
        };
        self.books[book_idx as usize].modify(&mut self.arena, order_id, new_quantity);
    }

    /// Cancel by order id alone, for feeds whose delete messages carry no
    /// symbol. Silent no-op when the id was never rested here.
    pub fn cancel_order_by_id(&mut self, order_id: u64) {
        let Some(book_idx) = self.routes.remove(&order_id) else {
            return;
        };
        self.books[book_idx as usize].cancel(&mut self.arena, order_id);
    }

    /// Reduce a resting order by `cancelled` shares (partial cancel). A
    /// reduction to or past zero becomes a full cancel.
    pub fn reduce_order_by_id(&mut self, order_id: u64, cancelled: u32) {
        let Some(&book_idx) = self.routes.get(&order_id) else {
            return;
        };
        let book = &mut self.books[book_idx as usize];
        let Some(idx) = book.order_idx(order_id) else {
            // Filled since it was rested; drop the stale route.
            self.routes.remove(&order_id);
            return;
        };

        let remaining = self.arena.get(idx).remaining;
        if remaining > cancelled {
            book.modify(&mut self.arena, order_id, remaining - cancelled);
        } else {
            book.cancel(&mut self.arena, order_id);
            self.routes.remove(&order_id);
        }
    }

    /// Replace a resting order: delete the original and submit the new
    /// id at the new price/quantity on the same book and side, with new
    /// time priority.
    pub fn replace_order(
        &mut self,
        orig_order_id: u64,
        new_order_id: u64,
        timestamp: u64,
        price: u32,
        quantity: u32,
    ) -> Result<(), EngineError> {
        let Some(&book_idx) = self.routes.get(&orig_order_id) else {
            return Ok(());
        };
        let Some(idx) = self.books[book_idx as usize].order_idx(orig_order_id) else {
            self.routes.remove(&orig_order_id);
            return Ok(());
        };

        let side = self.arena.get(idx).side;
        self.books[book_idx as usize].cancel(&mut self.arena, orig_order_id);
        self.routes.remove(&orig_order_id);

        self.submit_to_book(
            book_idx,
            new_order_id,
            timestamp,
            price,
            quantity,
            side,
            OrderType::Limit,
        )
    }

    // ========================================================================
    // Book Access / Statistics
    // ========================================================================

    /// The book for a symbol, if one was ever created.
    pub fn get_book(&self, symbol: Symbol) -> Option<&OrderBook> {
        self.symbols
            .get(&symbol)
            .map(|&idx| &self.books[idx as usize])
    }

    /// Total orders accepted (submits that reached a book).
    #[inline]
    pub fn total_orders(&self) -> u64 {
        self.total_orders.load(Ordering::Relaxed)
    }

    /// Total execution reports published.
    #[inline]
    pub fn total_matches(&self) -> u64 {
        self.total_matches.load(Ordering::Relaxed)
    }

    /// Submits dropped to arena exhaustion.
    #[inline]
    pub fn dropped_orders(&self) -> u64 {
        self.dropped_orders
    }

    /// Arena slots handed out so far.
    #[inline]
    pub fn arena_allocated(&self) -> u32 {
        self.arena.allocated()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Flip the running flag; the caller drives submission.
    pub fn start(&self) {
        self.running.store(true, Ordering::Release);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Pre-fault the arena pages before the first submit.
    pub fn warm_up(&mut self) {
        self.arena.warm_up();
    }

    /// Hash of the externally observable state, for determinism checks.
    pub fn state_hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        for book in &self.books {
            book.best_bid().hash(&mut hasher);
            book.best_ask().hash(&mut hasher);
            book.order_count().hash(&mut hasher);
            book.match_count().hash(&mut hasher);
        }
        self.arena.allocated().hash(&mut hasher);
        self.total_orders().hash(&mut hasher);
        self.total_matches().hash(&mut hasher);
        hasher.finish()
    }

    fn book_index(&mut self, symbol: Symbol) -> u32 {
        if let Some(&idx) = self.symbols.get(&symbol) {
            return idx;
        }
        let idx = self.books.len() as u32;
        self.books
            .push(OrderBook::with_capacity(self.config.order_pool_size as usize / 16));
        self.symbols.insert(symbol, idx);
        idx
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("symbols", &self.symbols.len())
            .field("arena", &self.arena)
            .field("total_orders", &self.total_orders())
            .field("total_matches", &self.total_matches())
            .field("dropped_orders", &self.dropped_orders)
            .finish()
    }
}
