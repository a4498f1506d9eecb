//! Order book - per-symbol price-time-priority book.
//!
//! Each side is an ordered map from price to its level, with the best
//! price cached so the matching walk starts in O(1). The caches are
//! repaired inside the same operation that mutates the tree: an outside
//! observer always sees a consistent (tree, cache) pair, and no empty
//! level survives past the call that emptied it.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::arena::{Arena, OrderIdx, NULL_IDX};
use crate::price_level::PriceLevel;
use crate::types::{ExecutionReport, OrderType, Side};

/// One symbol's limit order book.
pub struct OrderBook {
    /// Bid levels, best = highest price
    bids: BTreeMap<u32, PriceLevel>,
    /// Ask levels, best = lowest price
    asks: BTreeMap<u32, PriceLevel>,
    /// Cached best bid price
    best_bid: Option<u32>,
    /// Cached best ask price
    best_ask: Option<u32>,
    /// Order lookup spanning both sides: external id -> arena slot
    orders: FxHashMap<u64, OrderIdx>,
    /// Monotonic per-book match id; each execution pair consumes one
    match_id: u64,
}

impl OrderBook {
    /// Create a new empty book
    pub fn new() -> Self {
        Self {
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            best_bid: None,
            best_ask: None,
            orders: FxHashMap::default(),
            match_id: 0,
        }
    }

    /// Create a book with the order index pre-sized
    pub fn with_capacity(orders: usize) -> Self {
        Self {
            orders: FxHashMap::with_capacity_and_hasher(orders, Default::default()),
            ..Self::new()
        }
    }

    // ========================================================================
    // Best Price Access
    // ========================================================================

    /// Highest resting buy price
    #[inline]
    pub fn best_bid(&self) -> Option<u32> {
        self.best_bid
    }

    /// Lowest resting sell price
    #[inline]
    pub fn best_ask(&self) -> Option<u32> {
        self.best_ask
    }

    /// Best price on the given side
    #[inline]
    pub fn best_price(&self, side: Side) -> Option<u32> {
        match side {
            Side::Buy => self.best_bid,
            Side::Sell => self.best_ask,
        }
    }

    /// `best_ask - best_bid` when both sides are populated
    #[inline]
    pub fn spread(&self) -> Option<u32> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) if ask > bid => Some(ask - bid),
            _ => None,
        }
    }

    // ========================================================================
    // Order Management
    // ========================================================================

    /// Rest an order on the book without attempting to match.
    ///
    /// Finds or creates the level on the order's side, appends at the
    /// tail, registers the id, and promotes the best cache if the new
    /// price beats it.
    pub fn add(&mut self, arena: &mut Arena, idx: OrderIdx) {
        let (order_id, side, price) = {
            let order = arena.get(idx);
            (order.order_id, order.side, order.price)
        };
        debug_assert!(
            !self.orders.contains_key(&order_id),
            "duplicate order id rested on book"
        );

        self.levels_mut(side)
            .entry(price)
            .or_insert_with(|| PriceLevel::new(price))
            .append(arena, idx);
        self.orders.insert(order_id, idx);

        match side {
            Side::Buy => {
                if self.best_bid.map_or(true, |best| price > best) {
                    self.best_bid = Some(price);
                }
            }
            Side::Sell => {
                if self.best_ask.map_or(true, |best| price < best) {
                    self.best_ask = Some(price);
                }
            }
        }
    }

    /// Cancel a resting order. Unknown ids are a silent no-op: feeds
    /// routinely reference orders this book never saw.
    pub fn cancel(&mut self, arena: &mut Arena, order_id: u64) {
        let Some(idx) = self.orders.remove(&order_id) else {
            return;
        };
        let (side, price) = {
            let order = arena.get(idx);
            (order.side, order.price)
        };

        if let Some(level) = self.levels_mut(side).get_mut(&price) {
            if level.detach(arena, idx) {
                self.remove_level(side, price);
            }
        }
    }

    /// Adjust a resting order's remaining quantity in place, keeping its
    /// position in the level FIFO. Quantity-only: the caller models a
    /// price change as cancel + add. Unknown ids are a silent no-op.
    pub fn modify(&mut self, arena: &mut Arena, order_id: u64, new_remaining: u32) {
        debug_assert!(new_remaining > 0, "zero-quantity modify must cancel instead");
        let Some(&idx) = self.orders.get(&order_id) else {
            return;
        };

        let (side, price, old_remaining) = {
            let order = arena.get(idx);
            (order.side, order.price, order.remaining)
        };

        let order = arena.get_mut(idx);
        order.remaining = new_remaining;
        order.quantity = order.quantity.max(new_remaining);

        if let Some(level) = self.levels_mut(side).get_mut(&price) {
            if new_remaining >= old_remaining {
                level.extend(new_remaining - old_remaining);
            } else {
                level.reduce(old_remaining - new_remaining);
            }
        }
    }

    // ========================================================================
    // Matching
    // ========================================================================

    /// Match an aggressor against the contra side in price-then-time
    /// order, producing one report per execution pair.
    ///
    /// The walk starts at the contra best and continues level by level
    /// while the aggressor still crosses and has quantity open. Trades
    /// print at the passive price. Fully-filled passive orders are
    /// unlinked and dropped from the index as they are consumed; a level
    /// that empties is removed and the best cache repaired before the
    /// walk advances.
    pub fn match_order(&mut self, arena: &mut Arena, agg_idx: OrderIdx) -> Vec<ExecutionReport> {
        let (agg_id, agg_ts, agg_price, agg_side, agg_type) = {
            let agg = arena.get(agg_idx);
            (
                agg.order_id,
                agg.timestamp,
                agg.price,
                agg.side,
                agg.order_type,
            )
        };

        let mut reports = Vec::new();
        if !matches!(agg_type, OrderType::Limit | OrderType::Market) {
            return reports;
        }

        let contra = agg_side.opposite();

        while arena.get(agg_idx).remaining > 0 {
            let Some(level_price) = self.best_price(contra) else {
                break;
            };

            // Cross test: market orders always cross, limits only while
            // the contra best is inside their limit.
            if agg_type == OrderType::Limit {
                let crosses = match agg_side {
                    Side::Buy => agg_price >= level_price,
                    Side::Sell => agg_price <= level_price,
                };
                if !crosses {
                    break;
                }
            }

            let Some(mut passive) = self.levels(contra).get(&level_price).map(|l| l.head) else {
                break;
            };

            // Fill loop within the level, head first.
            while passive != NULL_IDX && arena.get(agg_idx).remaining > 0 {
                let agg_remaining = arena.get(agg_idx).remaining;
                let (passive_id, passive_remaining, next_passive) = {
                    let p = arena.get(passive);
                    (p.order_id, p.remaining, p.next)
                };

                let qty = agg_remaining.min(passive_remaining);
                self.match_id += 1;
                reports.push(ExecutionReport {
                    order_id: agg_id,
                    match_id: self.match_id,
                    timestamp: agg_ts,
                    price: level_price,
                    executed_quantity: qty,
                    side: agg_side,
                    is_full_fill: agg_remaining == qty,
                });

                arena.get_mut(agg_idx).remaining -= qty;
                arena.get_mut(passive).remaining -= qty;

                let passive_filled = passive_remaining == qty;
                {
                    let Some(level) = self.levels_mut(contra).get_mut(&level_price) else {
                        break;
                    };
                    level.reduce(qty);
                    if passive_filled {
                        level.detach(arena, passive);
                    }
                }

                if passive_filled {
                    self.orders.remove(&passive_id);
                    passive = next_passive;
                } else {
                    // Partial fill of the passive: the aggressor is done.
                    break;
                }
            }

            // Level advance: only when the level was fully consumed.
            let emptied = self
                .levels(contra)
                .get(&level_price)
                .map_or(false, |l| l.is_empty());
            if emptied {
                self.remove_level(contra, level_price);
            } else {
                break;
            }
        }

        reports
    }

    // ========================================================================
    // Level Maintenance
    // ========================================================================

    #[inline]
    fn levels(&self, side: Side) -> &BTreeMap<u32, PriceLevel> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    #[inline]
    fn levels_mut(&mut self, side: Side) -> &mut BTreeMap<u32, PriceLevel> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    /// Drop a level from its tree and repair the best cache in the same
    /// step when the removed price was the cached best.
    fn remove_level(&mut self, side: Side, price: u32) {
        match side {
            Side::Buy => {
                self.bids.remove(&price);
                if self.best_bid == Some(price) {
                    self.best_bid = self.bids.keys().next_back().copied();
                }
            }
            Side::Sell => {
                self.asks.remove(&price);
                if self.best_ask == Some(price) {
                    self.best_ask = self.asks.keys().next().copied();
                }
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Level at an exact price, if populated
    #[inline]
    pub fn level(&self, side: Side, price: u32) -> Option<&PriceLevel> {
        self.levels(side).get(&price)
    }

    /// (total volume, order count) at an exact price
    pub fn depth_at(&self, side: Side, price: u32) -> (u64, u32) {
        self.level(side, price)
            .map(|l| (l.total_volume, l.order_count))
            .unwrap_or((0, 0))
    }

    /// Arena slot of a resting order
    #[inline]
    pub fn order_idx(&self, order_id: u64) -> Option<OrderIdx> {
        self.orders.get(&order_id).copied()
    }

    /// True while the order rests on this book
    #[inline]
    pub fn contains_order(&self, order_id: u64) -> bool {
        self.orders.contains_key(&order_id)
    }

    /// Number of resting orders across both sides
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Number of execution pairs this book has produced
    #[inline]
    pub fn match_count(&self) -> u64 {
        self.match_id
    }

    /// Sum of resting volume across all bid levels
    pub fn total_bid_volume(&self) -> u64 {
        self.bids.values().map(|l| l.total_volume).sum()
    }

    /// Sum of resting volume across all ask levels
    pub fn total_ask_volume(&self) -> u64 {
        self.asks.values().map(|l| l.total_volume).sum()
    }

    /// Number of populated bid levels
    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    /// Number of populated ask levels
    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    /// True when nothing rests on either side
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook")
            .field("best_bid", &self.best_bid)
            .field("best_ask", &self.best_ask)
            .field("bid_levels", &self.bids.len())
            .field("ask_levels", &self.asks.len())
            .field("order_count", &self.orders.len())
            .field("match_id", &self.match_id)
            .finish()
    }
}
