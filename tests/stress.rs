//! Stress tests: capacity limits, single-level contention, churn, and
//! multi-symbol isolation under load.

use matchbook::{
    Consumer, Engine, EngineConfig, EngineError, ExecutionReport, OrderType, Side, Symbol,
};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn engine(pool: u32) -> (Engine, Consumer<ExecutionReport>) {
    Engine::new(EngineConfig {
        order_pool_size: pool,
        report_queue_capacity: 65_536,
        ..Default::default()
    })
}

fn sym(name: &str) -> Symbol {
    Symbol::new(name)
}

// ============================================================================
// Capacity
// ============================================================================

#[test]
fn near_capacity_operation() {
    const CAPACITY: u32 = 10_000;
    let (mut engine, _rx) = engine(CAPACITY);
    let symbol = sym("CAP");

    // Non-overlapping prices so nothing matches: bids low, asks high.
    for i in 0..CAPACITY as u64 {
        let (side, price) = if i % 2 == 0 {
            (Side::Buy, 80_000 + (i as u32 % 100) * 10)
        } else {
            (Side::Sell, 100_000 + (i as u32 % 100) * 10)
        };
        engine
            .submit_order(symbol, i, i, price, 100, side, OrderType::Limit)
            .expect("arena sized for exactly this workload");
    }

    assert_eq!(engine.total_orders(), CAPACITY as u64);
    assert_eq!(
        engine.get_book(symbol).unwrap().order_count(),
        CAPACITY as usize
    );
}

#[test]
fn exhaustion_counts_every_drop() {
    const CAPACITY: u32 = 100;
    let (mut engine, _rx) = engine(CAPACITY);
    let symbol = sym("CAP");

    for i in 0..CAPACITY as u64 {
        engine
            .submit_order(symbol, i, i, 90_000 + i as u32 * 10, 100, Side::Buy, OrderType::Limit)
            .unwrap();
    }

    for i in 0..250u64 {
        let err = engine
            .submit_order(
                symbol,
                CAPACITY as u64 + i,
                i,
                50_000,
                100,
                Side::Buy,
                OrderType::Limit,
            )
            .unwrap_err();
        assert_eq!(err, EngineError::ArenaExhausted { capacity: CAPACITY });
    }

    assert_eq!(engine.dropped_orders(), 250);
    assert_eq!(engine.total_orders(), CAPACITY as u64);
}

#[test]
fn cancel_does_not_reclaim_slots() {
    // Bump arena: cancelling everything frees book state but not slots.
    const CAPACITY: u32 = 100;
    let (mut engine, _rx) = engine(CAPACITY);
    let symbol = sym("CAP");

    for i in 0..CAPACITY as u64 {
        engine
            .submit_order(symbol, i, i, 90_000, 100, Side::Buy, OrderType::Limit)
            .unwrap();
    }
    for i in 0..CAPACITY as u64 {
        engine.cancel_order(symbol, i);
    }

    assert!(engine.get_book(symbol).unwrap().is_empty());
    assert!(engine
        .submit_order(symbol, 1_000, 0, 90_000, 100, Side::Buy, OrderType::Limit)
        .is_err());
}

// ============================================================================
// Contention
// ============================================================================

#[test]
fn single_level_sweep() {
    const ORDERS: u64 = 1_000;
    let (mut engine, mut rx) = engine(10_000);
    let symbol = sym("HOT");

    for i in 0..ORDERS {
        engine
            .submit_order(symbol, i, i, 100_000, 100, Side::Sell, OrderType::Limit)
            .unwrap();
    }
    assert_eq!(engine.get_book(symbol).unwrap().order_count(), ORDERS as usize);

    engine
        .submit_order(
            symbol,
            ORDERS,
            ORDERS,
            100_000,
            (ORDERS * 100) as u32,
            Side::Buy,
            OrderType::Limit,
        )
        .unwrap();

    let mut count = 0u64;
    let mut last_match_id = 0u64;
    while let Some(report) = rx.pop() {
        count += 1;
        assert!(report.match_id > last_match_id);
        last_match_id = report.match_id;
        assert_eq!(report.executed_quantity, 100);
        assert_eq!(report.price, 100_000);
    }
    assert_eq!(count, ORDERS);
    assert!(engine.get_book(symbol).unwrap().is_empty());
}

#[test]
fn fifo_priority_under_contention() {
    let (mut engine, mut rx) = engine(10_000);
    let symbol = sym("HOT");

    for i in 0..100u64 {
        engine
            .submit_order(symbol, i, i, 100_000, 10, Side::Sell, OrderType::Limit)
            .unwrap();
    }

    // 50 orders' worth: the first 50 arrivals are consumed in full.
    engine
        .submit_order(symbol, 1_000, 1_000, 100_000, 500, Side::Buy, OrderType::Limit)
        .unwrap();

    let mut fills = 0;
    while rx.pop().is_some() {
        fills += 1;
    }
    assert_eq!(fills, 50);

    let book = engine.get_book(symbol).unwrap();
    for i in 0..50u64 {
        assert!(!book.contains_order(i), "order {i} should be consumed");
    }
    for i in 50..100u64 {
        assert!(book.contains_order(i), "order {i} should survive");
    }
}

#[test]
fn many_sparse_price_levels() {
    const LEVELS: u64 = 10_000;
    let (mut engine, _rx) = engine(100_000);
    let symbol = sym("WIDE");

    for i in 0..LEVELS {
        engine
            .submit_order(
                symbol,
                i,
                i,
                (i as u32 + 1) * 100,
                100,
                Side::Buy,
                OrderType::Limit,
            )
            .unwrap();
    }

    let book = engine.get_book(symbol).unwrap();
    assert_eq!(book.order_count(), LEVELS as usize);
    assert_eq!(book.bid_levels(), LEVELS as usize);
    assert_eq!(book.best_bid(), Some(LEVELS as u32 * 100));
}

// ============================================================================
// Churn
// ============================================================================

#[test]
fn rapid_add_cancel_cycles() {
    const CYCLES: u64 = 5_000;
    let (mut engine, _rx) = engine(CYCLES as u32);
    let symbol = sym("CHRN");

    for cycle in 0..CYCLES {
        let side = if cycle % 2 == 0 { Side::Buy } else { Side::Sell };
        let price = if cycle % 2 == 0 { 99_000 } else { 101_000 };
        engine
            .submit_order(symbol, cycle, cycle, price, 100, side, OrderType::Limit)
            .unwrap();
        engine.cancel_order(symbol, cycle);
    }

    let book = engine.get_book(symbol).unwrap();
    assert!(book.is_empty());
    assert_eq!(book.best_bid(), None);
    assert_eq!(book.best_ask(), None);
    assert_eq!(engine.total_orders(), CYCLES);
}

#[test]
fn rapid_match_cycles() {
    const CYCLES: u64 = 5_000;
    let (mut engine, mut rx) = engine((CYCLES * 2) as u32);
    let symbol = sym("CHRN");

    let mut trades = 0u64;
    for cycle in 0..CYCLES {
        engine
            .submit_order(symbol, cycle * 2, cycle, 100_000, 100, Side::Sell, OrderType::Limit)
            .unwrap();
        engine
            .submit_order(
                symbol,
                cycle * 2 + 1,
                cycle,
                100_000,
                100,
                Side::Buy,
                OrderType::Limit,
            )
            .unwrap();
        while rx.pop().is_some() {
            trades += 1;
        }
    }

    assert_eq!(trades, CYCLES);
    assert!(engine.get_book(symbol).unwrap().is_empty());
    assert_eq!(engine.total_matches(), CYCLES);
}

#[test]
fn cancel_after_partial_fill_releases_remainder() {
    let (mut engine, mut rx) = engine(100);
    let symbol = sym("PART");

    engine
        .submit_order(symbol, 1, 1, 100_000, 1_000, Side::Sell, OrderType::Limit)
        .unwrap();
    engine
        .submit_order(symbol, 2, 2, 100_000, 300, Side::Buy, OrderType::Limit)
        .unwrap();

    assert_eq!(rx.pop().unwrap().executed_quantity, 300);
    assert_eq!(
        engine.get_book(symbol).unwrap().depth_at(Side::Sell, 100_000),
        (700, 1)
    );

    engine.cancel_order(symbol, 1);
    assert!(engine.get_book(symbol).unwrap().is_empty());
}

// ============================================================================
// Edge Values
// ============================================================================

#[test]
fn extreme_prices_and_quantities() {
    let (mut engine, _rx) = engine(100);
    let symbol = sym("EDGE");

    engine
        .submit_order(symbol, 1, 1, 0, 100, Side::Buy, OrderType::Limit)
        .unwrap();
    engine
        .submit_order(symbol, 2, 2, u32::MAX, 100, Side::Sell, OrderType::Limit)
        .unwrap();
    engine
        .submit_order(symbol, 3, 3, 50_000, u32::MAX, Side::Buy, OrderType::Limit)
        .unwrap();
    engine
        .submit_order(symbol, 4, 4, 60_000, 1, Side::Sell, OrderType::Limit)
        .unwrap();

    let book = engine.get_book(symbol).unwrap();
    assert_eq!(book.best_bid(), Some(50_000));
    assert_eq!(book.best_ask(), Some(60_000));
    assert_eq!(book.order_count(), 4);
}

// ============================================================================
// Multi-Symbol
// ============================================================================

#[test]
fn many_symbols_stay_isolated() {
    const SYMBOLS: usize = 100;
    const PER_SYMBOL: u64 = 50;
    let (mut engine, mut rx) = engine((SYMBOLS as u32) * (PER_SYMBOL as u32));

    let symbols: Vec<Symbol> = (0..SYMBOLS).map(|i| sym(&format!("S{i:03}"))).collect();

    let mut order_id = 0u64;
    for (i, &symbol) in symbols.iter().enumerate() {
        // Unique, non-crossing price band per symbol.
        let base = 10_000 + (i as u32) * 1_000;
        for j in 0..PER_SYMBOL {
            let (side, price) = if j % 2 == 0 {
                (Side::Buy, base)
            } else {
                (Side::Sell, base + 500)
            };
            engine
                .submit_order(symbol, order_id, order_id, price, 100, side, OrderType::Limit)
                .unwrap();
            order_id += 1;
        }
    }

    assert!(rx.pop().is_none(), "no cross-symbol matches");
    for (i, &symbol) in symbols.iter().enumerate() {
        let base = 10_000 + (i as u32) * 1_000;
        let book = engine.get_book(symbol).unwrap();
        assert_eq!(book.order_count(), PER_SYMBOL as usize);
        assert_eq!(book.best_bid(), Some(base));
        assert_eq!(book.best_ask(), Some(base + 500));
    }
}

#[test]
fn random_workload_respects_global_invariants() {
    const SEED: u64 = 0xABCD_EF12_3456;
    const OPS: usize = 50_000;

    let mut rng = ChaCha8Rng::seed_from_u64(SEED);
    let (mut engine, mut rx) = engine(100_000);
    let symbols = [sym("AAA"), sym("BBB"), sym("CCC")];

    let mut next_order_id = 1u64;
    let mut active: Vec<(Symbol, u64)> = Vec::new();
    let mut executed = 0u64;

    for _ in 0..OPS {
        let roll = rng.gen_range(0..100);
        if active.is_empty() || roll < 60 {
            let symbol = symbols[rng.gen_range(0..symbols.len())];
            let order_id = next_order_id;
            next_order_id += 1;
            let side = if rng.gen_bool(0.5) {
                Side::Buy
            } else {
                Side::Sell
            };
            engine
                .submit_order(
                    symbol,
                    order_id,
                    order_id,
                    rng.gen_range(9_000..11_000) * 100,
                    rng.gen_range(1..500),
                    side,
                    OrderType::Limit,
                )
                .unwrap();
            active.push((symbol, order_id));
        } else if roll < 90 {
            let idx = rng.gen_range(0..active.len());
            let (symbol, order_id) = active.swap_remove(idx);
            engine.cancel_order(symbol, order_id);
        } else {
            let idx = rng.gen_range(0..active.len());
            let (symbol, order_id) = active[idx];
            engine.modify_order(symbol, order_id, rng.gen_range(1..500));
        }

        while let Some(report) = rx.pop() {
            executed += report.executed_quantity as u64;
        }
    }

    // Per-book invariants after the storm.
    for &symbol in &symbols {
        let book = engine.get_book(symbol).unwrap();
        if let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) {
            assert!(bid < ask, "{symbol}: resting book crossed");
        }
    }
    assert!(executed > 0, "workload should have produced matches");
    assert_eq!(engine.dropped_orders(), 0);
}
