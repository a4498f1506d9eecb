//! CLI harness: replay a framed feed capture, or run a synthetic
//! benchmark of one million alternating orders when no feed is given.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use hdrhistogram::Histogram;

use matchbook::{
    format_duration, format_price, timestamp_ns, Engine, EngineConfig, FeedHandler,
    LatencySummary, OrderBook, OrderType, Side, Symbol,
};

#[derive(Parser)]
#[command(
    name = "matchbook",
    about = "Limit order book matching engine and feed replay harness"
)]
struct Args {
    /// Framed feed capture to replay; omit to run the synthetic benchmark
    feed: Option<PathBuf>,

    /// CPU core to pin the engine thread to
    core: Option<usize>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match args.feed {
        Some(path) => replay(path, args.core),
        None => {
            synthetic_benchmark(args.core);
            ExitCode::SUCCESS
        }
    }
}

fn replay(path: PathBuf, core: Option<usize>) -> ExitCode {
    let (mut engine, _reports) = Engine::new(EngineConfig {
        cpu_core: core,
        ..Default::default()
    });
    engine.start();
    engine.warm_up();

    let stats = match FeedHandler::new(&mut engine).replay_file(&path) {
        Ok(stats) => stats,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    engine.stop();

    println!("\nReplay complete:");
    println!("  Total messages: {}", stats.messages);
    println!("  Elapsed time: {}", format_duration(stats.elapsed_ns));
    println!("  Throughput: {:.2} million msg/s", stats.throughput() / 1e6);
    println!("\nEngine statistics:");
    println!("  Total orders: {}", engine.total_orders());
    println!("  Total matches: {}", engine.total_matches());
    if engine.dropped_orders() > 0 {
        println!("  Dropped orders: {}", engine.dropped_orders());
    }
    ExitCode::SUCCESS
}

fn synthetic_benchmark(core: Option<usize>) {
    const NUM_ORDERS: u64 = 1_000_000;
    println!("No feed file provided, running synthetic benchmark\n");

    let symbol = Symbol::new("AAPL");
    let (mut engine, mut reports) = Engine::new(EngineConfig {
        order_pool_size: NUM_ORDERS as u32,
        cpu_core: core,
        ..Default::default()
    });
    engine.start();
    engine.warm_up();

    let mut histogram = Histogram::<u64>::new_with_bounds(1, 1_000_000_000, 3)
        .expect("histogram bounds are static");

    println!("Submitting {NUM_ORDERS} orders...");
    let start = timestamp_ns();

    for i in 0..NUM_ORDERS {
        // Alternate buy and sell around $100.00 so roughly half the
        // submissions cross.
        let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
        let price = 1_000_000 + (i as u32 % 100) * 100;
        let quantity = 100 + (i as u32 % 900);

        let order_start = timestamp_ns();
        let _ = engine.submit_order(symbol, i, order_start, price, quantity, side, OrderType::Limit);
        let elapsed = timestamp_ns() - order_start;
        histogram.record(elapsed.max(1)).ok();
    }

    let elapsed_ns = timestamp_ns() - start;
    engine.stop();

    let throughput = NUM_ORDERS as f64 * 1e9 / elapsed_ns as f64;
    println!("\n=== Benchmark Results ===");
    println!("Total Orders: {NUM_ORDERS}");
    println!("Elapsed Time: {}", format_duration(elapsed_ns));
    println!("Throughput: {:.2} million orders/sec", throughput / 1e6);
    println!("\nLatency Statistics (ns):");
    println!("{}", LatencySummary::from_histogram(&histogram));
    println!("=========================");

    if let Some(book) = engine.get_book(symbol) {
        print_book_state(book);
    }

    let mut report_count = 0u64;
    while reports.pop().is_some() {
        report_count += 1;
    }
    println!("Total Execution Reports: {report_count}");
    println!("Total Matches: {}", engine.total_matches());
}

fn print_book_state(book: &OrderBook) {
    println!("\n=== Order Book State ===");
    if let Some(ask) = book.best_ask() {
        let (volume, count) = book.depth_at(Side::Sell, ask);
        println!(
            "Best Ask: {} ({volume} shares, {count} orders)",
            format_price(ask)
        );
    }
    if let Some(bid) = book.best_bid() {
        let (volume, count) = book.depth_at(Side::Buy, bid);
        println!(
            "Best Bid: {} ({volume} shares, {count} orders)",
            format_price(bid)
        );
    }
    if let Some(spread) = book.spread() {
        println!("Spread: {}", format_price(spread));
    }
    println!("Resting Orders: {}", book.order_count());
    println!("Total Matches: {}", book.match_count());
    println!("========================");
}
