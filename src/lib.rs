//! # Matchbook
//!
//! A multi-symbol limit-order-book matching engine with price-time
//! priority and a framed-feed replay harness.
//!
//! ## Design Principles
//!
//! - **Single-Writer**: one thread owns the arena and every book (no locks)
//! - **Pre-Allocated**: order storage is a bump arena sized at startup;
//!   the matching path never touches the system allocator
//! - **Cache-Conscious**: 64-byte order slots, 32-bit indices instead of
//!   pointers
//! - **Lossy Reporting**: execution reports cross to the reporter thread
//!   through a bounded SPSC ring; the book stays authoritative when the
//!   consumer falls behind
//!
//! ## Architecture
//!
//! ```text
//! [Feed Decoder] --> [Engine (pinned thread)] --> [SPSC Ring] --> [Reporter]
//!                        |
//!                 [Book per symbol]
//! ```

pub mod arena;
pub mod engine;
pub mod feed;
pub mod order_book;
pub mod price_level;
pub mod ring;
pub mod stats;
pub mod types;

// Re-exports for convenience
pub use arena::{Arena, Order, OrderIdx, NULL_IDX};
pub use engine::{Engine, EngineConfig, EngineError};
pub use feed::{FeedError, FeedHandler, ReplayStats};
pub use order_book::OrderBook;
pub use price_level::PriceLevel;
pub use ring::{channel, Consumer, Producer};
pub use stats::{format_duration, format_price, timestamp_ns, LatencySummary};
pub use types::{ExecutionReport, OrderType, Side, Symbol};
