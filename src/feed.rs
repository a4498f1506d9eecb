//! Feed handler - framed binary market data replay.
//!
//! Each frame is a 2-byte big-endian length, a 1-byte message tag, then
//! `length - 1` payload bytes. Integer fields are big-endian on the wire.
//! Unknown tags are skipped via the length framing; a truncated frame
//! stops the replay with the count consumed so far. The engine's matching
//! behavior never depends on this layout: any decoder producing
//! well-formed submit/cancel/modify calls is equivalent.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::engine::Engine;
use crate::stats::timestamp_ns;
use crate::types::{OrderType, Side, Symbol};

/// Add order
pub const TAG_ADD_ORDER: u8 = b'A';
/// Partial cancel (reduces shares)
pub const TAG_ORDER_CANCEL: u8 = b'X';
/// Full delete
pub const TAG_ORDER_DELETE: u8 = b'D';
/// Replace: delete + add under a new reference
pub const TAG_ORDER_REPLACE: u8 = b'U';
/// Execution; informational, the book is authoritative
pub const TAG_ORDER_EXECUTED: u8 = b'E';
/// Execution with price; informational
pub const TAG_ORDER_EXECUTED_PRICE: u8 = b'C';

// Payload sizes after the tag byte.
const ADD_ORDER_LEN: usize = 37;
const ORDER_CANCEL_LEN: usize = 24;
const ORDER_DELETE_LEN: usize = 20;
const ORDER_REPLACE_LEN: usize = 36;

/// Feed replay failures. Frame-level corruption is not an error: the
/// replay stops and reports what it consumed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to open feed file: {0}")]
    Io(#[from] io::Error),
}

/// Outcome of one replay pass.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReplayStats {
    /// Frames consumed, including skipped tags
    pub messages: u64,
    /// Wall time spent in the replay loop
    pub elapsed_ns: u64,
}

impl ReplayStats {
    /// Messages per second over the replay
    pub fn throughput(&self) -> f64 {
        if self.elapsed_ns == 0 {
            return 0.0;
        }
        self.messages as f64 * 1e9 / self.elapsed_ns as f64
    }
}

/// Drives an engine from a framed feed.
pub struct FeedHandler<'a> {
    engine: &'a mut Engine,
}

impl<'a> FeedHandler<'a> {
    pub fn new(engine: &'a mut Engine) -> Self {
        Self { engine }
    }

    /// Replay a feed file through the engine.
    pub fn replay_file<P: AsRef<Path>>(&mut self, path: P) -> Result<ReplayStats, FeedError> {
        let file = File::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), "replaying feed file");
        Ok(self.replay(&mut BufReader::new(file)))
    }

    /// Replay frames from any byte stream until EOF or a truncated frame.
    pub fn replay(&mut self, reader: &mut impl Read) -> ReplayStats {
        let start = timestamp_ns();
        let mut messages = 0u64;
        let mut payload = Vec::new();

        loop {
            let mut length = [0u8; 2];
            if reader.read_exact(&mut length).is_err() {
                break; // clean EOF or truncated length
            }
            let length = u16::from_be_bytes(length) as usize;
            if length == 0 {
                debug!(messages, "zero-length frame; stopping replay");
                break;
            }

            let mut tag = [0u8; 1];
            if reader.read_exact(&mut tag).is_err() {
                debug!(messages, "truncated frame tag; stopping replay");
                break;
            }

            payload.resize(length - 1, 0);
            if reader.read_exact(&mut payload).is_err() {
                debug!(messages, "truncated frame payload; stopping replay");
                break;
            }

            self.dispatch(tag[0], &payload);
            messages += 1;

            if messages % 1_000_000 == 0 {
                let elapsed = timestamp_ns() - start;
                info!(
                    messages,
                    throughput_mps = messages as f64 * 1e9 / elapsed as f64 / 1e6,
                    "replay progress"
                );
            }
        }

        ReplayStats {
            messages,
            elapsed_ns: timestamp_ns() - start,
        }
    }

    /// Decode one payload and apply it to the engine. Short payloads for
    /// recognized tags and unknown tags are skipped.
    fn dispatch(&mut self, tag: u8, payload: &[u8]) {
        match tag {
            TAG_ADD_ORDER if payload.len() >= ADD_ORDER_LEN => {
                // locate u16 | tracking u16 | timestamp u64 | order ref u64
                // | side u8 | shares u32 | stock [u8; 8] | price u32
                let timestamp = be_u64(&payload[4..12]);
                let order_id = be_u64(&payload[12..20]);
                let side = if payload[20] == b'B' {
                    Side::Buy
                } else {
                    Side::Sell
                };
                let shares = be_u32(&payload[21..25]);
                let mut stock = [0u8; 8];
                stock.copy_from_slice(&payload[25..33]);
                let price = be_u32(&payload[33..37]);

                // Exhaustion is already counted and logged by the engine.
                let _ = self.engine.submit_order(
                    Symbol::from_wire(stock),
                    order_id,
                    timestamp,
                    price,
                    shares,
                    side,
                    OrderType::Limit,
                );
            }
            TAG_ORDER_CANCEL if payload.len() >= ORDER_CANCEL_LEN => {
                // locate u16 | tracking u16 | timestamp u64 | order ref u64
                // | cancelled shares u32
                let order_id = be_u64(&payload[12..20]);
                let cancelled = be_u32(&payload[20..24]);
                self.engine.reduce_order_by_id(order_id, cancelled);
            }
            TAG_ORDER_DELETE if payload.len() >= ORDER_DELETE_LEN => {
                // locate u16 | tracking u16 | timestamp u64 | order ref u64
                let order_id = be_u64(&payload[12..20]);
                self.engine.cancel_order_by_id(order_id);
            }
            TAG_ORDER_REPLACE if payload.len() >= ORDER_REPLACE_LEN => {
                // locate u16 | tracking u16 | timestamp u64 | original ref
                // u64 | new ref u64 | shares u32 | price u32
                let timestamp = be_u64(&payload[4..12]);
                let orig_order_id = be_u64(&payload[12..20]);
                let new_order_id = be_u64(&payload[20..28]);
                let shares = be_u32(&payload[28..32]);
                let price = be_u32(&payload[32..36]);
                let _ = self
                    .engine
                    .replace_order(orig_order_id, new_order_id, timestamp, price, shares);
            }
            TAG_ORDER_EXECUTED | TAG_ORDER_EXECUTED_PRICE => {
                // The book generates its own executions.
            }
            _ => {
                // Unknown or short message; length framing makes the skip safe.
            }
        }
    }
}

#[inline]
fn be_u32(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(bytes);
    u32::from_be_bytes(raw)
}

#[inline]
fn be_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    u64::from_be_bytes(raw)
}
