//! Timing and statistics helpers for the benchmark harness.

use std::fmt;
use std::sync::OnceLock;
use std::time::Instant;

use hdrhistogram::Histogram;

static CLOCK_ANCHOR: OnceLock<Instant> = OnceLock::new();

/// Monotonic nanosecond clock. The epoch is the first call in the
/// process, which is all the harness needs for intervals and ordering.
#[inline]
pub fn timestamp_ns() -> u64 {
    let anchor = CLOCK_ANCHOR.get_or_init(Instant::now);
    anchor.elapsed().as_nanos() as u64
}

/// Percentile summary of a latency distribution.
#[derive(Clone, Copy, Debug, Default)]
pub struct LatencySummary {
    pub count: u64,
    pub min_ns: u64,
    pub mean_ns: u64,
    pub p50_ns: u64,
    pub p95_ns: u64,
    pub p99_ns: u64,
    pub p999_ns: u64,
    pub max_ns: u64,
}

impl LatencySummary {
    /// Summarize a recorded histogram.
    pub fn from_histogram(histogram: &Histogram<u64>) -> Self {
        if histogram.is_empty() {
            return Self::default();
        }
        Self {
            count: histogram.len(),
            min_ns: histogram.min(),
            mean_ns: histogram.mean() as u64,
            p50_ns: histogram.value_at_quantile(0.50),
            p95_ns: histogram.value_at_quantile(0.95),
            p99_ns: histogram.value_at_quantile(0.99),
            p999_ns: histogram.value_at_quantile(0.999),
            max_ns: histogram.max(),
        }
    }
}

impl fmt::Display for LatencySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Min:   {} ns", self.min_ns)?;
        writeln!(f, "  Mean:  {} ns", self.mean_ns)?;
        writeln!(f, "  P50:   {} ns", self.p50_ns)?;
        writeln!(f, "  P95:   {} ns", self.p95_ns)?;
        writeln!(f, "  P99:   {} ns", self.p99_ns)?;
        writeln!(f, "  P99.9: {} ns", self.p999_ns)?;
        write!(f, "  Max:   {} ns", self.max_ns)
    }
}

/// Render a tick price with the implicit 4-decimal scale.
pub fn format_price(price_ticks: u32) -> String {
    format!("{}.{:04}", price_ticks / 10_000, price_ticks % 10_000)
}

/// Render a nanosecond duration in a human unit.
pub fn format_duration(nanoseconds: u64) -> String {
    if nanoseconds < 1_000 {
        format!("{} ns", nanoseconds)
    } else if nanoseconds < 1_000_000 {
        format!("{:.3} us", nanoseconds as f64 / 1e3)
    } else if nanoseconds < 1_000_000_000 {
        format!("{:.3} ms", nanoseconds as f64 / 1e6)
    } else {
        format!("{:.3} s", nanoseconds as f64 / 1e9)
    }
}
