//! store/stats — cumulative transaction counters.
//!
//! Thread-safe atomic counters, copied out as a [`TxStats`] value on
//! demand. Durations accumulate as nanoseconds.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::engine::TxStats;

#[derive(Debug, Default)]
pub struct StatsRegistry {
    page_count: AtomicU64,
    page_alloc: AtomicU64,
    cursor_count: AtomicU64,
    node_count: AtomicU64,
    node_deref: AtomicU64,
    rebalance_count: AtomicU64,
    rebalance_ns: AtomicU64,
    spill_count: AtomicU64,
    spill_ns: AtomicU64,
    write_count: AtomicU64,
    write_ns: AtomicU64,
}

impl StatsRegistry {
    pub fn record_pages_written(&self, n: u64) {
        self.page_count.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_pages_allocated(&self, n: u64) {
        self.page_alloc.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_cursor(&self) {
        self.cursor_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_nodes(&self, n: u64) {
        self.node_count.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_node_deref(&self, n: u64) {
        self.node_deref.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_rebalance(&self, took: Duration) {
        self.rebalance_count.fetch_add(1, Ordering::Relaxed);
        self.rebalance_ns
            .fetch_add(took.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn record_spill(&self, took: Duration) {
        self.spill_count.fetch_add(1, Ordering::Relaxed);
        self.spill_ns
            .fetch_add(took.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn record_write(&self, took: Duration) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
        self.write_ns
            .fetch_add(took.as_nanos() as u64, Ordering::Relaxed);
    }

    /// One-shot copy of the cumulative counters.
    pub fn snapshot(&self) -> TxStats {
        TxStats {
            page_count: self.page_count.load(Ordering::Relaxed),
            page_alloc: self.page_alloc.load(Ordering::Relaxed),
            cursor_count: self.cursor_count.load(Ordering::Relaxed),
            node_count: self.node_count.load(Ordering::Relaxed),
            node_deref: self.node_deref.load(Ordering::Relaxed),
            rebalance_count: self.rebalance_count.load(Ordering::Relaxed),
            rebalance_time: Duration::from_nanos(self.rebalance_ns.load(Ordering::Relaxed)),
            spill_count: self.spill_count.load(Ordering::Relaxed),
            spill_time: Duration::from_nanos(self.spill_ns.load(Ordering::Relaxed)),
            write_count: self.write_count.load(Ordering::Relaxed),
            write_time: Duration::from_nanos(self.write_ns.load(Ordering::Relaxed)),
        }
    }
}
