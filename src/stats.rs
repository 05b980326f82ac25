//! Global probe statistics
//!
//! Counters accumulate monotonically on every probe attempt; loss rate,
//! average latency and throughput are derived only when a snapshot is
//! taken. The tracker is its own lock group, independent of the host
//! registry, so statistics updates never serialize against sweeps.

use std::sync::Mutex;
use std::time::Instant;

/// Raw monotonic counters
#[derive(Debug, Clone)]
struct GlobalStats {
    packets_sent: u64,
    packets_received: u64,
    packets_lost: u64,
    total_latency_ms: f64,
    min_latency_ms: f64,
    max_latency_ms: f64,
}

impl GlobalStats {
    fn new() -> Self {
        Self {
            packets_sent: 0,
            packets_received: 0,
            packets_lost: 0,
            total_latency_ms: 0.0,
            min_latency_ms: f64::INFINITY,
            max_latency_ms: 0.0,
        }
    }
}

/// Derived view over the counters, computed at read time
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub packets_lost: u64,
    /// lost / sent, as a percentage; 0 when nothing was sent
    pub loss_rate: f64,
    /// total latency / received; 0 when nothing was received
    pub avg_latency_ms: f64,
    /// Lowest RTT seen; 0 when nothing was received
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    /// Probes per second since the tracker was created; 0 when elapsed is 0
    pub throughput_pps: f64,
    pub uptime_secs: f64,
}

/// Shared statistics tracker
#[derive(Debug)]
pub struct StatsTracker {
    inner: Mutex<GlobalStats>,
    started: Instant,
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsTracker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(GlobalStats::new()),
            started: Instant::now(),
        }
    }

    /// Record one echo request going out
    pub fn record_sent(&self) {
        let mut stats = self.inner.lock().unwrap();
        stats.packets_sent += 1;
    }

    /// Record a matched reply and its round-trip time
    pub fn record_reply(&self, rtt_ms: f64) {
        let mut stats = self.inner.lock().unwrap();
        stats.packets_received += 1;
        stats.total_latency_ms += rtt_ms;
        if rtt_ms < stats.min_latency_ms {
            stats.min_latency_ms = rtt_ms;
        }
        if rtt_ms > stats.max_latency_ms {
            stats.max_latency_ms = rtt_ms;
        }
    }

    /// Record an attempt that got no reply within the timeout
    pub fn record_lost(&self) {
        let mut stats = self.inner.lock().unwrap();
        stats.packets_lost += 1;
    }

    /// Take an independent snapshot with derived rates filled in
    pub fn snapshot(&self) -> StatsSnapshot {
        let stats = self.inner.lock().unwrap().clone();
        let elapsed = self.started.elapsed().as_secs_f64();

        let loss_rate = if stats.packets_sent == 0 {
            0.0
        } else {
            stats.packets_lost as f64 / stats.packets_sent as f64 * 100.0
        };

        let avg_latency_ms = if stats.packets_received == 0 {
            0.0
        } else {
            stats.total_latency_ms / stats.packets_received as f64
        };

        let throughput_pps = if elapsed <= 0.0 {
            0.0
        } else {
            stats.packets_sent as f64 / elapsed
        };

        let min_latency_ms = if stats.min_latency_ms.is_finite() {
            stats.min_latency_ms
        } else {
            0.0
        };

        StatsSnapshot {
            packets_sent: stats.packets_sent,
            packets_received: stats.packets_received,
            packets_lost: stats.packets_lost,
            loss_rate,
            avg_latency_ms,
            min_latency_ms,
            max_latency_ms: stats.max_latency_ms,
            throughput_pps,
            uptime_secs: elapsed,
        }
    }
}
