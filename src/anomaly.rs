//! Anomaly classification over registry snapshots
//!
//! A stateless pass: every call recomputes the report from the snapshots
//! it is given. The high-latency baseline is twice the running global
//! average over every recorded history sample, floored at 100 ms.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Instant;

use crate::registry::{HostRecord, OfflineRecord};

/// Latency floor below which a host is never flagged high-latency (ms)
const HIGH_LATENCY_FLOOR_MS: f64 = 100.0;

/// Multiplier applied to the global average latency
const HIGH_LATENCY_FACTOR: f64 = 2.0;

/// Population standard deviation above which history counts as jittery (ms)
const JITTER_STDDEV_MS: f64 = 30.0;

/// Minimum history samples before jitter is evaluated
const JITTER_MIN_SAMPLES: usize = 5;

/// How long an offline transition stays "recent" (seconds)
const RECENT_OFFLINE_SECS: u64 = 60;

/// One flagged host
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyEntry {
    pub addr: Ipv4Addr,
    /// The measurement that tripped the threshold
    pub metric: f64,
    /// Human-readable context for display panels
    pub context: String,
}

/// Classification result, rebuilt fresh on every call
#[derive(Debug, Clone, Default)]
pub struct AnomalyReport {
    pub high_latency: Vec<AnomalyEntry>,
    pub high_jitter: Vec<AnomalyEntry>,
    /// Reserved category; present for consumers, never populated yet
    pub packet_loss: Vec<AnomalyEntry>,
    pub recently_offline: Vec<AnomalyEntry>,
}

impl AnomalyReport {
    pub fn is_empty(&self) -> bool {
        self.high_latency.is_empty()
            && self.high_jitter.is_empty()
            && self.packet_loss.is_empty()
            && self.recently_offline.is_empty()
    }

    pub fn total(&self) -> usize {
        self.high_latency.len()
            + self.high_jitter.len()
            + self.packet_loss.len()
            + self.recently_offline.len()
    }
}

/// Mean of every recorded sample across all hosts, 0 when there are none
fn global_average(history: &HashMap<Ipv4Addr, Vec<f64>>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for samples in history.values() {
        sum += samples.iter().sum::<f64>();
        count += samples.len();
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Population standard deviation of a sample set
fn population_stddev(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    let variance = samples
        .iter()
        .map(|s| {
            let d = s - mean;
            d * d
        })
        .sum::<f64>()
        / samples.len() as f64;
    variance.sqrt()
}

/// Classify the current registry snapshots.
///
/// `now` is the caller's reference instant; offline transitions within
/// the last 60 seconds of it are flagged.
pub fn detect(
    active: &HashMap<Ipv4Addr, HostRecord>,
    offline: &HashMap<Ipv4Addr, OfflineRecord>,
    history: &HashMap<Ipv4Addr, Vec<f64>>,
    now: Instant,
) -> AnomalyReport {
    let mut report = AnomalyReport::default();
    let global_avg = global_average(history);
    let latency_threshold = (HIGH_LATENCY_FACTOR * global_avg).max(HIGH_LATENCY_FLOOR_MS);

    for record in active.values() {
        if record.latency_ms > latency_threshold {
            report.high_latency.push(AnomalyEntry {
                addr: record.addr,
                metric: record.latency_ms,
                context: format!(
                    "{:.1}ms vs {:.1}ms threshold",
                    record.latency_ms, latency_threshold
                ),
            });
        }

        if let Some(samples) = history.get(&record.addr) {
            if samples.len() >= JITTER_MIN_SAMPLES {
                let stddev = population_stddev(samples);
                if stddev > JITTER_STDDEV_MS {
                    report.high_jitter.push(AnomalyEntry {
                        addr: record.addr,
                        metric: stddev,
                        context: format!("stddev {:.1}ms over {} samples", stddev, samples.len()),
                    });
                }
            }
        }
    }

    for record in offline.values() {
        let since = now.saturating_duration_since(record.went_offline);
        if since.as_secs() < RECENT_OFFLINE_SECS {
            report.recently_offline.push(AnomalyEntry {
                addr: record.addr,
                metric: since.as_secs_f64(),
                context: format!("offline for {}s", since.as_secs()),
            });
        }
    }

    report
}
