//! Single-address probe execution with retry policy and side effects
//!
//! The prober owns everything that must happen around one probe: stats
//! accounting per attempt, history append on success and the one-shot
//! metadata resolution. Host-record upserts stay with the caller, so a
//! sweep batch can join fully before committing its results.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use crate::network::{arp, device, icmp::IcmpPinger};
use crate::registry::HostRegistry;
use crate::stats::StatsTracker;

/// Pause between retry attempts
const RETRY_PAUSE: Duration = Duration::from_millis(100);

/// Result of probing one address
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeOutcome {
    Reply { rtt_ms: f64 },
    NoReply,
}

impl ProbeOutcome {
    pub fn rtt_ms(&self) -> Option<f64> {
        match self {
            ProbeOutcome::Reply { rtt_ms } => Some(*rtt_ms),
            ProbeOutcome::NoReply => None,
        }
    }

    pub fn is_reply(&self) -> bool {
        matches!(self, ProbeOutcome::Reply { .. })
    }
}

/// Probe executor shared by all three loops and the custom-probe path
pub struct Prober {
    registry: Arc<HostRegistry>,
    stats: Arc<StatsTracker>,
    timeout: Duration,
}

impl Prober {
    pub fn new(registry: Arc<HostRegistry>, stats: Arc<StatsTracker>, timeout: Duration) -> Self {
        Self {
            registry,
            stats,
            timeout,
        }
    }

    /// Probe `addr`, retrying up to `max_retries` extra times after a
    /// timeout. Every attempt counts as sent; every unanswered attempt
    /// counts as lost, including the ones before an eventual reply.
    ///
    /// No failure on this path is ever fatal: socket errors are recorded
    /// as loss and retried like timeouts.
    pub async fn probe(&self, addr: Ipv4Addr, max_retries: u32) -> ProbeOutcome {
        // One socket per in-flight probe; concurrent probes sharing a raw
        // socket would steal each other's replies off the queue.
        let pinger = match IcmpPinger::new() {
            Ok(pinger) => Some(pinger),
            Err(e) => {
                log::debug!("probe {}: socket unavailable: {}", addr, e);
                None
            }
        };

        for attempt in 0..=max_retries {
            self.stats.record_sent();

            let reply = match &pinger {
                Some(pinger) => match pinger.ping(addr, self.timeout).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        log::debug!("probe {}: attempt {} failed: {}", addr, attempt, e);
                        None
                    }
                },
                None => None,
            };

            match reply {
                Some(reply) => {
                    let rtt_ms = reply.rtt.as_secs_f64() * 1000.0;
                    self.stats.record_reply(rtt_ms);
                    self.registry.record_latency(addr, rtt_ms);
                    self.resolve_metadata_once(addr);
                    return ProbeOutcome::Reply { rtt_ms };
                }
                None => {
                    self.stats.record_lost();
                    if attempt < max_retries {
                        tokio::time::sleep(RETRY_PAUSE).await;
                    }
                }
            }
        }

        ProbeOutcome::NoReply
    }

    /// Resolve and cache metadata the first time an address answers.
    /// Resolution failures are silent and never retried.
    fn resolve_metadata_once(&self, addr: Ipv4Addr) {
        if self.registry.has_metadata(addr) {
            return;
        }

        let hardware_addr = arp::lookup_hardware_addr(addr);
        let meta = device::resolve_metadata(addr, hardware_addr);
        log::debug!(
            "resolved {} as {} ({})",
            addr,
            meta.display_name,
            meta.device_class
        );
        self.registry.mark_metadata(addr, meta);
    }
}
