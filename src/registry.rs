//! Authoritative shared host state
//!
//! The registry owns every mutable piece of per-host state: the active
//! and offline maps, the known-host set, the capped latency history and
//! the cached metadata. All operations take the single host-group lock
//! for their whole read-modify-write, so concurrent sweep, continuous
//! probe and cleanup passes cannot lose updates. Snapshot methods return
//! independent copies; no caller ever iterates live state.
//!
//! Network I/O never happens under the lock.

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::Ipv4Addr;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::network::device::HostMetadata;

/// Latency history capacity per host, oldest sample evicted first
pub const HISTORY_CAP: usize = 30;

/// A host currently answering probes
#[derive(Debug, Clone, PartialEq)]
pub struct HostRecord {
    pub addr: Ipv4Addr,
    /// Most recent round-trip time, milliseconds
    pub latency_ms: f64,
    pub last_seen: Instant,
    /// Stable display angle in [0, 360), assigned on first sighting
    pub angle: u16,
}

/// A host that stopped answering and aged out of the active set
#[derive(Debug, Clone, PartialEq)]
pub struct OfflineRecord {
    pub addr: Ipv4Addr,
    /// When the host last answered, carried over from its active record
    pub last_seen: Instant,
    pub went_offline: Instant,
    pub last_latency_ms: f64,
}

/// Deterministic display angle for an address.
///
/// The only contract is stability: the same address always maps to the
/// same angle, so a host keeps its position for as long as it is known.
pub fn display_angle(addr: Ipv4Addr) -> u16 {
    (u32::from(addr).wrapping_mul(2_654_435_761) % 360) as u16
}

#[derive(Debug, Default)]
struct RegistryInner {
    active: HashMap<Ipv4Addr, HostRecord>,
    offline: HashMap<Ipv4Addr, OfflineRecord>,
    known: HashSet<Ipv4Addr>,
    history: HashMap<Ipv4Addr, VecDeque<f64>>,
    metadata: HashMap<Ipv4Addr, HostMetadata>,
}

/// Thread-safe host registry
#[derive(Debug, Default)]
pub struct HostRegistry {
    inner: RwLock<RegistryInner>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh an active host.
    ///
    /// A previously assigned angle is preserved, the address joins the
    /// known set, and any offline record for it is dropped (a host that
    /// answers again is no longer offline).
    pub fn upsert_active(&self, addr: Ipv4Addr, latency_ms: f64, now: Instant) {
        let mut inner = self.inner.write().unwrap();
        let angle = inner
            .active
            .get(&addr)
            .map(|record| record.angle)
            .unwrap_or_else(|| display_angle(addr));

        inner.active.insert(
            addr,
            HostRecord {
                addr,
                latency_ms,
                last_seen: now,
                angle,
            },
        );
        inner.offline.remove(&addr);
        inner.known.insert(addr);
    }

    /// Append a latency sample to the host's bounded history
    pub fn record_latency(&self, addr: Ipv4Addr, latency_ms: f64) {
        let mut inner = self.inner.write().unwrap();
        let history = inner.history.entry(addr).or_default();
        if history.len() == HISTORY_CAP {
            history.pop_front();
        }
        history.push_back(latency_ms);
    }

    /// Cache resolved metadata for an address. First write wins; metadata
    /// is computed once per sighting and never recomputed.
    pub fn mark_metadata(&self, addr: Ipv4Addr, meta: HostMetadata) {
        let mut inner = self.inner.write().unwrap();
        inner.metadata.entry(addr).or_insert(meta);
    }

    /// Whether metadata was already resolved for this address
    pub fn has_metadata(&self, addr: Ipv4Addr) -> bool {
        self.inner.read().unwrap().metadata.contains_key(&addr)
    }

    /// Independent copy of the active host map
    pub fn snapshot_active(&self) -> HashMap<Ipv4Addr, HostRecord> {
        self.inner.read().unwrap().active.clone()
    }

    /// Independent copy of the offline host map
    pub fn snapshot_offline(&self) -> HashMap<Ipv4Addr, OfflineRecord> {
        self.inner.read().unwrap().offline.clone()
    }

    /// Independent copy of the cached metadata map
    pub fn snapshot_metadata(&self) -> HashMap<Ipv4Addr, HostMetadata> {
        self.inner.read().unwrap().metadata.clone()
    }

    /// Independent copy of every host's latency history
    pub fn snapshot_history(&self) -> HashMap<Ipv4Addr, Vec<f64>> {
        self.inner
            .read()
            .unwrap()
            .history
            .iter()
            .map(|(addr, samples)| (*addr, samples.iter().copied().collect()))
            .collect()
    }

    /// Addresses ever observed responding, in unspecified order
    pub fn known_hosts(&self) -> Vec<Ipv4Addr> {
        self.inner.read().unwrap().known.iter().copied().collect()
    }

    pub fn active_count(&self) -> usize {
        self.inner.read().unwrap().active.len()
    }

    /// Move every active host not seen within the persistence window to
    /// the offline set, preserving its last latency and last-seen time.
    /// Returns the expired addresses so the caller can shrink KnownHosts.
    pub fn expire_stale_active(&self, persistence: Duration, now: Instant) -> Vec<Ipv4Addr> {
        let mut inner = self.inner.write().unwrap();

        let expired: Vec<Ipv4Addr> = inner
            .active
            .iter()
            .filter(|(_, record)| now.duration_since(record.last_seen) > persistence)
            .map(|(addr, _)| *addr)
            .collect();

        for addr in &expired {
            if let Some(record) = inner.active.remove(addr) {
                inner.offline.insert(
                    *addr,
                    OfflineRecord {
                        addr: *addr,
                        last_seen: record.last_seen,
                        went_offline: now,
                        last_latency_ms: record.latency_ms,
                    },
                );
            }
        }

        expired
    }

    /// Drop addresses from the known set, along with their histories.
    /// Cached metadata survives so a returning host is not re-resolved.
    pub fn forget_known(&self, addrs: &[Ipv4Addr]) {
        let mut inner = self.inner.write().unwrap();
        for addr in addrs {
            inner.known.remove(addr);
            inner.history.remove(addr);
        }
    }
}
