//! netradar - continuous ICMP subnet radar engine
//!
//! Sweeps an IPv4 range with raw ICMP echo probes, tracks per-host
//! liveness and latency in a shared registry, and derives global
//! statistics and anomaly classifications for a live operator view.

pub mod anomaly;
pub mod config;
pub mod error;
pub mod network;
pub mod registry;
pub mod scanner;
pub mod stats;

// Re-export commonly used types
pub use anomaly::{AnomalyEntry, AnomalyReport};
pub use config::RadarConfig;
pub use error::{RadarError, RadarResult};
pub use network::range::HostRange;
pub use registry::{HostRecord, HostRegistry, OfflineRecord};
pub use scanner::engine::RadarEngine;
pub use scanner::prober::ProbeOutcome;
pub use stats::{StatsSnapshot, StatsTracker};

pub type Result<T> = std::result::Result<T, RadarError>;
