//! Scan orchestration: the three concurrent loops and shutdown
//!
//! The engine drives a full-range sweep, a lighter continuous probe
//! pass over known hosts and an expiry/cleanup pass, all as independent
//! cancellable tasks over the shared registry and stats tracker. A
//! display consumer pulls snapshots through the accessor methods and
//! may fire single custom probes that bypass the loops.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::anomaly::{self, AnomalyReport};
use crate::config::RadarConfig;
use crate::network::icmp;
use crate::network::range::HostRange;
use crate::registry::{HostRecord, HostRegistry, OfflineRecord};
use crate::scanner::prober::{ProbeOutcome, Prober};
use crate::stats::{StatsSnapshot, StatsTracker};
use crate::Result;

/// Pause between continuous probes of successive known hosts
const CONTINUOUS_PACING: Duration = Duration::from_millis(100);

/// Extra margin on the shutdown join beyond one loop cycle
const SHUTDOWN_MARGIN: Duration = Duration::from_secs(1);

/// The radar engine: shared state plus the three scan loops
pub struct RadarEngine {
    config: RadarConfig,
    registry: Arc<HostRegistry>,
    stats: Arc<StatsTracker>,
    prober: Prober,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RadarEngine {
    pub fn new(config: RadarConfig) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(HostRegistry::new());
        let stats = Arc::new(StatsTracker::new());
        let prober = Prober::new(Arc::clone(&registry), Arc::clone(&stats), config.timeout());

        Ok(Self {
            config,
            registry,
            stats,
            prober,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &RadarConfig {
        &self.config
    }

    /// The range this engine sweeps: the configured CIDR, or the
    /// autodetected local network when none was given.
    pub fn resolve_range(&self) -> Result<HostRange> {
        match self.config.network.as_deref() {
            Some(spec) => HostRange::parse(spec),
            None => Ok(HostRange::detect_local()),
        }
    }

    /// Verify raw-ICMP capability and enter the three loops.
    ///
    /// The capability check is the engine's only fatal failure: without
    /// it no loop is started.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        icmp::verify_capability(self.config.timeout()).await?;
        log::info!("ICMP capability verified");

        let mut tasks = self.tasks.lock().unwrap();
        tasks.push(tokio::spawn({
            let engine = Arc::clone(self);
            async move { engine.sweep_loop().await }
        }));
        tasks.push(tokio::spawn({
            let engine = Arc::clone(self);
            async move { engine.continuous_loop().await }
        }));
        tasks.push(tokio::spawn({
            let engine = Arc::clone(self);
            async move { engine.cleanup_loop().await }
        }));

        log::info!("radar engine started");
        Ok(())
    }

    /// Signal all loops to stop and join them with a bounded wait.
    pub async fn shutdown(&self) {
        self.cancel.cancel();

        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().unwrap();
            tasks.drain(..).collect()
        };

        let grace = self.shutdown_grace();
        for handle in handles {
            if tokio::time::timeout(grace, handle).await.is_err() {
                log::warn!("scan loop did not stop within {:?}", grace);
            }
        }
        log::info!("radar engine stopped");
    }

    /// One cycle of every loop plus the worst-case in-flight probe
    fn shutdown_grace(&self) -> Duration {
        let longest_cycle = self
            .config
            .sweep_interval_secs
            .max(self.config.probe_interval_secs)
            .max(self.config.cleanup_interval_secs);
        let probe_budget =
            self.config.timeout() * (self.config.sweep_retries + 1) + CONTINUOUS_PACING;
        Duration::from_secs(longest_cycle) + probe_budget + SHUTDOWN_MARGIN
    }

    /// Sweep the whole range once with bounded fan-out.
    ///
    /// Addresses are probed in consecutive batches; a batch joins fully
    /// before its responders are committed and the next batch starts.
    /// Returns the number of responding hosts.
    pub async fn sweep_once(&self) -> Result<usize> {
        let range = self.resolve_range()?;
        log::debug!("sweeping {} ({} addresses)", range, range.len());

        let mut responders = 0usize;
        let mut addrs = range.iter();

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let batch: Vec<Ipv4Addr> = addrs.by_ref().take(self.config.fan_out).collect();
            if batch.is_empty() {
                break;
            }

            let outcomes = join_all(batch.iter().map(|&addr| async move {
                (addr, self.prober.probe(addr, self.config.sweep_retries).await)
            }))
            .await;

            // Batch fully joined; commit its responders in one pass.
            let now = Instant::now();
            for (addr, outcome) in outcomes {
                if let ProbeOutcome::Reply { rtt_ms } = outcome {
                    self.registry.upsert_active(addr, rtt_ms, now);
                    responders += 1;
                }
            }
        }

        Ok(responders)
    }

    /// Probe one address outside the loops, committing the result to the
    /// same shared state.
    pub async fn probe_custom(&self, addr: Ipv4Addr) -> ProbeOutcome {
        let outcome = self.prober.probe(addr, self.config.sweep_retries).await;
        if let ProbeOutcome::Reply { rtt_ms } = outcome {
            self.registry.upsert_active(addr, rtt_ms, Instant::now());
        }
        outcome
    }

    async fn sweep_loop(&self) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let started = Instant::now();
            match self.sweep_once().await {
                Ok(responders) => log::debug!(
                    "sweep finished: {} hosts in {:.1}s",
                    responders,
                    started.elapsed().as_secs_f64()
                ),
                // A bad range spec aborts this cycle only.
                Err(e) => log::warn!("sweep aborted: {}", e),
            }

            if self
                .pause(Duration::from_secs(self.config.sweep_interval_secs))
                .await
            {
                break;
            }
        }
    }

    /// Light pass over known hosts: one retry, no discovery.
    async fn continuous_loop(&self) {
        loop {
            for addr in self.registry.known_hosts() {
                if self.cancel.is_cancelled() {
                    return;
                }

                let outcome = self
                    .prober
                    .probe(addr, self.config.continuous_retries)
                    .await;
                if let ProbeOutcome::Reply { rtt_ms } = outcome {
                    self.registry.upsert_active(addr, rtt_ms, Instant::now());
                    log::debug!("continuous probe {}: {:.1}ms", addr, rtt_ms);
                }

                if self.pause(CONTINUOUS_PACING).await {
                    return;
                }
            }

            if self
                .pause(Duration::from_secs(self.config.probe_interval_secs))
                .await
            {
                break;
            }
        }
    }

    async fn cleanup_loop(&self) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let expired = self
                .registry
                .expire_stale_active(self.config.persistence(), Instant::now());
            if !expired.is_empty() {
                log::info!("{} hosts went offline: {:?}", expired.len(), expired);
                self.registry.forget_known(&expired);
            }

            if self
                .pause(Duration::from_secs(self.config.cleanup_interval_secs))
                .await
            {
                break;
            }
        }
    }

    /// Sleep unless cancelled first; returns true when cancelled.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => true,
            _ = tokio::time::sleep(duration) => false,
        }
    }

    // Snapshot surface for the display consumer.

    pub fn snapshot_active(&self) -> std::collections::HashMap<Ipv4Addr, HostRecord> {
        self.registry.snapshot_active()
    }

    pub fn snapshot_offline(&self) -> std::collections::HashMap<Ipv4Addr, OfflineRecord> {
        self.registry.snapshot_offline()
    }

    pub fn snapshot_metadata(
        &self,
    ) -> std::collections::HashMap<Ipv4Addr, crate::network::device::HostMetadata> {
        self.registry.snapshot_metadata()
    }

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Fresh anomaly classification over the current snapshots; callers
    /// choose their own refresh cadence.
    pub fn anomaly_report(&self) -> AnomalyReport {
        anomaly::detect(
            &self.registry.snapshot_active(),
            &self.registry.snapshot_offline(),
            &self.registry.snapshot_history(),
            Instant::now(),
        )
    }

    pub fn registry(&self) -> &Arc<HostRegistry> {
        &self.registry
    }
}
