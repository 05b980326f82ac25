//! netradar binary: CLI front end and terminal status consumer
//!
//! The graphical radar view lives elsewhere; this binary drives the
//! engine and prints periodic snapshots the way a display consumer
//! would pull them.

use clap::Parser;
use colored::Colorize;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use netradar::{RadarConfig, RadarEngine, RadarError};

/// How often the status consumer pulls snapshots
const STATUS_TICK: Duration = Duration::from_secs(2);

/// Minimum age before the cached anomaly report is recomputed
const ANOMALY_REFRESH: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(
    name = "netradar",
    version,
    about = "Continuous ICMP subnet radar: live host discovery, latency tracking and anomaly detection",
    after_help = "Requires privileges to send raw ICMP (root or CAP_NET_RAW)."
)]
struct Args {
    /// Network range to sweep in CIDR notation (autodetected when omitted)
    #[arg(short, long)]
    network: Option<String>,

    /// Seconds between full sweeps [default: 3]
    #[arg(short = 'i', long)]
    interval: Option<u64>,

    /// Seconds a host may go unseen before it is marked offline [default: 30]
    #[arg(short = 'p', long)]
    persist: Option<u64>,

    /// Per-attempt probe timeout in milliseconds [default: 500]
    #[arg(short = 't', long)]
    timeout: Option<u64>,

    /// Probe one address once and exit (bypasses the scan loops)
    #[arg(long, value_name = "ADDR")]
    probe: Option<Ipv4Addr>,

    /// Show debug output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Layer explicit flags over `config`; absent flags leave the file
    /// or built-in values alone.
    fn apply_to(self, mut config: RadarConfig) -> RadarConfig {
        if let Some(timeout) = self.timeout {
            config = config.with_timeout_ms(timeout);
        }
        if let Some(persist) = self.persist {
            config = config.with_persistence_secs(persist);
        }
        if let Some(interval) = self.interval {
            config = config.with_sweep_interval_secs(interval);
        }
        if let Some(network) = self.network {
            config = config.with_network(network);
        }
        config
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if args.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    } else {
        builder.filter_level(log::LevelFilter::Info);
    }
    builder.init();

    if let Err(e) = run(args).await {
        if matches!(e, RadarError::Permission(_)) {
            eprintln!("{} {}", "error:".red().bold(), e);
            eprintln!("run as root or grant the binary CAP_NET_RAW");
        } else {
            eprintln!("{} {}", "error:".red().bold(), e);
        }
        std::process::exit(1);
    }
}

async fn run(args: Args) -> netradar::Result<()> {
    let single_probe = args.probe;
    let config = args.apply_to(RadarConfig::load_default_config());
    let engine = Arc::new(RadarEngine::new(config)?);

    if let Some(addr) = single_probe {
        return probe_once(&engine, addr).await;
    }

    let range = engine.resolve_range()?;
    println!(
        "{} sweeping {} every {}s (persistence {}s)",
        "netradar".cyan().bold(),
        range.to_string().bold(),
        engine.config().sweep_interval_secs,
        engine.config().persistence_secs,
    );

    engine.start().await?;

    let mut ticker = tokio::time::interval(STATUS_TICK);
    let mut cached_anomalies = engine.anomaly_report();
    let mut last_anomaly_refresh = Instant::now();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\nshutting down...");
                break;
            }
            _ = ticker.tick() => {
                if last_anomaly_refresh.elapsed() >= ANOMALY_REFRESH {
                    cached_anomalies = engine.anomaly_report();
                    last_anomaly_refresh = Instant::now();
                }
                print_status(&engine, &cached_anomalies);
            }
        }
    }

    engine.shutdown().await;
    Ok(())
}

async fn probe_once(engine: &Arc<RadarEngine>, addr: Ipv4Addr) -> netradar::Result<()> {
    // The capability check lives in start(); a single custom probe needs
    // the same guarantee before touching the raw socket path.
    netradar::network::icmp::verify_capability(engine.config().timeout()).await?;

    match engine.probe_custom(addr).await.rtt_ms() {
        Some(rtt_ms) => println!("{} {} {:.1}ms", addr, "up".green().bold(), rtt_ms),
        None => println!("{} {}", addr, "no reply".red()),
    }
    Ok(())
}

fn print_status(engine: &Arc<RadarEngine>, anomalies: &netradar::AnomalyReport) {
    let active = engine.snapshot_active();
    let offline = engine.snapshot_offline();
    let stats = engine.stats_snapshot();

    let mut hosts: Vec<_> = active.values().collect();
    hosts.sort_by_key(|record| record.addr);

    println!(
        "{} {} active, {} offline | sent {} recv {} loss {:.1}% | avg {:.1}ms",
        "status:".cyan(),
        hosts.len().to_string().green().bold(),
        offline.len().to_string().yellow(),
        stats.packets_sent,
        stats.packets_received,
        stats.loss_rate,
        stats.avg_latency_ms,
    );

    let metadata = engine.snapshot_metadata();
    for record in hosts {
        let name = metadata
            .get(&record.addr)
            .map(|meta| meta.display_name.clone())
            .unwrap_or_else(|| "?".to_string());
        println!(
            "  {:15} {:>7.1}ms  {:>3}°  {}",
            record.addr.to_string(),
            record.latency_ms,
            record.angle,
            name.dimmed(),
        );
    }

    if !anomalies.is_empty() {
        for entry in &anomalies.high_latency {
            println!("  {} {} {}", "high-latency".red(), entry.addr, entry.context);
        }
        for entry in &anomalies.high_jitter {
            println!("  {} {} {}", "high-jitter".yellow(), entry.addr, entry.context);
        }
        for entry in &anomalies.recently_offline {
            println!("  {} {} {}", "went-offline".magenta(), entry.addr, entry.context);
        }
    }
}
