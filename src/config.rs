//! Configuration surface for the radar engine
//!
//! All knobs are supplied at construction and immutable for the engine's
//! lifetime. The network range is optional: when absent the engine
//! autodetects the local subnet at sweep time.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadarConfig {
    /// Network range in CIDR notation (e.g. "192.168.1.0/24").
    /// `None` selects local-network autodetection.
    pub network: Option<String>,

    /// Per-attempt probe timeout in milliseconds
    pub timeout_ms: u64,

    /// Extra attempts per sweep probe after the first
    pub sweep_retries: u32,

    /// Extra attempts per continuous probe after the first
    pub continuous_retries: u32,

    /// Seconds a host may go unseen before moving to the offline set
    pub persistence_secs: u64,

    /// Pause between full sweeps, in seconds
    pub sweep_interval_secs: u64,

    /// Pause between continuous-probe passes over known hosts, in seconds
    pub probe_interval_secs: u64,

    /// Pause between expiry/cleanup passes, in seconds
    pub cleanup_interval_secs: u64,

    /// Number of in-flight probes per sweep batch
    pub fan_out: usize,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            network: None,
            timeout_ms: 500,
            sweep_retries: 2,
            continuous_retries: 1,
            persistence_secs: 30,
            sweep_interval_secs: 3,
            probe_interval_secs: 2,
            cleanup_interval_secs: 5,
            fan_out: 20,
        }
    }
}

impl RadarConfig {
    /// Create a configuration for an explicit network range
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            network: Some(network.into()),
            ..Default::default()
        }
    }

    /// Set the network range
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    /// Set the per-attempt probe timeout
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the host persistence window
    pub fn with_persistence_secs(mut self, secs: u64) -> Self {
        self.persistence_secs = secs;
        self
    }

    /// Set the pause between full sweeps
    pub fn with_sweep_interval_secs(mut self, secs: u64) -> Self {
        self.sweep_interval_secs = secs;
        self
    }

    /// Get probe timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get the persistence window as Duration
    pub fn persistence(&self) -> Duration {
        Duration::from_secs(self.persistence_secs)
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| crate::RadarError::Config(format!("failed to read config file: {}", e)))?;

        let config: RadarConfig = toml::from_str(&content)
            .map_err(|e| crate::RadarError::Config(format!("failed to parse TOML: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from `~/.netradar.toml`, falling back to defaults
    pub fn load_default_config() -> Self {
        let home_dir = dirs::home_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let config_path = home_dir.join(".netradar.toml");

        if config_path.exists() {
            if let Ok(config) = Self::from_toml_file(&config_path) {
                log::info!("loaded config from {}", config_path.display());
                return config;
            }
        }

        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.timeout_ms == 0 {
            return Err(crate::RadarError::Config(
                "probe timeout must be greater than 0".to_string(),
            ));
        }

        if self.fan_out == 0 {
            return Err(crate::RadarError::Config(
                "sweep fan-out must be greater than 0".to_string(),
            ));
        }

        if self.persistence_secs == 0 {
            return Err(crate::RadarError::Config(
                "persistence window must be greater than 0".to_string(),
            ));
        }

        if let Some(ref network) = self.network {
            if network.is_empty() {
                return Err(crate::RadarError::Config(
                    "network range cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_constants() {
        let config = RadarConfig::default();
        assert_eq!(config.timeout_ms, 500);
        assert_eq!(config.persistence_secs, 30);
        assert_eq!(config.fan_out, 20);
        assert!(config.network.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_chain() {
        let config = RadarConfig::default()
            .with_network("10.0.0.0/24")
            .with_timeout_ms(250)
            .with_persistence_secs(60);
        assert_eq!(config.network.as_deref(), Some("10.0.0.0/24"));
        assert_eq!(config.timeout(), Duration::from_millis(250));
        assert_eq!(config.persistence(), Duration::from_secs(60));
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = RadarConfig::default().with_timeout_ms(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_round_trip() {
        let config = RadarConfig::new("172.16.0.0/16");
        let text = toml::to_string(&config).unwrap();
        let parsed: RadarConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.as_deref(), Some("172.16.0.0/16"));
        assert_eq!(parsed.timeout_ms, config.timeout_ms);
    }
}
