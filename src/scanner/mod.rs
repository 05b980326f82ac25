//! Probe execution and the orchestrating scan loops

pub mod engine;
pub mod prober;

pub use engine::RadarEngine;
pub use prober::{ProbeOutcome, Prober};
