//! Per-UE radio metrics exporter for OAI base stations.
//!
//! Follows `nrMAC_stats.log`, rescans it on every modification and ships one
//! downlink and one uplink `ue_metrics` point per fully reported UE to
//! InfluxDB.

/// Command line entry point used by the `ue-metrics` binary.
pub mod cli;
/// Log line extraction and per-UE accumulation.
pub mod parser;

mod helpers;
mod influx;
mod instrumentation;
mod metrics;
mod runtime;
mod sink;
mod watcher;
