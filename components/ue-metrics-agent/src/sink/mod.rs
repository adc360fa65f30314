//! Where accumulated UE metrics go: InfluxDB, or the console for dry runs.

pub mod console;
pub mod sink;
